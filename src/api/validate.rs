

use lazy_static::lazy_static;
use regex::Regex;

use super::models::ApiIssue;

const ID_PATTERNS: [&str; 2] = [
    // Mongo-style ObjectId
    r"^[0-9a-fA-F]{24}$",
    r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
];

lazy_static! {
    static ref ID_REGEXES: Vec<Regex> = ID_PATTERNS
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect();
}


pub fn is_valid_id(id: &str) -> bool {
    ID_REGEXES.iter().any(|regex| regex.is_match(id))
}

pub fn validate_id(field: &str, id: &str) -> Result<(), ApiIssue> {
    if is_valid_id(id) {
        Ok(())
    } else {
        Err(ApiIssue::bad_request(field, "invalid object id"))
    }
}
