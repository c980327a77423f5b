

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;


pub type Document = Value;


pub const ID_FIELD: &str = "_id";


#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Transient store failure: {0}")]
    Transient(String),

    #[error("Store failure: {0}")]
    Permanent(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}


/// Typed query filter. Ids are always compared as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    Eq {
        field: String,
        value: String,
    },
    In {
        field: String,
        values: Vec<String>,
    },
    /// Matches documents whose `array` holds an entry `{ member_field: member }`,
    /// optionally restricted to entries whose `role_field` is one of `roles`.
    ElemMatch {
        array: String,
        member_field: String,
        member: String,
        role_field: String,
        roles: Option<Vec<String>>,
    },
}

impl Filter {
    pub fn by_id(id: impl Into<String>) -> Self {
        Filter::Eq {
            field: ID_FIELD.to_string(),
            value: id.into(),
        }
    }

    pub fn ids(ids: Vec<String>) -> Self {
        Filter::In {
            field: ID_FIELD.to_string(),
            values: ids,
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Eq { field, value } => str_field(doc, field) == Some(value.as_str()),
            Filter::In { field, values } => {
                str_field(doc, field).is_some_and(|v| values.iter().any(|candidate| candidate == v))
            }
            Filter::ElemMatch {
                array,
                member_field,
                member,
                role_field,
                roles,
            } => doc
                .get(array)
                .and_then(Value::as_array)
                .is_some_and(|entries| {
                    entries.iter().any(|entry| {
                        str_field(entry, member_field) == Some(member.as_str())
                            && roles.as_ref().is_none_or(|roles| {
                                str_field(entry, role_field)
                                    .is_some_and(|role| roles.iter().any(|r| r == role))
                            })
                    })
                }),
        }
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullSpec {
    pub array: String,
    pub member_field: String,
    pub member: String,
}

impl PullSpec {
    /// Removes every entry of `array` referencing `member`. Returns whether
    /// the document changed.
    pub fn apply(&self, doc: &mut Document) -> bool {
        let Some(entries) = doc.get_mut(&self.array).and_then(Value::as_array_mut) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|entry| str_field(entry, &self.member_field) != Some(self.member.as_str()));
        entries.len() != before
    }
}


#[async_trait]
pub trait DocumentStore: Send + Sync {
    
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        projection: &[&str],
    ) -> Result<Vec<Document>, StoreError>;

    
    async fn exists(&self, collection: &str, filter: &Filter) -> Result<bool, StoreError>;

    
    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    
    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    
    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        pull: &PullSpec,
    ) -> Result<u64, StoreError>;

    
    fn backend_name(&self) -> &str;
}


pub fn document_ids(docs: &[Document]) -> Vec<String> {
    docs.iter()
        .filter_map(|doc| str_field(doc, ID_FIELD).map(str::to_string))
        .collect()
}

fn str_field<'a>(doc: &'a Document, field: &str) -> Option<&'a str> {
    doc.get(field).and_then(Value::as_str)
}
