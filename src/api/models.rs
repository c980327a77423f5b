

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CallerRole {
    User,
    Admin,
}


/// Authenticated identity issuing a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: String,
    pub role: CallerRole,
}

impl Caller {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: CallerRole::User,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: CallerRole::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == CallerRole::Admin
    }
}


/// Request rejected before any mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{status} {field}: {message}")]
pub struct ApiIssue {
    pub status: u16,
    pub field: String,
    pub message: String,
}

impl ApiIssue {
    pub fn new(status: u16, field: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn bad_request(field: &str, message: impl Into<String>) -> Self {
        Self::new(400, field, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(403, "caller", message)
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeletionResponse {
    Success {
        message: String,
        steps_executed: usize,
        records_affected: u64,
    },
    Issue {
        status: u16,
        field: String,
        message: String,
    },
    /// Nothing was rolled back; calling again continues where this stopped.
    RetryableFailure {
        message: String,
        failed_step: Option<usize>,
        completed_steps: usize,
    },
}

impl DeletionResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, DeletionResponse::Success { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, DeletionResponse::RetryableFailure { .. })
    }

    pub fn status(&self) -> u16 {
        match self {
            DeletionResponse::Success { .. } => 200,
            DeletionResponse::Issue { status, .. } => *status,
            DeletionResponse::RetryableFailure { .. } => 503,
        }
    }
}

impl From<ApiIssue> for DeletionResponse {
    fn from(issue: ApiIssue) -> Self {
        DeletionResponse::Issue {
            status: issue.status,
            field: issue.field,
            message: issue.message,
        }
    }
}


/// Admin view of what a user owns, derived from current membership arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSummary {
    pub user_id: String,
    pub workspaces_count: usize,
    pub team_members: usize,
    pub space_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_wire_shape() {
        let response = DeletionResponse::from(ApiIssue::bad_request("userId", "invalid object id"));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "outcome": "issue",
                "status": 400,
                "field": "userId",
                "message": "invalid object id",
            })
        );
        assert_eq!(response.status(), 400);
    }

    #[test]
    fn test_caller_role_parses() {
        assert_eq!("admin".parse::<CallerRole>().unwrap(), CallerRole::Admin);
        assert!(Caller::admin("a").is_admin());
        assert!(!Caller::user("u").is_admin());
    }
}
