pub mod admin;
pub mod locks;
pub mod models;
pub mod service;
pub mod validate;

pub use locks::{DeletionLease, DeletionLocks};
pub use models::{ApiIssue, Caller, CallerRole, DeletionResponse, OwnerSummary};
pub use service::DeletionService;
pub use validate::{is_valid_id, validate_id};
