

use thiserror::Error;

use crate::cascade::{CascadeError, GraphError};
use crate::db::{HelixClientError, StoreError};


#[derive(Error, Debug)]
pub enum TeamspaceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HelixDB client error: {0}")]
    Client(#[from] HelixClientError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Ownership graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Cascade error: {0}")]
    Cascade(#[from] CascadeError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}


pub type Result<T> = std::result::Result<T, TeamspaceError>;
