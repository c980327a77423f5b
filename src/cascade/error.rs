

use thiserror::Error;

use super::executor::ExecutionReport;
use super::graph::GraphError;
use crate::db::StoreError;


#[derive(Debug, Error)]
pub enum CascadeError {
    #[error("{root_type} {root_id} not found (already deleted?)")]
    NotFound { root_type: String, root_id: String },

    #[error("Transient store failure: {0}")]
    TransientStore(String),

    #[error(
        "Cascade for {root_type} {root_id} stopped at step {failed_step} after {completed_steps} completed steps: {cause}"
    )]
    CascadeIncomplete {
        root_type: String,
        root_id: String,
        failed_step: usize,
        completed_steps: usize,
        cause: StoreError,
        report: Box<ExecutionReport>,
    },

    #[error("Concurrent deletion of {root_type} {root_id}: {remaining_steps} steps still pending")]
    ConcurrentDeletion {
        root_type: String,
        root_id: String,
        remaining_steps: usize,
        root_survived: bool,
    },

    #[error("Store failure: {0}")]
    Store(StoreError),

    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl CascadeError {
    /// Whether calling again later can make progress.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CascadeError::TransientStore(_)
                | CascadeError::CascadeIncomplete { .. }
                | CascadeError::ConcurrentDeletion { .. }
        )
    }
}

impl From<StoreError> for CascadeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Transient(msg) => CascadeError::TransientStore(msg),
            permanent => CascadeError::Store(permanent),
        }
    }
}
