pub mod collab;
pub mod engine;
pub mod error;
pub mod executor;
pub mod graph;
pub mod guard;
pub mod plan;
pub mod planner;

#[cfg(test)]
pub(crate) mod fixtures;

pub use collab::collaboration_graph;
pub use engine::{CascadeEngine, DeletionSummary};
pub use error::CascadeError;
pub use executor::{CascadeExecutor, ExecutionReport, RetryPolicy, StepOutcome};
pub use graph::{
    EdgeKind, EntityDescriptor, EntityType, FilterTemplate, GraphError, OwnershipEdge,
    OwnershipGraph, OwnershipGraphBuilder,
};
pub use guard::{Convergence, ConvergenceGuard};
pub use plan::{DeletionPlan, DeletionStep, StepAction};
pub use planner::DeletionPlanner;
