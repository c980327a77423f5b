

use std::sync::Arc;

use tracing::{debug, warn};

use super::error::CascadeError;
use super::executor::ExecutionReport;
use super::graph::EntityType;
use super::plan::{DeletionPlan, StepAction};
use super::planner::DeletionPlanner;


#[derive(Debug, Clone)]
pub enum Convergence {
    Converged,
    Residual {
        plan: DeletionPlan,
        /// The root is still present although its delete step reported success.
        root_survived: bool,
    },
}

impl Convergence {
    pub fn is_converged(&self) -> bool {
        matches!(self, Convergence::Converged)
    }
}


/// A root counts as deleted once planning against current state finds
/// nothing left to do.
pub struct ConvergenceGuard {
    planner: Arc<DeletionPlanner>,
}

impl ConvergenceGuard {
    pub fn new(planner: Arc<DeletionPlanner>) -> Self {
        Self { planner }
    }

    pub async fn verify(&self, root_type: &EntityType, root_id: &str) -> Result<bool, CascadeError> {
        Ok(self.planner.residual(root_type, root_id).await?.is_empty())
    }

    /// Checks the store after a run that reported success.
    pub async fn check(&self, report: &ExecutionReport) -> Result<Convergence, CascadeError> {
        let residual = self
            .planner
            .residual(&report.root_type, &report.root_id)
            .await?;

        if residual.is_empty() {
            debug!("{} {} converged", report.root_type, report.root_id);
            return Ok(Convergence::Converged);
        }

        let root_deleted_in_run = report.outcomes.iter().any(|o| {
            o.entity_type == report.root_type && o.action == StepAction::DeleteOne.name()
        });
        let root_survived = root_deleted_in_run && residual.removes_root();

        warn!(
            "{} {} has {} residual steps after a successful run (root survived: {})",
            report.root_type,
            report.root_id,
            residual.len(),
            root_survived
        );
        Ok(Convergence::Residual {
            plan: residual,
            root_survived,
        })
    }
}
