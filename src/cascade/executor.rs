

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::error::CascadeError;
use super::graph::EntityType;
use super::plan::{DeletionPlan, DeletionStep, StepAction};
use crate::core::config::TeamspaceConfig;
use crate::db::{DocumentStore, StoreError};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &TeamspaceConfig) -> Self {
        Self {
            max_attempts: config.step_max_attempts.max(1),
            initial_delay: Duration::from_millis(config.retry_initial_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    /// No backoff; for tests and in-memory stores.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before the attempt after one that waited `delay`.
    pub fn backoff(&self, delay: Duration) -> Duration {
        delay.saturating_mul(2).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&TeamspaceConfig::default())
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub index: usize,
    pub entity_type: EntityType,
    pub collection: String,
    pub action: String,
    pub affected: u64,
    pub attempts: u32,
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub root_type: EntityType,
    pub root_id: String,
    pub planned_steps: usize,
    pub outcomes: Vec<StepOutcome>,
    pub failed_step: Option<usize>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionReport {
    fn start(plan: &DeletionPlan) -> Self {
        let now = Utc::now();
        Self {
            root_type: plan.root_type.clone(),
            root_id: plan.root_id.clone(),
            planned_steps: plan.len(),
            outcomes: Vec::with_capacity(plan.len()),
            failed_step: None,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn completed_steps(&self) -> usize {
        self.outcomes.len()
    }

    pub fn records_affected(&self) -> u64 {
        self.outcomes.iter().map(|o| o.affected).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.failed_step.is_none() && self.outcomes.len() == self.planned_steps
    }

    /// Index of the first completed step touching `entity_type`.
    pub fn position_of(&self, entity_type: &EntityType) -> Option<usize> {
        self.outcomes
            .iter()
            .find(|o| &o.entity_type == entity_type)
            .map(|o| o.index)
    }
}


/// Runs plan steps strictly in order against the store. Each step is
/// idempotent, so a step may be retried and an aborted run may be re-planned
/// and resumed without undoing anything.
pub struct CascadeExecutor {
    store: Arc<dyn DocumentStore>,
    retry: RetryPolicy,
}

impl CascadeExecutor {
    pub fn new(store: Arc<dyn DocumentStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub async fn execute(&self, plan: &DeletionPlan) -> Result<ExecutionReport, CascadeError> {
        let mut report = ExecutionReport::start(plan);
        info!(
            "Executing {} steps for {} {} on {}",
            plan.len(),
            plan.root_type,
            plan.root_id,
            self.store.backend_name()
        );

        for (index, step) in plan.steps().iter().enumerate() {
            match self.run_with_retry(index, step).await {
                Ok((affected, attempts)) => {
                    debug!(
                        "Step {} {} on {} affected {} (attempts: {})",
                        index,
                        step.action_name(),
                        step.collection,
                        affected,
                        attempts
                    );
                    report.outcomes.push(StepOutcome {
                        index,
                        entity_type: step.entity_type.clone(),
                        collection: step.collection.clone(),
                        action: step.action_name().to_string(),
                        affected,
                        attempts,
                    });
                }
                Err(cause) => {
                    report.failed_step = Some(index);
                    report.finished_at = Utc::now();
                    let completed_steps = report.completed_steps();

                    error!(
                        root_type = %plan.root_type,
                        root_id = %plan.root_id,
                        failed_step = index,
                        completed_steps,
                        collection = %step.collection,
                        "Cascade incomplete: {}",
                        cause
                    );

                    return Err(CascadeError::CascadeIncomplete {
                        root_type: plan.root_type.to_string(),
                        root_id: plan.root_id.clone(),
                        failed_step: index,
                        completed_steps,
                        cause,
                        report: Box::new(report),
                    });
                }
            }
        }

        report.finished_at = Utc::now();
        info!(
            "Cascade for {} {} finished: {} steps, {} records",
            plan.root_type,
            plan.root_id,
            report.completed_steps(),
            report.records_affected()
        );
        Ok(report)
    }

    async fn run_with_retry(&self, index: usize, step: &DeletionStep) -> Result<(u64, u32), StoreError> {
        let mut delay = self.retry.initial_delay;

        for attempt in 1..=self.retry.max_attempts {
            match self.apply(step).await {
                Ok(affected) => return Ok((affected, attempt)),
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    warn!(
                        "Step {} on {} failed (attempt {}/{}), retrying: {}",
                        index, step.collection, attempt, self.retry.max_attempts, e
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    delay = self.retry.backoff(delay);
                }
                Err(e) => return Err(e),
            }
        }

        Err(StoreError::Transient(format!(
            "step {} made no attempt",
            index
        )))
    }

    async fn apply(&self, step: &DeletionStep) -> Result<u64, StoreError> {
        match &step.action {
            StepAction::DeleteMany => self.store.delete_many(&step.collection, &step.filter).await,
            StepAction::DeleteOne => self.store.delete_one(&step.collection, &step.filter).await,
            StepAction::PullReference { pull } => {
                self.store
                    .update_many(&step.collection, &step.filter, pull)
                    .await
            }
        }
    }
}
