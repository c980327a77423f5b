

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::locks::DeletionLocks;
use super::models::{ApiIssue, Caller, DeletionResponse};
use super::validate::validate_id;
use crate::cascade::collab::{collaboration_graph, USER};
use crate::cascade::{CascadeEngine, CascadeError, DeletionSummary, EntityType, RetryPolicy};
use crate::core::config::{StoreBackend, TeamspaceConfig};
use crate::core::events::{
    Event, EventBus, CASCADE_COMPLETED, CASCADE_INCOMPLETE, CASCADE_RACE_DETECTED, CASCADE_REJECTED,
};
use crate::core::Result;
use crate::db::{DocumentStore, HelixClient, HelixStore, InMemoryStore};


/// Entry point for deletion requests: authorizes the caller, validates the
/// target, serializes work per root and turns engine outcomes into responses.
/// Events are published only once a run has finished.
pub struct DeletionService {
    engine: CascadeEngine,
    store: Arc<dyn DocumentStore>,
    events: Arc<EventBus>,
    locks: DeletionLocks,
}

impl DeletionService {
    pub fn new(engine: CascadeEngine, store: Arc<dyn DocumentStore>, events: Arc<EventBus>) -> Self {
        Self {
            engine,
            store,
            events,
            locks: DeletionLocks::new(),
        }
    }

    /// Builds the store named by `config.backend` and the default
    /// collaboration graph on top of it.
    pub async fn from_config(config: &TeamspaceConfig) -> Result<Self> {
        let store: Arc<dyn DocumentStore> = match config.backend {
            StoreBackend::Memory => Arc::new(InMemoryStore::new()),
            StoreBackend::Helix => {
                let client = HelixClient::from_config(config)?;
                client.connect().await?;
                Arc::new(HelixStore::new(Arc::new(client)))
            }
        };
        info!("Deletion service using {} store", store.backend_name());

        Self::with_store(config, store)
    }

    pub fn with_store(config: &TeamspaceConfig, store: Arc<dyn DocumentStore>) -> Result<Self> {
        let graph = Arc::new(collaboration_graph()?);
        let engine = CascadeEngine::new(graph, store.clone(), RetryPolicy::from_config(config))
            .with_race_replan(config.race_replan);
        Ok(Self::new(engine, store, Arc::new(EventBus::new())))
    }

    pub fn engine(&self) -> &CascadeEngine {
        &self.engine
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn locks(&self) -> &DeletionLocks {
        &self.locks
    }

    /// Self-service account deletion.
    pub async fn delete_account(&self, caller: &Caller) -> DeletionResponse {
        self.delete_entity(caller, USER, &caller.id).await
    }

    pub async fn admin_delete_user(&self, caller: &Caller, user_id: &str) -> DeletionResponse {
        self.delete_entity(caller, USER, user_id).await
    }

    pub async fn delete_entity(&self, caller: &Caller, target_type: &str, target_id: &str) -> DeletionResponse {
        let correlation_id = Uuid::new_v4();

        let root_type = match self.admit(caller, target_type, target_id) {
            Ok(root_type) => root_type,
            Err(issue) => return self.reject(correlation_id, target_type, target_id, issue).await,
        };

        let Some(_lease) = self.locks.try_acquire(target_type, target_id) else {
            return in_progress(target_type, target_id);
        };

        info!(
            "{} {} requested deletion of {} {} ({})",
            caller.role, caller.id, target_type, target_id, correlation_id
        );
        let result = self.engine.delete(&root_type, target_id).await;
        let success_message = if caller.id == target_id {
            "Your account has been deleted"
        } else {
            "Deleted"
        };
        self.respond(correlation_id, result, success_message).await
    }

    /// Runs whatever is left for a root, even when the root record is already
    /// gone. Same authorization as `delete_entity`, since a root that still
    /// exists is deleted by the residual run. Succeeds without mutations when
    /// nothing remains.
    pub async fn resume(&self, caller: &Caller, target_type: &str, target_id: &str) -> DeletionResponse {
        let correlation_id = Uuid::new_v4();

        let root_type = match self.admit(caller, target_type, target_id) {
            Ok(root_type) => root_type,
            Err(issue) => return self.reject(correlation_id, target_type, target_id, issue).await,
        };

        let Some(_lease) = self.locks.try_acquire(target_type, target_id) else {
            return in_progress(target_type, target_id);
        };

        info!(
            "{} {} resumed deletion of {} {} ({})",
            caller.role, caller.id, target_type, target_id, correlation_id
        );
        let result = self.engine.resume(&root_type, target_id).await;
        let message = match &result {
            Ok(summary) if summary.steps_executed() == 0 => "Nothing left to delete",
            _ => "Deletion resumed and completed",
        };
        self.respond(correlation_id, result, message).await
    }

    fn admit(&self, caller: &Caller, target_type: &str, target_id: &str) -> std::result::Result<EntityType, ApiIssue> {
        let root_type = self.target(target_type, target_id)?;

        let self_delete = target_type == USER && caller.id == target_id;
        if !self_delete && !caller.is_admin() {
            return Err(ApiIssue::forbidden(format!(
                "{} may not delete {} {}",
                caller.id, target_type, target_id
            )));
        }
        Ok(root_type)
    }

    fn target(&self, target_type: &str, target_id: &str) -> std::result::Result<EntityType, ApiIssue> {
        let field = id_field(target_type);
        validate_id(&field, target_id)?;

        let root_type = EntityType::new(target_type);
        if self.engine.graph().entity(&root_type).is_none() {
            return Err(ApiIssue::bad_request("targetType", format!("unknown type {}", target_type)));
        }
        Ok(root_type)
    }

    async fn reject(&self, correlation_id: Uuid, target_type: &str, target_id: &str, issue: ApiIssue) -> DeletionResponse {
        warn!("Rejected deletion of {} {}: {}", target_type, target_id, issue);
        self.publish(correlation_id, CASCADE_REJECTED, json!({
            "root_type": target_type,
            "root_id": target_id,
            "status": issue.status,
            "field": issue.field,
            "message": issue.message,
        }))
        .await;
        issue.into()
    }

    async fn respond(
        &self,
        correlation_id: Uuid,
        result: std::result::Result<DeletionSummary, CascadeError>,
        success_message: &str,
    ) -> DeletionResponse {
        match result {
            Ok(summary) => {
                if summary.replanned {
                    self.publish(correlation_id, CASCADE_RACE_DETECTED, json!({
                        "root_type": summary.root_type,
                        "root_id": summary.root_id,
                        "resolved": true,
                    }))
                    .await;
                }
                self.publish(correlation_id, CASCADE_COMPLETED, json!({
                    "root_type": summary.root_type,
                    "root_id": summary.root_id,
                    "steps_executed": summary.steps_executed(),
                    "records_affected": summary.records_affected(),
                    "replanned": summary.replanned,
                }))
                .await;

                DeletionResponse::Success {
                    message: success_message.to_string(),
                    steps_executed: summary.steps_executed(),
                    records_affected: summary.records_affected(),
                }
            }
            Err(CascadeError::NotFound { root_type, root_id }) => {
                let issue = ApiIssue::bad_request(&id_field(&root_type), format!("{} already deleted", root_type));
                self.reject(correlation_id, &root_type, &root_id, issue).await
            }
            Err(CascadeError::UnknownEntityType(entity_type)) => {
                ApiIssue::bad_request("targetType", format!("unknown type {}", entity_type)).into()
            }
            Err(CascadeError::CascadeIncomplete {
                root_type,
                root_id,
                failed_step,
                completed_steps,
                cause,
                ..
            }) => {
                self.publish(correlation_id, CASCADE_INCOMPLETE, json!({
                    "root_type": root_type,
                    "root_id": root_id,
                    "failed_step": failed_step,
                    "completed_steps": completed_steps,
                    "cause": cause.to_string(),
                }))
                .await;

                DeletionResponse::RetryableFailure {
                    message: format!("Deletion of {} {} stopped: {}", root_type, root_id, cause),
                    failed_step: Some(failed_step),
                    completed_steps,
                }
            }
            Err(CascadeError::ConcurrentDeletion {
                root_type,
                root_id,
                remaining_steps,
                root_survived,
            }) => {
                self.publish(correlation_id, CASCADE_RACE_DETECTED, json!({
                    "root_type": root_type,
                    "root_id": root_id,
                    "resolved": false,
                    "remaining_steps": remaining_steps,
                    "root_survived": root_survived,
                }))
                .await;

                DeletionResponse::RetryableFailure {
                    message: format!(
                        "{} {} changed while being deleted; {} steps still pending",
                        root_type, root_id, remaining_steps
                    ),
                    failed_step: None,
                    completed_steps: 0,
                }
            }
            Err(err @ CascadeError::TransientStore(_)) => DeletionResponse::RetryableFailure {
                message: err.to_string(),
                failed_step: None,
                completed_steps: 0,
            },
            Err(err) => {
                error!("Deletion failed: {}", err);
                ApiIssue::new(500, "store", err.to_string()).into()
            }
        }
    }

    async fn publish(&self, correlation_id: Uuid, event_type: &str, payload: serde_json::Value) {
        let event = Event::new(event_type, payload)
            .with_correlation(correlation_id)
            .with_metadata(json!({ "store": self.store.backend_name() }));
        let observers = self.events.emit(event).await;
        debug!("{} ({}) reached {} observers", event_type, correlation_id, observers);
    }
}

fn id_field(target_type: &str) -> String {
    format!("{}Id", target_type)
}

fn in_progress(target_type: &str, target_id: &str) -> DeletionResponse {
    DeletionResponse::RetryableFailure {
        message: format!("Deletion of {} {} already in progress", target_type, target_id),
        failed_step: None,
        completed_steps: 0,
    }
}
