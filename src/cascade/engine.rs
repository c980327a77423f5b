

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::error::CascadeError;
use super::executor::{CascadeExecutor, ExecutionReport, RetryPolicy};
use super::graph::{EntityType, OwnershipGraph};
use super::guard::{Convergence, ConvergenceGuard};
use super::plan::DeletionPlan;
use super::planner::DeletionPlanner;
use crate::db::DocumentStore;


#[derive(Debug, Clone, Serialize)]
pub struct DeletionSummary {
    pub root_type: EntityType,
    pub root_id: String,
    pub reports: Vec<ExecutionReport>,
    /// A residual plan had to be executed after the first run.
    pub replanned: bool,
}

impl DeletionSummary {
    pub fn steps_executed(&self) -> usize {
        self.reports.iter().map(ExecutionReport::completed_steps).sum()
    }

    pub fn records_affected(&self) -> u64 {
        self.reports.iter().map(ExecutionReport::records_affected).sum()
    }
}


/// Planner, executor and convergence guard wired together.
pub struct CascadeEngine {
    planner: Arc<DeletionPlanner>,
    executor: CascadeExecutor,
    guard: ConvergenceGuard,
    race_replan: bool,
}

impl CascadeEngine {
    pub fn new(graph: Arc<OwnershipGraph>, store: Arc<dyn DocumentStore>, retry: RetryPolicy) -> Self {
        let planner = Arc::new(DeletionPlanner::new(graph, store.clone()));
        Self {
            executor: CascadeExecutor::new(store, retry),
            guard: ConvergenceGuard::new(planner.clone()),
            planner,
            race_replan: true,
        }
    }

    #[must_use]
    pub fn with_race_replan(mut self, enabled: bool) -> Self {
        self.race_replan = enabled;
        self
    }

    pub fn planner(&self) -> &DeletionPlanner {
        &self.planner
    }

    pub fn guard(&self) -> &ConvergenceGuard {
        &self.guard
    }

    pub fn graph(&self) -> &OwnershipGraph {
        self.planner.graph()
    }

    /// Steps a deletion of `root_id` would run right now.
    pub async fn preview(&self, root_type: &EntityType, root_id: &str) -> Result<DeletionPlan, CascadeError> {
        self.planner.residual(root_type, root_id).await
    }

    /// Deletes an existing root and everything it owns.
    pub async fn delete(&self, root_type: &EntityType, root_id: &str) -> Result<DeletionSummary, CascadeError> {
        let plan = self.planner.plan(root_type, root_id).await?;
        self.run(plan).await
    }

    /// Finishes an interrupted deletion. Succeeds without touching the store
    /// when nothing is left.
    pub async fn resume(&self, root_type: &EntityType, root_id: &str) -> Result<DeletionSummary, CascadeError> {
        let plan = self.planner.residual(root_type, root_id).await?;
        if plan.is_empty() {
            info!("Nothing left to delete for {} {}", root_type, root_id);
        }
        self.run(plan).await
    }

    async fn run(&self, plan: DeletionPlan) -> Result<DeletionSummary, CascadeError> {
        let root_type = plan.root_type.clone();
        let root_id = plan.root_id.clone();

        let report = self.executor.execute(&plan).await?;
        let convergence = self.guard.check(&report).await?;
        let mut summary = DeletionSummary {
            root_type: root_type.clone(),
            root_id: root_id.clone(),
            reports: vec![report],
            replanned: false,
        };

        let Convergence::Residual { plan: residual, root_survived } = convergence else {
            return Ok(summary);
        };

        if !self.race_replan {
            return Err(CascadeError::ConcurrentDeletion {
                root_type: root_type.to_string(),
                root_id,
                remaining_steps: residual.len(),
                root_survived,
            });
        }

        warn!(
            "Concurrent change while deleting {} {}; re-running {} residual steps",
            root_type,
            root_id,
            residual.len()
        );
        let report = self.executor.execute(&residual).await?;
        let convergence = self.guard.check(&report).await?;
        summary.reports.push(report);
        summary.replanned = true;

        match convergence {
            Convergence::Converged => Ok(summary),
            Convergence::Residual { plan, root_survived } => Err(CascadeError::ConcurrentDeletion {
                root_type: root_type.to_string(),
                root_id,
                remaining_steps: plan.len(),
                root_survived,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::collab::*;
    use crate::cascade::fixtures::{self, ids, RacingStore};
    use crate::db::{FaultKind, InMemoryStore};
    use serde_json::{json, Value};

    fn build_engine(store: Arc<dyn DocumentStore>) -> CascadeEngine {
        CascadeEngine::new(fixtures::graph(), store, RetryPolicy::immediate(3))
    }

    fn user() -> EntityType {
        EntityType::new(USER)
    }

    fn member_ids(doc: &Value, array: &str) -> Vec<String> {
        doc[array]
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e["member"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_user_deletion_scenario() {
        let store = fixtures::seeded_store();
        let engine = build_engine(store.clone());

        let summary = engine.delete(&user(), ids::U).await.unwrap();
        assert!(!summary.replanned);

        for (collection, id) in [
            (COMMENT_CHATS, ids::M1),
            (CHECKLISTS, ids::K1),
            (CARDS, ids::C1),
            (LISTS, ids::L1),
            (LISTS, ids::L2),
            (SPACES, ids::A),
            (SPACE_CHATS, ids::A_CHAT),
            (SPACE_FILES, ids::A_FILE),
            (CALLS, ids::A_CALL),
            (NOTIFICATIONS, ids::N1),
            (NOTIFICATIONS, ids::N2),
            (USERS, ids::U),
        ] {
            assert!(store.get(collection, id).is_none(), "{collection}/{id} survived");
        }

        let space_b = store.get(SPACES, ids::B).unwrap();
        assert_eq!(member_ids(&space_b, SPACE_MEMBERS), vec![ids::V.to_string()]);
        let workspace = store.get(WORKSPACES, ids::W).unwrap();
        assert_eq!(member_ids(&workspace, TEAM_MEMBERS), vec![ids::V.to_string()]);

        for (collection, id) in [
            (USERS, ids::V),
            (LISTS, ids::L3),
            (CARDS, ids::C2),
            (NOTIFICATIONS, ids::N3),
            (USER_SESSIONS, ids::V_SESSION),
        ] {
            assert!(store.get(collection, id).is_some(), "{collection}/{id} was removed");
        }
        assert_eq!(store.count(WORKSPACE_SETTINGS), 0);
        assert_eq!(store.count(SUBSCRIPTIONS), 0);
    }

    #[tokio::test]
    async fn test_second_run_is_noop() {
        let store = fixtures::seeded_store();
        let engine = build_engine(store.clone());

        engine.delete(&user(), ids::U).await.unwrap();
        let after_first = fixtures::snapshot(&store);
        let mutations = store.mutation_count();

        assert!(engine.preview(&user(), ids::U).await.unwrap().is_empty());
        assert!(engine.guard().verify(&user(), ids::U).await.unwrap());

        let summary = engine.resume(&user(), ids::U).await.unwrap();
        assert_eq!(summary.steps_executed(), 0);
        assert_eq!(store.mutation_count(), mutations);
        assert_eq!(fixtures::snapshot(&store), after_first);

        assert!(matches!(
            engine.delete(&user(), ids::U).await,
            Err(CascadeError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_no_dangling_children_or_references() {
        let store = fixtures::seeded_store();
        let engine = build_engine(store.clone());
        let graph = engine.graph();

        engine.delete(&user(), ids::U).await.unwrap();

        let deleted = [
            (SPACE, ids::A),
            (LIST, ids::L1),
            (LIST, ids::L2),
            (CARD, ids::C1),
            (USER, ids::U),
        ];
        for (parent, id) in deleted {
            let parent = EntityType::new(parent);
            for edge in graph.owned_edges(&parent) {
                let child = graph.entity(&edge.child).unwrap();
                let filter = edge.template.bind(id);
                assert!(
                    !store.exists(&child.collection, &filter).await.unwrap(),
                    "{edge} left children of {id}"
                );
            }
        }

        for collection in [SPACES, WORKSPACES] {
            for doc in store.documents(collection) {
                for array in [SPACE_MEMBERS, TEAM_MEMBERS] {
                    assert!(!member_ids(&doc, array).contains(&ids::U.to_string()));
                }
            }
        }
    }

    #[tokio::test]
    async fn test_children_precede_their_aggregate() {
        let store = fixtures::seeded_store();
        let engine = build_engine(store.clone());

        let summary = engine.delete(&user(), ids::U).await.unwrap();
        let report = &summary.reports[0];
        let at = |t: &str| report.position_of(&EntityType::new(t)).unwrap();

        assert!(at(CHECKLIST) < at(CARD));
        assert!(at(COMMENT_CHAT) < at(CARD));
        assert!(at(CARD) < at(LIST));
        assert!(at(LIST) < at(SPACE));
        assert!(at(SPACE_CHAT) < at(SPACE));
        assert!(at(CALL) < at(SPACE));
        assert!(at(SPACE) < at(WORKSPACE));
        assert!(at(WORKSPACE) < at(NOTIFICATION));
        assert_eq!(at(USER), report.completed_steps() - 1);
    }

    #[tokio::test]
    async fn test_missing_root_touches_nothing() {
        let store = fixtures::seeded_store();
        let engine = build_engine(store.clone());
        let before = fixtures::snapshot(&store);

        let err = engine.delete(&user(), ids::GHOST).await.unwrap_err();

        assert!(matches!(err, CascadeError::NotFound { .. }));
        assert!(!err.is_retryable());
        assert_eq!(store.mutation_count(), 0);
        assert_eq!(fixtures::snapshot(&store), before);
    }

    #[tokio::test]
    async fn test_resume_after_interruption_at_every_step() {
        let reference = fixtures::seeded_store();
        let full_plan = build_engine(reference.clone())
            .planner()
            .plan(&user(), ids::U)
            .await
            .unwrap();
        build_engine(reference.clone()).delete(&user(), ids::U).await.unwrap();
        let expected = fixtures::snapshot(&reference);

        for k in 0..full_plan.len() {
            let store = fixtures::seeded_store();
            let engine = build_engine(store.clone());
            let executor = CascadeExecutor::new(store.clone(), RetryPolicy::immediate(1));

            let plan = engine.planner().plan(&user(), ids::U).await.unwrap();
            executor.execute(&plan.prefix(k)).await.unwrap();

            let residual = engine.preview(&user(), ids::U).await.unwrap();
            assert!(residual.len() <= plan.len() - k, "residual grew after {k} steps");

            engine.resume(&user(), ids::U).await.unwrap();
            assert_eq!(fixtures::snapshot(&store), expected, "diverged after stopping at {k}");
        }
    }

    #[tokio::test]
    async fn test_incomplete_cascade_resumes_after_fault_clears() {
        let store = fixtures::seeded_store();
        store.fail_next(SPACES, 10, FaultKind::Transient);
        let engine = build_engine(store.clone());

        let err = engine.delete(&user(), ids::U).await.unwrap_err();
        let CascadeError::CascadeIncomplete { failed_step, completed_steps, report, .. } = err else {
            panic!("expected incomplete cascade, got {err}");
        };
        assert_eq!(failed_step, completed_steps);
        assert_eq!(report.outcomes.last().map(|o| o.collection.as_str()), Some(CARDS));
        assert!(store.get(CARDS, ids::C1).is_none());
        assert!(store.get(SPACES, ids::A).is_some());

        store.clear_faults();
        let summary = engine.delete(&user(), ids::U).await.unwrap();
        assert_eq!(summary.reports[0].position_of(&EntityType::new(SPACE)), Some(0));
        assert!(engine.guard().verify(&user(), ids::U).await.unwrap());
    }

    #[tokio::test]
    async fn test_crash_mid_cascade_then_resume() {
        let store = fixtures::seeded_store();
        store.abort_after(5);
        let engine = build_engine(store.clone());

        let err = engine.delete(&user(), ids::U).await.unwrap_err();
        assert!(matches!(
            err,
            CascadeError::CascadeIncomplete { completed_steps: 5, .. }
        ));
        assert!(err.is_retryable());
        assert!(store.get(USERS, ids::U).is_some());

        store.clear_faults();
        let summary = engine.resume(&user(), ids::U).await.unwrap();
        assert!(summary.steps_executed() > 0);
        assert!(engine.guard().verify(&user(), ids::U).await.unwrap());
        assert!(store.get(USERS, ids::U).is_none());
    }

    #[tokio::test]
    async fn test_concurrent_insert_triggers_one_replan() {
        let inner = fixtures::seeded_store();
        let racing = Arc::new(RacingStore::new(inner.clone(), 1, false));
        let engine = build_engine(racing);

        let summary = engine.delete(&user(), ids::U).await.unwrap();

        assert!(summary.replanned);
        assert_eq!(summary.reports.len(), 2);
        assert_eq!(inner.count(NOTIFICATIONS), 1);
    }

    #[tokio::test]
    async fn test_persistent_race_escalates() {
        let inner = fixtures::seeded_store();
        let racing = Arc::new(RacingStore::new(inner.clone(), u32::MAX, false));
        let engine = build_engine(racing);

        let err = engine.delete(&user(), ids::U).await.unwrap_err();
        assert!(matches!(
            err,
            CascadeError::ConcurrentDeletion { root_survived: false, remaining_steps: 1, .. }
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_surviving_root_is_reported() {
        let inner = fixtures::seeded_store();
        let racing = Arc::new(RacingStore::new(inner.clone(), 0, true));
        let engine = build_engine(racing).with_race_replan(false);

        let err = engine.delete(&user(), ids::U).await.unwrap_err();
        assert!(matches!(
            err,
            CascadeError::ConcurrentDeletion { root_survived: true, .. }
        ));
        assert!(inner.get(USERS, ids::U).is_some());
    }

    #[tokio::test]
    async fn test_space_takes_cards_outside_its_lists() {
        let store = fixtures::seeded_store();
        store.insert(CARDS, json!({ "_id": "loose-card", "spaceRef": ids::A }));
        store.insert(CHECKLISTS, json!({ "_id": "loose-checklist", "cardRef": "loose-card" }));
        store.insert(COMMENT_CHATS, json!({ "_id": "space-comment", "spaceRef": ids::A }));
        store.insert(CHECKLISTS, json!({ "_id": "space-checklist", "spaceRef": ids::A }));
        let engine = build_engine(store.clone());

        engine.delete(&user(), ids::U).await.unwrap();

        for (collection, id) in [
            (CARDS, "loose-card"),
            (CHECKLISTS, "loose-checklist"),
            (COMMENT_CHATS, "space-comment"),
            (CHECKLISTS, "space-checklist"),
        ] {
            assert!(store.get(collection, id).is_none(), "{collection}/{id} survived");
        }
        assert!(store.get(CARDS, ids::C2).is_some());
        assert!(engine.guard().verify(&user(), ids::U).await.unwrap());
    }

    #[tokio::test]
    async fn test_other_user_cascade_leaves_u_spaces() {
        let store = Arc::new(InMemoryStore::new());
        fixtures::seed(&store);
        let engine = build_engine(store.clone());

        engine.delete(&user(), ids::V).await.unwrap();

        assert!(store.get(SPACES, ids::B).is_none());
        assert!(store.get(LISTS, ids::L3).is_none());
        let space_a = store.get(SPACES, ids::A).unwrap();
        assert_eq!(member_ids(&space_a, SPACE_MEMBERS), vec![ids::U.to_string()]);
        assert!(store.get(LISTS, ids::L1).is_some());
    }
}
