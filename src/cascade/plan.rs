

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use super::graph::EntityType;
use crate::db::{Filter, PullSpec};


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display, IntoStaticStr)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StepAction {
    DeleteMany,
    PullReference { pull: PullSpec },
    DeleteOne,
}

impl StepAction {
    pub fn name(&self) -> &'static str {
        self.into()
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionStep {
    pub entity_type: EntityType,
    pub collection: String,
    pub filter: Filter,
    #[serde(flatten)]
    pub action: StepAction,
}

impl DeletionStep {
    pub fn delete_many(entity_type: EntityType, collection: impl Into<String>, filter: Filter) -> Self {
        Self {
            entity_type,
            collection: collection.into(),
            filter,
            action: StepAction::DeleteMany,
        }
    }

    pub fn delete_one(entity_type: EntityType, collection: impl Into<String>, filter: Filter) -> Self {
        Self {
            entity_type,
            collection: collection.into(),
            filter,
            action: StepAction::DeleteOne,
        }
    }

    pub fn pull(
        entity_type: EntityType,
        collection: impl Into<String>,
        filter: Filter,
        pull: PullSpec,
    ) -> Self {
        Self {
            entity_type,
            collection: collection.into(),
            filter,
            action: StepAction::PullReference { pull },
        }
    }

    pub fn action_name(&self) -> &'static str {
        self.action.name()
    }
}


/// Ordered steps removing one root. Never persisted: recomputed from the
/// current store contents on every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionPlan {
    pub root_type: EntityType,
    pub root_id: String,
    steps: Vec<DeletionStep>,
}

impl DeletionPlan {
    pub fn new(root_type: EntityType, root_id: impl Into<String>, steps: Vec<DeletionStep>) -> Self {
        Self {
            root_type,
            root_id: root_id.into(),
            steps,
        }
    }

    pub fn steps(&self) -> &[DeletionStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Whether the plan still has to delete the root record itself.
    pub fn removes_root(&self) -> bool {
        self.steps
            .iter()
            .any(|step| step.entity_type == self.root_type && step.action == StepAction::DeleteOne)
    }

    /// First `count` steps, as left behind by an interrupted run.
    pub fn prefix(&self, count: usize) -> Self {
        Self {
            root_type: self.root_type.clone(),
            root_id: self.root_id.clone(),
            steps: self.steps.iter().take(count).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_serializes_flat() {
        let step = DeletionStep::pull(
            EntityType::new("workspace"),
            "workspaces",
            Filter::by_id("w1"),
            PullSpec {
                array: "teamMembers".into(),
                member_field: "member".into(),
                member: "u1".into(),
            },
        );

        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["action"], "PULL_REFERENCE");
        assert_eq!(json["pull"]["member"], "u1");
        assert_eq!(json["collection"], "workspaces");
        assert_eq!(step.action_name(), "PULL_REFERENCE");
    }

    #[test]
    fn test_removes_root_and_prefix() {
        let user = EntityType::new("user");
        let plan = DeletionPlan::new(
            user.clone(),
            "u1",
            vec![
                DeletionStep::delete_many(EntityType::new("notification"), "notifications", Filter::Eq {
                    field: "user".into(),
                    value: "u1".into(),
                }),
                DeletionStep::delete_one(user, "users", Filter::by_id("u1")),
            ],
        );

        assert!(plan.removes_root());
        let head = plan.prefix(1);
        assert_eq!(head.len(), 1);
        assert!(!head.removes_root());
        assert_eq!(serde_json::to_value(&head).unwrap()["root_id"], json!("u1"));
    }
}
