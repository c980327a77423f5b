

use std::sync::Arc;

use tracing::debug;

use super::error::CascadeError;
use super::graph::{EdgeKind, EntityDescriptor, EntityType, OwnershipEdge, OwnershipGraph};
use super::plan::{DeletionPlan, DeletionStep};
use crate::db::{document_ids, DocumentStore, Filter, ID_FIELD};


/// Resolves the ownership graph against current store contents.
///
/// Step order: owned aggregates (deepest dependents first, aggregate last),
/// then detachment from containers the root only belongs to, then leaf
/// collections keyed by the root, then the root. Collections with nothing
/// left to remove yield no step, so a converged root plans to nothing.
pub struct DeletionPlanner {
    graph: Arc<OwnershipGraph>,
    store: Arc<dyn DocumentStore>,
}

impl DeletionPlanner {
    pub fn new(graph: Arc<OwnershipGraph>, store: Arc<dyn DocumentStore>) -> Self {
        Self { graph, store }
    }

    pub fn graph(&self) -> &OwnershipGraph {
        &self.graph
    }

    /// Plans deletion of an existing root. Fails with `NotFound` before
    /// touching anything else when the root is absent.
    pub async fn plan(&self, root_type: &EntityType, root_id: &str) -> Result<DeletionPlan, CascadeError> {
        let root = self.descriptor(root_type)?;
        if !self.store.exists(&root.collection, &Filter::by_id(root_id)).await? {
            debug!("Plan requested for missing {} {}", root_type, root_id);
            return Err(CascadeError::NotFound {
                root_type: root_type.to_string(),
                root_id: root_id.to_string(),
            });
        }

        self.residual(root_type, root_id).await
    }

    /// Plans whatever is still left for `root_id`, whether or not the root
    /// record survives.
    pub async fn residual(&self, root_type: &EntityType, root_id: &str) -> Result<DeletionPlan, CascadeError> {
        let root = self.descriptor(root_type)?;
        let root_ids = [root_id.to_string()];
        let mut steps = Vec::new();

        let (aggregate_edges, leaf_edges): (Vec<&OwnershipEdge>, Vec<&OwnershipEdge>) = self
            .graph
            .owned_edges(root_type)
            .partition(|edge| self.graph.is_aggregate_edge(edge));

        let mut cascade = Vec::new();
        let mut frontier = Vec::new();
        for edge in aggregate_edges {
            self.expand_edge(edge, &root_ids, 0, &mut cascade, &mut frontier).await?;
        }
        while let Some((entity_type, ids, depth)) = frontier.pop() {
            for edge in self.graph.edges_from(&entity_type) {
                self.expand_edge(edge, &ids, depth + 1, &mut cascade, &mut frontier).await?;
            }
        }
        // A child reachable over several paths keeps only its deepest step.
        cascade.sort_by(|(a, _), (b, _)| b.cmp(a));
        for (_, step) in cascade {
            if !steps.contains(&step) {
                steps.push(step);
            }
        }

        for edge in self.graph.member_edges(root_type) {
            self.detach(edge, root_id, &mut steps).await?;
        }

        for edge in leaf_edges {
            let child = self.descriptor(&edge.child)?;
            let filter = edge.template.bind(root_id);
            if self.store.exists(&child.collection, &filter).await? {
                steps.push(DeletionStep::delete_many(edge.child.clone(), &child.collection, filter));
            }
        }

        let root_filter = Filter::by_id(root_id);
        if self.store.exists(&root.collection, &root_filter).await? {
            steps.push(DeletionStep::delete_one(root_type.clone(), &root.collection, root_filter));
        }

        debug!("Planned {} steps for {} {}", steps.len(), root_type, root_id);
        Ok(DeletionPlan::new(root_type.clone(), root_id, steps))
    }

    /// Adds the step for one edge below a doomed parent set. Owned children
    /// that cascade further are queued on `frontier` so their own dependents
    /// get planned at the next depth.
    async fn expand_edge(
        &self,
        edge: &OwnershipEdge,
        parent_ids: &[String],
        depth: usize,
        cascade: &mut Vec<(usize, DeletionStep)>,
        frontier: &mut Vec<(EntityType, Vec<String>, usize)>,
    ) -> Result<(), CascadeError> {
        let child = self.descriptor(&edge.child)?;

        if edge.kind == EdgeKind::Member {
            for parent_id in parent_ids {
                let mut detach = Vec::new();
                self.detach(edge, parent_id, &mut detach).await?;
                cascade.extend(detach.into_iter().map(|step| (depth, step)));
            }
            return Ok(());
        }

        for filter in edge.template.bind_many(parent_ids) {
            if self.graph.has_dependents(&edge.child) {
                let docs = self.store.find(&child.collection, &filter, &[ID_FIELD]).await?;
                let ids = document_ids(&docs);
                if ids.is_empty() {
                    continue;
                }

                // Doomed aggregates are addressed by id so that a container
                // joined after planning is left for the next run to judge.
                let step_filter = if edge.template.is_membership() {
                    Filter::ids(ids.clone())
                } else {
                    filter
                };
                debug!("{} {} entities doomed at depth {}", ids.len(), edge.child, depth);
                frontier.push((edge.child.clone(), ids, depth));
                cascade.push((depth, DeletionStep::delete_many(edge.child.clone(), &child.collection, step_filter)));
            } else if self.store.exists(&child.collection, &filter).await? {
                cascade.push((depth, DeletionStep::delete_many(edge.child.clone(), &child.collection, filter)));
            }
        }
        Ok(())
    }

    async fn detach(
        &self,
        edge: &OwnershipEdge,
        member_id: &str,
        steps: &mut Vec<DeletionStep>,
    ) -> Result<(), CascadeError> {
        let container = self.descriptor(&edge.child)?;
        let Some(pull) = edge.template.pull(member_id) else {
            return Ok(());
        };

        let filter = edge.template.bind(member_id);
        if self.store.exists(&container.collection, &filter).await? {
            steps.push(DeletionStep::pull(edge.child.clone(), &container.collection, filter, pull));
        }
        Ok(())
    }

    fn descriptor(&self, entity_type: &EntityType) -> Result<&EntityDescriptor, CascadeError> {
        self.graph
            .entity(entity_type)
            .ok_or_else(|| CascadeError::UnknownEntityType(entity_type.to_string()))
    }
}
