

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::db::{Filter, PullSpec};


#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(String);

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    /// Child is destroyed along with its parent.
    Owns,
    /// Child only loses its reference to the parent.
    Member,
}


/// How a child collection points at its parent, with the parent id left unbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterTemplate {
    /// `child[field] == parent id`
    FieldRef { field: String },
    /// `child[array]` holds `{ member_field: parent id, role_field: role }`.
    /// `roles: None` matches any role.
    Membership {
        array: String,
        member_field: String,
        role_field: String,
        roles: Option<Vec<String>>,
    },
}

impl FilterTemplate {
    pub fn field(field: impl Into<String>) -> Self {
        FilterTemplate::FieldRef {
            field: field.into(),
        }
    }

    pub fn membership(array: impl Into<String>, roles: Option<&[&str]>) -> Self {
        FilterTemplate::Membership {
            array: array.into(),
            member_field: "member".to_string(),
            role_field: "role".to_string(),
            roles: roles.map(|roles| roles.iter().map(|r| r.to_string()).collect()),
        }
    }

    
    pub fn bind(&self, parent_id: &str) -> Filter {
        match self {
            FilterTemplate::FieldRef { field } => Filter::Eq {
                field: field.clone(),
                value: parent_id.to_string(),
            },
            FilterTemplate::Membership {
                array,
                member_field,
                role_field,
                roles,
            } => Filter::ElemMatch {
                array: array.clone(),
                member_field: member_field.clone(),
                member: parent_id.to_string(),
                role_field: role_field.clone(),
                roles: roles.clone(),
            },
        }
    }

    /// Field references collapse into one `In` filter; membership matches
    /// need one filter per parent.
    pub fn bind_many(&self, parent_ids: &[String]) -> Vec<Filter> {
        match (self, parent_ids) {
            (_, []) => Vec::new(),
            (_, [single]) => vec![self.bind(single)],
            (FilterTemplate::FieldRef { field }, ids) => vec![Filter::In {
                field: field.clone(),
                values: ids.to_vec(),
            }],
            (FilterTemplate::Membership { .. }, ids) => ids.iter().map(|id| self.bind(id)).collect(),
        }
    }

    /// Pull specification removing `parent_id` from the membership array.
    pub fn pull(&self, parent_id: &str) -> Option<PullSpec> {
        match self {
            FilterTemplate::FieldRef { .. } => None,
            FilterTemplate::Membership {
                array,
                member_field,
                ..
            } => Some(PullSpec {
                array: array.clone(),
                member_field: member_field.clone(),
                member: parent_id.to_string(),
            }),
        }
    }

    pub fn is_membership(&self) -> bool {
        matches!(self, FilterTemplate::Membership { .. })
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub entity_type: EntityType,
    pub collection: String,
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnershipEdge {
    pub parent: EntityType,
    pub child: EntityType,
    pub kind: EdgeKind,
    pub template: FilterTemplate,
}

impl fmt::Display for OwnershipEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -{}-> {}", self.parent, self.kind, self.child)
    }
}


#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Entity type declared twice: {0}")]
    DuplicateEntity(String),

    #[error("Edge {edge} names undeclared entity type {entity}")]
    UnknownEntity { edge: String, entity: String },

    #[error("MEMBER edge {0} needs a membership template")]
    MemberWithoutMembership(String),

    #[error("Ownership cycle: {0}")]
    OwnershipCycle(String),
}


/// Immutable ownership/membership graph. Built once, then shared read-only.
#[derive(Debug, Clone, Serialize)]
pub struct OwnershipGraph {
    entities: BTreeMap<EntityType, EntityDescriptor>,
    edges: Vec<OwnershipEdge>,
}

impl OwnershipGraph {
    pub fn builder() -> OwnershipGraphBuilder {
        OwnershipGraphBuilder::default()
    }

    pub fn entity(&self, entity_type: &EntityType) -> Option<&EntityDescriptor> {
        self.entities.get(entity_type)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityDescriptor> {
        self.entities.values()
    }

    pub fn edges(&self) -> &[OwnershipEdge] {
        &self.edges
    }

    pub fn edges_from<'a>(&'a self, parent: &'a EntityType) -> impl Iterator<Item = &'a OwnershipEdge> + 'a {
        self.edges.iter().filter(move |edge| &edge.parent == parent)
    }

    pub fn owned_edges<'a>(&'a self, parent: &'a EntityType) -> impl Iterator<Item = &'a OwnershipEdge> + 'a {
        self.edges_from(parent)
            .filter(|edge| edge.kind == EdgeKind::Owns)
    }

    pub fn member_edges<'a>(&'a self, parent: &'a EntityType) -> impl Iterator<Item = &'a OwnershipEdge> + 'a {
        self.edges_from(parent)
            .filter(|edge| edge.kind == EdgeKind::Member)
    }

    /// Whether deleting entities of this type cascades anywhere.
    pub fn has_dependents(&self, entity_type: &EntityType) -> bool {
        self.edges_from(entity_type).next().is_some()
    }

    /// Aggregates are owned children that carry role-qualified membership or
    /// cascade further; everything else owned directly is a leaf collection.
    pub fn is_aggregate_edge(&self, edge: &OwnershipEdge) -> bool {
        edge.kind == EdgeKind::Owns
            && (edge.template.is_membership() || self.has_dependents(&edge.child))
    }

    fn validate(&self) -> Result<(), GraphError> {
        for edge in &self.edges {
            for entity in [&edge.parent, &edge.child] {
                if !self.entities.contains_key(entity) {
                    return Err(GraphError::UnknownEntity {
                        edge: edge.to_string(),
                        entity: entity.to_string(),
                    });
                }
            }

            if edge.kind == EdgeKind::Member && !edge.template.is_membership() {
                return Err(GraphError::MemberWithoutMembership(edge.to_string()));
            }
        }

        let mut done = HashSet::new();
        for start in self.entities.keys() {
            let mut path = Vec::new();
            self.check_cycles(start, &mut path, &mut done)?;
        }
        Ok(())
    }

    fn check_cycles<'a>(
        &'a self,
        node: &'a EntityType,
        path: &mut Vec<&'a EntityType>,
        done: &mut HashSet<&'a EntityType>,
    ) -> Result<(), GraphError> {
        if done.contains(node) {
            return Ok(());
        }
        if let Some(pos) = path.iter().position(|seen| *seen == node) {
            let cycle: Vec<String> = path[pos..]
                .iter()
                .chain(std::iter::once(&node))
                .map(|t| t.to_string())
                .collect();
            return Err(GraphError::OwnershipCycle(cycle.join(" -> ")));
        }

        path.push(node);
        for edge in self.owned_edges(node) {
            self.check_cycles(&edge.child, path, done)?;
        }
        path.pop();
        done.insert(node);
        Ok(())
    }
}


#[derive(Debug, Default)]
pub struct OwnershipGraphBuilder {
    entities: Vec<EntityDescriptor>,
    edges: Vec<OwnershipEdge>,
}

impl OwnershipGraphBuilder {
    pub fn entity(mut self, entity_type: &str, collection: &str) -> Self {
        self.entities.push(EntityDescriptor {
            entity_type: EntityType::new(entity_type),
            collection: collection.to_string(),
        });
        self
    }

    pub fn owns(mut self, parent: &str, child: &str, template: FilterTemplate) -> Self {
        self.edges.push(OwnershipEdge {
            parent: parent.into(),
            child: child.into(),
            kind: EdgeKind::Owns,
            template,
        });
        self
    }

    pub fn member(mut self, parent: &str, child: &str, template: FilterTemplate) -> Self {
        self.edges.push(OwnershipEdge {
            parent: parent.into(),
            child: child.into(),
            kind: EdgeKind::Member,
            template,
        });
        self
    }

    pub fn build(self) -> Result<OwnershipGraph, GraphError> {
        let mut entities = BTreeMap::new();
        for descriptor in self.entities {
            let key = descriptor.entity_type.clone();
            if entities.insert(key.clone(), descriptor).is_some() {
                return Err(GraphError::DuplicateEntity(key.to_string()));
            }
        }

        let graph = OwnershipGraph {
            entities,
            edges: self.edges,
        };
        graph.validate()?;
        Ok(graph)
    }
}
