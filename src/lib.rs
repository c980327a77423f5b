

pub mod api;
pub mod cascade;
pub mod core;
pub mod db;
pub mod mcp;


pub use api::{Caller, CallerRole, DeletionResponse, DeletionService, OwnerSummary};
pub use cascade::{
    collaboration_graph, CascadeEngine, CascadeError, DeletionPlan, DeletionPlanner, EntityType,
    OwnershipGraph,
};
pub use core::config::TeamspaceConfig;
pub use core::error::{Result, TeamspaceError};
pub use db::{DocumentStore, HelixClient, HelixClientError, HelixStore, InMemoryStore};


pub const DEFAULT_HELIX_PORT: u16 = 6969;
