

pub mod client;
pub mod helix_store;
pub mod memory;
pub mod store;

pub use client::{HelixClient, HelixClientError};
pub use helix_store::HelixStore;
pub use memory::{FaultKind, InMemoryStore};
pub use store::{Document, DocumentStore, Filter, PullSpec, StoreError, ID_FIELD, document_ids};
