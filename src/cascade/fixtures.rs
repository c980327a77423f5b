

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::collab::*;
use super::graph::OwnershipGraph;
use crate::db::{Document, DocumentStore, Filter, InMemoryStore, PullSpec, StoreError};

pub mod ids {
    pub const U: &str = "65f1a0c2e4b0a1b2c3d4e501";
    pub const V: &str = "65f1a0c2e4b0a1b2c3d4e502";
    pub const GHOST: &str = "65f1a0c2e4b0a1b2c3d4e5ff";
    pub const W: &str = "65f1a0c2e4b0a1b2c3d4e510";
    pub const A: &str = "65f1a0c2e4b0a1b2c3d4e520";
    pub const B: &str = "65f1a0c2e4b0a1b2c3d4e521";
    pub const L1: &str = "65f1a0c2e4b0a1b2c3d4e530";
    pub const L2: &str = "65f1a0c2e4b0a1b2c3d4e531";
    pub const L3: &str = "65f1a0c2e4b0a1b2c3d4e532";
    pub const C1: &str = "65f1a0c2e4b0a1b2c3d4e540";
    pub const C2: &str = "65f1a0c2e4b0a1b2c3d4e541";
    pub const K1: &str = "65f1a0c2e4b0a1b2c3d4e550";
    pub const M1: &str = "65f1a0c2e4b0a1b2c3d4e560";
    pub const A_CHAT: &str = "65f1a0c2e4b0a1b2c3d4e570";
    pub const A_FILE: &str = "65f1a0c2e4b0a1b2c3d4e571";
    pub const A_CALL: &str = "65f1a0c2e4b0a1b2c3d4e572";
    pub const N1: &str = "65f1a0c2e4b0a1b2c3d4e580";
    pub const N2: &str = "65f1a0c2e4b0a1b2c3d4e581";
    pub const N3: &str = "65f1a0c2e4b0a1b2c3d4e582";
    pub const V_SESSION: &str = "65f1a0c2e4b0a1b2c3d4e590";
}

pub fn graph() -> Arc<OwnershipGraph> {
    Arc::new(collaboration_graph().unwrap())
}

fn member(id: &str, role: &str) -> Value {
    json!({ "member": id, "role": role })
}

/// U owns workspace W (V on the team), manages space A (V a member) and is a
/// plain member of V's space B.
pub fn seed(store: &InMemoryStore) {
    store.insert_many(
        USERS,
        vec![
            json!({ "_id": ids::U, "email": "u@example.com" }),
            json!({ "_id": ids::V, "email": "v@example.com" }),
        ],
    );
    store.insert(
        WORKSPACES,
        json!({
            "_id": ids::W,
            "name": "Acme",
            TEAM_MEMBERS: [member(ids::U, OWNER_ROLE), member(ids::V, "member")],
        }),
    );
    store.insert(WORKSPACE_SETTINGS, json!({ "_id": "ws-u", "user": ids::U, "theme": "dark" }));
    store.insert_many(
        SPACES,
        vec![
            json!({
                "_id": ids::A,
                "workSpaceRef": ids::W,
                SPACE_MEMBERS: [member(ids::U, MANAGER_ROLE), member(ids::V, "member")],
            }),
            json!({
                "_id": ids::B,
                "workSpaceRef": ids::W,
                SPACE_MEMBERS: [member(ids::V, MANAGER_ROLE), member(ids::U, "member")],
            }),
        ],
    );
    store.insert_many(
        LISTS,
        vec![
            json!({ "_id": ids::L1, "spaceRef": ids::A }),
            json!({ "_id": ids::L2, "spaceRef": ids::A }),
            json!({ "_id": ids::L3, "spaceRef": ids::B }),
        ],
    );
    store.insert_many(
        CARDS,
        vec![
            json!({ "_id": ids::C1, "listRef": ids::L1, "spaceRef": ids::A }),
            json!({ "_id": ids::C2, "listRef": ids::L3, "spaceRef": ids::B }),
        ],
    );
    store.insert(CHECKLISTS, json!({ "_id": ids::K1, "cardRef": ids::C1 }));
    store.insert(COMMENT_CHATS, json!({ "_id": ids::M1, "cardRef": ids::C1, "sender": ids::V }));
    store.insert(SPACE_CHATS, json!({ "_id": ids::A_CHAT, "to": ids::A }));
    store.insert(SPACE_FILES, json!({ "_id": ids::A_FILE, "spaceRef": ids::A }));
    store.insert(CALLS, json!({ "_id": ids::A_CALL, "space": ids::A }));
    store.insert_many(
        NOTIFICATIONS,
        vec![
            json!({ "_id": ids::N1, "user": ids::U }),
            json!({ "_id": ids::N2, "user": ids::U }),
            json!({ "_id": ids::N3, "user": ids::V }),
        ],
    );
    store.insert(SUBSCRIPTIONS, json!({ "_id": "sub-u", "user": ids::U, "plan": "pro" }));
    store.insert(USER_SESSIONS, json!({ "_id": ids::V_SESSION, "user": ids::V }));
}

pub fn seeded_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    seed(&store);
    store
}

pub fn snapshot(store: &InMemoryStore) -> BTreeMap<String, Vec<Document>> {
    graph()
        .entities()
        .map(|entity| (entity.collection.clone(), store.documents(&entity.collection)))
        .collect()
}


/// Wraps a store to simulate writers racing a cascade: every notification
/// purge is followed by a fresh notification for U while `readds` lasts, and
/// the user delete can be made to silently miss.
pub struct RacingStore {
    inner: Arc<InMemoryStore>,
    readds: AtomicU32,
    inserted: AtomicU32,
    swallow_user_delete: bool,
}

impl RacingStore {
    pub fn new(inner: Arc<InMemoryStore>, readds: u32, swallow_user_delete: bool) -> Self {
        Self {
            inner,
            readds: AtomicU32::new(readds),
            inserted: AtomicU32::new(0),
            swallow_user_delete,
        }
    }
}

#[async_trait]
impl DocumentStore for RacingStore {
    async fn find(&self, collection: &str, filter: &Filter, projection: &[&str]) -> Result<Vec<Document>, StoreError> {
        self.inner.find(collection, filter, projection).await
    }

    async fn exists(&self, collection: &str, filter: &Filter) -> Result<bool, StoreError> {
        self.inner.exists(collection, filter).await
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let removed = self.inner.delete_many(collection, filter).await?;
        if collection == NOTIFICATIONS
            && self
                .readds
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            let n = self.inserted.fetch_add(1, Ordering::SeqCst);
            self.inner
                .insert(NOTIFICATIONS, json!({ "_id": format!("late-{n}"), "user": ids::U }));
        }
        Ok(removed)
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        if self.swallow_user_delete && collection == USERS {
            return Ok(1);
        }
        self.inner.delete_one(collection, filter).await
    }

    async fn update_many(&self, collection: &str, filter: &Filter, pull: &PullSpec) -> Result<u64, StoreError> {
        self.inner.update_many(collection, filter, pull).await
    }

    fn backend_name(&self) -> &str {
        "racing-memory"
    }
}
