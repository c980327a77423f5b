

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;


/// "Deletion in progress" markers, one per root. Requests for the same root
/// are turned away while a lease is held instead of queueing behind it.
#[derive(Debug, Clone, Default)]
pub struct DeletionLocks {
    held: Arc<Mutex<HashSet<String>>>,
}

impl DeletionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, root_type: &str, root_id: &str) -> Option<DeletionLease> {
        let key = format!("{root_type}:{root_id}");
        if !self.held.lock().insert(key.clone()) {
            debug!("Deletion of {} already in progress", key);
            return None;
        }
        Some(DeletionLease {
            held: Arc::clone(&self.held),
            key,
        })
    }

    pub fn is_held(&self, root_type: &str, root_id: &str) -> bool {
        self.held.lock().contains(&format!("{root_type}:{root_id}"))
    }
}


/// Released on drop, including when the request future is cancelled.
#[derive(Debug)]
pub struct DeletionLease {
    held: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for DeletionLease {
    fn drop(&mut self) {
        self.held.lock().remove(&self.key);
    }
}
