

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use tracing::debug;

use super::store::{Document, DocumentStore, Filter, PullSpec, StoreError, ID_FIELD};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Transient,
    Permanent,
}

#[derive(Debug)]
struct Fault {
    collection: String,
    kind: FaultKind,
    remaining: u32,
}


/// Document store held in process memory. Faults are scripted per collection
/// and only ever hit mutating calls, so planning reads stay reliable.
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    faults: Mutex<Vec<Fault>>,
    abort_after: Mutex<Option<u64>>,
    mutations: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            faults: Mutex::new(Vec::new()),
            abort_after: Mutex::new(None),
            mutations: AtomicU64::new(0),
        }
    }

    
    pub fn insert(&self, collection: &str, doc: Document) {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(doc);
    }

    pub fn insert_many(&self, collection: &str, docs: impl IntoIterator<Item = Document>) {
        let mut collections = self.collections.write();
        collections
            .entry(collection.to_string())
            .or_default()
            .extend(docs);
    }

    
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<Document> {
        let filter = Filter::by_id(id);
        self.collections
            .read()
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| filter.matches(doc)).cloned())
    }

    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, Vec::len)
    }

    /// Number of mutating calls that reached the data, faults excluded.
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }

    /// Makes the next `times` mutating calls against `collection` fail.
    pub fn fail_next(&self, collection: &str, times: u32, kind: FaultKind) {
        self.faults.lock().push(Fault {
            collection: collection.to_string(),
            kind,
            remaining: times,
        });
    }

    /// Lets `mutations` more mutating calls through, then fails every one
    /// transiently until faults are cleared.
    pub fn abort_after(&self, mutations: u64) {
        *self.abort_after.lock() = Some(self.mutation_count() + mutations);
    }

    pub fn clear_faults(&self) {
        self.faults.lock().clear();
        *self.abort_after.lock() = None;
    }

    fn check_fault(&self, collection: &str) -> Result<(), StoreError> {
        if let Some(limit) = *self.abort_after.lock() {
            if self.mutation_count() >= limit {
                return Err(StoreError::Transient(format!(
                    "store went away before writing {}",
                    collection
                )));
            }
        }

        let mut faults = self.faults.lock();
        let Some(fault) = faults
            .iter_mut()
            .find(|f| f.collection == collection && f.remaining > 0)
        else {
            return Ok(());
        };

        fault.remaining -= 1;
        let kind = fault.kind;
        faults.retain(|f| f.remaining > 0);

        debug!("Injected {:?} fault on collection {}", kind, collection);
        match kind {
            FaultKind::Transient => Err(StoreError::Transient(format!(
                "connection reset while writing {}",
                collection
            ))),
            FaultKind::Permanent => Err(StoreError::Permanent(format!(
                "write rejected by {}",
                collection
            ))),
        }
    }

    fn record_mutation(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn project(doc: &Document, projection: &[&str]) -> Document {
    if projection.is_empty() {
        return doc.clone();
    }

    let mut projected = Map::new();
    for field in std::iter::once(&ID_FIELD).chain(projection.iter()) {
        if let Some(value) = doc.get(*field) {
            projected.insert((*field).to_string(), value.clone());
        }
    }
    Value::Object(projected)
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        projection: &[&str],
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| filter.matches(doc))
                    .map(|doc| project(doc, projection))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn exists(&self, collection: &str, filter: &Filter) -> Result<bool, StoreError> {
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .is_some_and(|docs| docs.iter().any(|doc| filter.matches(doc))))
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.check_fault(collection)?;
        self.record_mutation();

        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|doc| !filter.matches(doc));
        Ok((before - docs.len()) as u64)
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.check_fault(collection)?;
        self.record_mutation();

        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        match docs.iter().position(|doc| filter.matches(doc)) {
            Some(idx) => {
                docs.remove(idx);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        pull: &PullSpec,
    ) -> Result<u64, StoreError> {
        self.check_fault(collection)?;
        self.record_mutation();

        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let mut modified = 0;
        for doc in docs.iter_mut().filter(|doc| filter.matches(doc)) {
            if pull.apply(doc) {
                modified += 1;
            }
        }
        Ok(modified)
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
