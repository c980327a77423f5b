

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::client::{HelixClient, HelixClientError};
use super::store::{Document, DocumentStore, Filter, PullSpec, StoreError};

#[derive(Serialize)]
struct FilterInput<'a> {
    collection: &'a str,
    filter: &'a Filter,
}

#[derive(Serialize)]
struct FindInput<'a> {
    collection: &'a str,
    filter: &'a Filter,
    projection: &'a [&'a str],
}

#[derive(Serialize)]
struct PullInput<'a> {
    collection: &'a str,
    filter: &'a Filter,
    pull: &'a PullSpec,
}

#[derive(Deserialize)]
struct ExistsOutput {
    exists: bool,
}

#[derive(Deserialize)]
struct AffectedOutput {
    #[serde(default)]
    affected: u64,
}


impl From<HelixClientError> for StoreError {
    fn from(err: HelixClientError) -> Self {
        match err {
            HelixClientError::Connection(_)
            | HelixClientError::NotConnected
            | HelixClientError::RetryExhausted(..) => StoreError::Transient(err.to_string()),
            HelixClientError::Query(_) | HelixClientError::Serialization(_) => {
                StoreError::Permanent(err.to_string())
            }
        }
    }
}


/// `DocumentStore` backed by HelixDB named queries. Writes go out once; the
/// cascade executor decides whether to retry them.
pub struct HelixStore {
    client: Arc<HelixClient>,
}

impl HelixStore {
    pub fn new(client: Arc<HelixClient>) -> Self {
        Self { client }
    }

    async fn mutate<P: Serialize + Sync>(&self, query: &str, input: &P) -> Result<u64, StoreError> {
        let output: AffectedOutput = self.client.execute_query_no_retry(query, input).await?;
        debug!("{} affected {} records", query, output.affected);
        Ok(output.affected)
    }
}

#[async_trait]
impl DocumentStore for HelixStore {
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        projection: &[&str],
    ) -> Result<Vec<Document>, StoreError> {
        let input = FindInput {
            collection,
            filter,
            projection,
        };
        Ok(self.client.execute_query("cascadeFind", &input).await?)
    }

    async fn exists(&self, collection: &str, filter: &Filter) -> Result<bool, StoreError> {
        let output: ExistsOutput = self
            .client
            .execute_query("cascadeExists", &FilterInput { collection, filter })
            .await?;
        Ok(output.exists)
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.mutate("cascadeDeleteMany", &FilterInput { collection, filter })
            .await
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.mutate("cascadeDeleteOne", &FilterInput { collection, filter })
            .await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        pull: &PullSpec,
    ) -> Result<u64, StoreError> {
        self.mutate(
            "cascadePull",
            &PullInput {
                collection,
                filter,
                pull,
            },
        )
        .await
    }

    fn backend_name(&self) -> &str {
        "helix"
    }
}
