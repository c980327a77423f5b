

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use helix_rs::{HelixDB, HelixDBClient};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::config::TeamspaceConfig;


const INITIAL_RETRY_DELAY_MS: u64 = 100;

const MAX_RETRY_DELAY_MS: u64 = 10000;


#[derive(Debug, Error)]
pub enum HelixClientError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Query failed: {0}")]
    Query(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Client not connected")]
    NotConnected,
    #[error("Retry exhausted after {0} attempts: {1}")]
    RetryExhausted(u32, String),
}


pub struct HelixClient {
    
    inner: HelixDB,
    
    is_connected: AtomicBool,
    
    base_url: String,
    
    max_retries: u32,
}

impl HelixClient {
    
    pub fn new(host: &str, port: u16) -> Result<Self, HelixClientError> {
        if host.trim().is_empty() {
            return Err(HelixClientError::Connection("empty HelixDB host".to_string()));
        }

        let endpoint = format!("http://{}", host);
        let base_url = format!("http://{}:{}", host, port);

        let inner = <HelixDB as HelixDBClient>::new(
            Some(&endpoint),
            Some(port),
            None,
        );

        info!("HelixClient created for {}", base_url);

        Ok(Self {
            inner,
            is_connected: AtomicBool::new(false),
            base_url,
            max_retries: 3,
        })
    }

    
    pub fn from_config(config: &TeamspaceConfig) -> Result<Self, HelixClientError> {
        let mut client = Self::new(&config.host, config.port)?;
        client.max_retries = config.max_retries.max(1);
        Ok(client)
    }

    
    pub async fn connect(&self) -> Result<(), HelixClientError> {
        if self.is_connected.load(Ordering::Relaxed) {
            return Ok(());
        }

        self.health_check().await?;
        self.is_connected.store(true, Ordering::Relaxed);
        info!("HelixClient ready for {}", self.base_url);
        Ok(())
    }

    /// Runs a named query, retrying connection-level failures with backoff.
    /// Use only for reads: the cascade executor owns retries for writes.
    pub async fn execute_query<T, P>(&self, query_name: &str, params: &P) -> Result<T, HelixClientError>
    where
        T: DeserializeOwned,
        P: Serialize + Sync,
    {
        let mut last_error = None;
        let mut delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS);

        for attempt in 1..=self.max_retries {
            debug!("Executing query: {} (attempt {})", query_name, attempt);

            match self.inner.query::<P, T>(query_name, params).await {
                Ok(result) => {
                    if !self.is_connected.load(Ordering::Relaxed) {
                        self.is_connected.store(true, Ordering::Relaxed);
                    }
                    debug!("Query {} succeeded", query_name);
                    return Ok(result);
                }
                Err(e) => {
                    let err_str = e.to_string();

                    if err_str.contains("not found") || err_str.contains("No value") {
                        debug!("Query {} returned not found", query_name);
                        return Err(HelixClientError::Query(err_str));
                    }

                    debug!("Query {} failed (attempt {}): {}", query_name, attempt, e);
                    last_error = Some(err_str);

                    if attempt < self.max_retries {
                        tokio::time::sleep(delay).await;
                        delay = (delay * 2).min(Duration::from_millis(MAX_RETRY_DELAY_MS));
                    }
                }
            }
        }

        Err(HelixClientError::RetryExhausted(
            self.max_retries,
            last_error.unwrap_or_else(|| "Unknown error".to_string()),
        ))
    }

    
    pub async fn execute_query_no_retry<T, P>(&self, query_name: &str, params: &P) -> Result<T, HelixClientError>
    where
        T: DeserializeOwned,
        P: Serialize + Sync,
    {
        self.inner
            .query::<P, T>(query_name, params)
            .await
            .map_err(|e| {
                let err_str = e.to_string();
                if is_connection_failure(&err_str) {
                    HelixClientError::Connection(err_str)
                } else {
                    HelixClientError::Query(err_str)
                }
            })
    }

    
    pub async fn health_check(&self) -> Result<(), HelixClientError> {
        match self.execute_query_no_retry::<serde_json::Value, _>("health", &serde_json::json!({})).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let err_str = e.to_string().to_lowercase();

                if err_str.contains("404")
                    || err_str.contains("not found")
                    || err_str.contains("couldn't find")
                {
                    info!("Health check passed (server alive, no health query)");
                    Ok(())
                } else {
                    Err(HelixClientError::Connection(e.to_string()))
                }
            }
        }
    }

    
    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::Relaxed)
    }

    
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}


fn is_connection_failure(message: &str) -> bool {
    let message = message.to_lowercase();
    ["connect", "timed out", "timeout", "broken pipe", "reset by peer"]
        .iter()
        .any(|marker| message.contains(marker))
}
