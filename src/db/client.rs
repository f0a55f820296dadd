use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use helix_rs::{HelixDB, HelixDBClient, HelixError};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::config::OntomatchConfig;

const DEFAULT_MAX_RETRIES: u32 = 3;

const INITIAL_RETRY_DELAY_MS: u64 = 100;

const MAX_RETRY_DELAY_MS: u64 = 10000;


#[derive(Debug, Error)]
pub enum HelixClientError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Query failed: {0}")]
    Query(String),
    #[error("Helix error: {0}")]
    Helix(#[from] HelixError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Retry exhausted after {0} attempts: {1}")]
    RetryExhausted(u32, String),
}

impl HelixClientError {
    /// Lookups of absent records surface as query errors and are not worth retrying.
    pub fn is_not_found(&self) -> bool {
        let message = self.to_string().to_lowercase();
        message.contains("not found") || message.contains("no value")
    }
}


/// Named-query client for HelixDB with bounded exponential backoff.
pub struct HelixClient {
    inner: HelixDB,
    is_connected: AtomicBool,
    base_url: String,
    max_retries: u32,
}

impl HelixClient {
    pub fn new(host: &str, port: u16) -> Self {
        let endpoint = format!("http://{}", host);
        let base_url = format!("http://{}:{}", host, port);

        let inner = <HelixDB as HelixDBClient>::new(Some(&endpoint), Some(port), None);

        info!("HelixClient created for {}", base_url);

        Self {
            inner,
            is_connected: AtomicBool::new(false),
            base_url,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn from_config(config: &OntomatchConfig) -> Self {
        let mut client = Self::new(&config.host, config.port);
        client.max_retries = config.max_retries.max(1);
        client
    }

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
                    self.is_connected.store(true, Ordering::Relaxed);
                    return Ok(result);
                }
                Err(e) => {
                    let err = HelixClientError::Query(e.to_string());
                    if err.is_not_found() {
                        debug!("Query {} returned not found", query_name);
                        return Err(err);
                    }

                    debug!(
                        "Query {} failed (attempt {}/{}): {}",
                        query_name, attempt, self.max_retries, e
                    );
                    last_error = Some(e.to_string());

                    if attempt < self.max_retries {
                        tokio::time::sleep(delay).await;
                        delay = (delay * 2).min(Duration::from_millis(MAX_RETRY_DELAY_MS));
                    }
                }
            }
        }

        self.is_connected.store(false, Ordering::Relaxed);
        let last_error = last_error.unwrap_or_else(|| "Unknown error".to_string());
        warn!("Query {} gave up after {} attempts: {}", query_name, self.max_retries, last_error);
        Err(HelixClientError::RetryExhausted(self.max_retries, last_error))
    }

    /// Like [`execute_query`](Self::execute_query) but maps not-found to `None`.
    pub async fn execute_optional<T, P>(&self, query_name: &str, params: &P) -> Result<Option<T>, HelixClientError>
    where
        T: DeserializeOwned,
        P: Serialize + Sync,
    {
        match self.execute_query(query_name, params).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::Relaxed)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
