//! Esplora API client
//!
//! Provides the chain data a submission needs (address UTXOs and raw
//! transactions) and relays signed transactions. Reads are retried on
//! connection failures, rate limiting and server errors; broadcasts are sent
//! exactly once.

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{header, Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;

use super::{http_client, join_url, ChainProvider};
use crate::error::{GlittrError, Result, Stage};
use crate::utxo::BitcoinUtxo;

/// Esplora client configuration
#[derive(Clone, Debug)]
pub struct EsploraConfig {
    /// API URL (e.g., https://devnet-electrum.glittr.fi)
    pub url: String,
    /// Request timeout in seconds
    pub timeout: u64,
    /// Maximum number of retries for reads
    pub max_retries: u32,
    /// Retry delay in milliseconds
    pub retry_delay: u64,
    /// Maximum concurrent requests
    pub max_concurrent_requests: usize,
}

impl Default for EsploraConfig {
    fn default() -> Self {
        Self {
            url: "https://devnet-electrum.glittr.fi".to_string(),
            timeout: 30,
            max_retries: 3,
            retry_delay: 1000,
            max_concurrent_requests: 10,
        }
    }
}

/// A failed request attempt
struct RequestFailure {
    message: String,
    retryable: bool,
}

/// Esplora API client
pub struct EsploraClient {
    /// HTTP client
    client: Client,
    /// Client configuration
    config: EsploraConfig,
    /// Bounds concurrent requests
    rate_limiter: Arc<Semaphore>,
}

impl EsploraClient {
    /// Create a new Esplora client
    pub fn new(config: EsploraConfig) -> Result<Self> {
        let client = http_client(config.timeout)?;
        let rate_limiter = Arc::new(Semaphore::new(config.max_concurrent_requests.max(1)));

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// GET a text body with retry logic
    async fn get_text(&self, path: &str) -> Result<String> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| GlittrError::upstream(Stage::Resolve, e.to_string()))?;

        let mut retries = 0;
        loop {
            match self.execute_get(path).await {
                Ok(body) => return Ok(body),
                Err(failure) if failure.retryable && retries < self.config.max_retries => {
                    retries += 1;
                    debug!(
                        "Retrying Esplora request to {} (attempt {}/{}): {}",
                        path, retries, self.config.max_retries, failure.message
                    );
                    sleep(Duration::from_millis(self.config.retry_delay)).await;
                }
                Err(failure) => {
                    warn!("Esplora request to {} failed: {}", path, failure.message);
                    return Err(GlittrError::upstream(Stage::Resolve, failure.message));
                }
            }
        }
    }

    /// Execute a single GET request without retry logic
    async fn execute_get(&self, path: &str) -> std::result::Result<String, RequestFailure> {
        let url = join_url(&self.config.url, path);
        debug!("Making Esplora API request to {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| RequestFailure {
            retryable: e.is_connect() || e.is_timeout(),
            message: format!("Failed to send request to {}: {}", url, e),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RequestFailure {
                retryable: is_retryable_status(status),
                message: format!("Esplora API request failed with status: {}", status),
            });
        }

        response.text().await.map_err(|e| RequestFailure {
            retryable: false,
            message: format!("Failed to read Esplora API response: {}", e),
        })
    }
}

#[async_trait]
impl ChainProvider for EsploraClient {
    async fn get_address_utxos(&self, address: &str) -> Result<Vec<BitcoinUtxo>> {
        debug!("Getting UTXOs for address: {}", address);

        let body = self.get_text(&format!("/address/{}/utxo", address)).await?;
        let utxos: Option<Vec<BitcoinUtxo>> = serde_json::from_str(&body).map_err(|e| {
            GlittrError::upstream(Stage::Resolve, format!("Invalid UTXO response: {}", e))
        })?;
        let utxos = utxos.unwrap_or_default();

        debug!("Got {} UTXOs for address: {}", utxos.len(), address);
        Ok(utxos)
    }

    async fn get_transaction_hex(&self, txid: &str) -> Result<String> {
        debug!("Getting transaction hex for txid: {}", txid);
        let hex = self.get_text(&format!("/tx/{}/hex", txid)).await?;
        Ok(hex.trim().to_string())
    }

    async fn broadcast_transaction(&self, tx_hex: &str) -> Result<String> {
        debug!("Broadcasting transaction");
        let url = join_url(&self.config.url, "/tx");

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "text/plain")
            .body(tx_hex.to_string())
            .send()
            .await
            .map_err(|e| GlittrError::upstream(Stage::Broadcast, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GlittrError::upstream(Stage::Broadcast, e.to_string()))?;

        if !status.is_success() {
            return Err(GlittrError::BroadcastRejected(format!(
                "{} {}",
                status,
                body.trim()
            )));
        }

        let txid = body.trim().to_string();
        if txid.is_empty() {
            return Err(GlittrError::upstream(Stage::Broadcast, "empty txid in broadcast response"));
        }

        debug!("Transaction broadcast with ID: {}", txid);
        Ok(txid)
    }
}

/// Connection limits and server side failures are worth another attempt
fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}
