//! Glittr API client
//!
//! Two endpoints are used: `POST /validate-tx` to have the Glittr node check a
//! signed transaction before it is relayed, and `GET /tx/{txid}` to learn
//! whether the indexer has recorded it.

use async_trait::async_trait;
use log::debug;
use reqwest::{header, Client, StatusCode};
use serde_json::Value;

use super::{http_client, join_url, IndexerLookup, IndexerProvider, ValidationResponse};
use crate::error::{GlittrError, Result, Stage};

/// Glittr API configuration
#[derive(Clone, Debug)]
pub struct GlittrApiConfig {
    /// API URL (e.g., https://devnet-core-api.glittr.fi)
    pub url: String,
    /// Request timeout in seconds
    pub timeout: u64,
}

impl Default for GlittrApiConfig {
    fn default() -> Self {
        Self {
            url: "https://devnet-core-api.glittr.fi".to_string(),
            timeout: 30,
        }
    }
}

pub struct GlittrApiClient {
    client: Client,
    config: GlittrApiConfig,
}

impl GlittrApiClient {
    pub fn new(config: GlittrApiConfig) -> Result<Self> {
        let client = http_client(config.timeout)?;
        Ok(Self { client, config })
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }
}

#[async_trait]
impl IndexerProvider for GlittrApiClient {
    async fn validate_transaction(&self, tx_hex: &str) -> Result<ValidationResponse> {
        let url = join_url(&self.config.url, "/validate-tx");
        debug!("Validating transaction with {}", url);

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "text/plain")
            .body(tx_hex.to_string())
            .send()
            .await
            .map_err(|e| GlittrError::upstream(Stage::Validate, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GlittrError::upstream(Stage::Validate, e.to_string()))?;

        if !status.is_success() {
            return Err(GlittrError::ValidationRejected(format!(
                "validator returned {}: {}",
                status,
                body.trim()
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            GlittrError::upstream(Stage::Validate, format!("Invalid validator response: {}", e))
        })
    }

    async fn get_indexed_transaction(&self, txid: &str) -> Result<IndexerLookup> {
        let url = join_url(&self.config.url, &format!("/tx/{}", txid));
        debug!("Looking up {} in the Glittr index", txid);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GlittrError::upstream(Stage::Index, e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(IndexerLookup::Pending);
        }
        if !status.is_success() {
            return Err(GlittrError::upstream(
                Stage::Index,
                format!("indexer returned status {}", status),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| GlittrError::upstream(Stage::Index, e.to_string()))?;
        let record: Value = serde_json::from_str(&body).map_err(|e| {
            GlittrError::upstream(Stage::Index, format!("indexer returned non-JSON body: {}", e))
        })?;

        Ok(IndexerLookup::Found(record))
    }
}
