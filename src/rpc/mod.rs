//! Clients for the services a submission talks to
//!
//! This module handles:
//! - Chain data and broadcast through an Esplora compatible API
//! - Remote validation and index lookups through the Glittr API
//! - In-memory providers for tests
//!
//! The pipeline only depends on the [`ChainProvider`] and [`IndexerProvider`]
//! traits, so any backend can be plugged in.

pub mod esplora;
pub mod glittr;
pub mod in_memory;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::{GlittrError, Result};
use crate::utxo::BitcoinUtxo;

pub use esplora::{EsploraClient, EsploraConfig};
pub use glittr::{GlittrApiClient, GlittrApiConfig};

/// Chain data and transaction relay
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Unspent outputs of an address
    async fn get_address_utxos(&self, address: &str) -> Result<Vec<BitcoinUtxo>>;

    /// Raw hex of a transaction
    async fn get_transaction_hex(&self, txid: &str) -> Result<String>;

    /// Relay a signed transaction, returning its txid
    ///
    /// A non-success response must surface as [`GlittrError::BroadcastRejected`].
    async fn broadcast_transaction(&self, tx_hex: &str) -> Result<String>;
}

/// Glittr validator and indexer
#[async_trait]
pub trait IndexerProvider: Send + Sync {
    /// Ask the validator whether a signed transaction is a valid Glittr transaction
    ///
    /// A non-success response must surface as [`GlittrError::ValidationRejected`].
    async fn validate_transaction(&self, tx_hex: &str) -> Result<ValidationResponse>;

    /// Look a transaction up in the index
    async fn get_indexed_transaction(&self, txid: &str) -> Result<IndexerLookup>;
}

/// Validator verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

/// Outcome of an indexer lookup
#[derive(Debug, Clone, PartialEq)]
pub enum IndexerLookup {
    /// Not indexed yet
    Pending,
    /// Indexer record for the transaction
    Found(Value),
}

/// Build the shared HTTP client
pub(crate) fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| GlittrError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Join a base URL and a path without doubling slashes
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://localhost:3000/", "/tx"), "http://localhost:3000/tx");
        assert_eq!(join_url("http://localhost:3000", "/tx"), "http://localhost:3000/tx");
    }

    #[test]
    fn test_validation_response_without_message() {
        let response: ValidationResponse = serde_json::from_str(r#"{"is_valid":true}"#).unwrap();
        assert!(response.is_valid);
        assert!(response.msg.is_none());
    }
}
