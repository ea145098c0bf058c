//! In-memory provider implementations for testing
//!
//! Responses are scripted up front and every call is recorded, so tests can
//! assert both what a submission did and what it never attempted.

use async_trait::async_trait;
use bitcoin::consensus::{deserialize, serialize};
use bitcoin::Transaction;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{ChainProvider, IndexerLookup, IndexerProvider, ValidationResponse};
use crate::error::{GlittrError, Result, Stage};
use crate::utxo::BitcoinUtxo;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory chain: address UTXOs, known transactions and a broadcast log
#[derive(Clone, Default)]
pub struct InMemoryChain {
    utxos: Arc<Mutex<HashMap<String, Vec<BitcoinUtxo>>>>,
    transactions: Arc<Mutex<HashMap<String, String>>>,
    broadcasts: Arc<Mutex<Vec<String>>>,
    broadcast_rejection: Arc<Mutex<Option<String>>>,
}

impl InMemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_utxos(&self, address: &str, utxos: Vec<BitcoinUtxo>) {
        lock(&self.utxos).insert(address.to_string(), utxos);
    }

    /// Make a transaction available through `get_transaction_hex`
    pub fn add_transaction(&self, tx: &Transaction) {
        lock(&self.transactions).insert(tx.compute_txid().to_string(), hex::encode(serialize(tx)));
    }

    /// Reject every following broadcast with this message
    pub fn reject_broadcasts(&self, message: &str) {
        *lock(&self.broadcast_rejection) = Some(message.to_string());
    }

    /// Hex of every transaction that reached `broadcast_transaction`
    pub fn broadcasts(&self) -> Vec<String> {
        lock(&self.broadcasts).clone()
    }

    pub fn broadcast_count(&self) -> usize {
        lock(&self.broadcasts).len()
    }
}

#[async_trait]
impl ChainProvider for InMemoryChain {
    async fn get_address_utxos(&self, address: &str) -> Result<Vec<BitcoinUtxo>> {
        Ok(lock(&self.utxos).get(address).cloned().unwrap_or_default())
    }

    async fn get_transaction_hex(&self, txid: &str) -> Result<String> {
        Ok(lock(&self.transactions).get(txid).cloned().unwrap_or_default())
    }

    async fn broadcast_transaction(&self, tx_hex: &str) -> Result<String> {
        lock(&self.broadcasts).push(tx_hex.to_string());

        if let Some(message) = lock(&self.broadcast_rejection).clone() {
            return Err(GlittrError::BroadcastRejected(message));
        }

        let bytes = hex::decode(tx_hex)
            .map_err(|e| GlittrError::BroadcastRejected(format!("TX decode failed: {}", e)))?;
        let tx: Transaction = deserialize(&bytes)
            .map_err(|e| GlittrError::BroadcastRejected(format!("TX decode failed: {}", e)))?;

        let txid = tx.compute_txid().to_string();
        lock(&self.transactions).insert(txid.clone(), tx_hex.to_string());
        Ok(txid)
    }
}

#[derive(Clone)]
enum ScriptedLookup {
    Lookup(IndexerLookup),
    Failure(String),
}

/// In-memory validator and indexer with scripted answers
///
/// Once the scripted lookups are used up every lookup answers `Pending`.
#[derive(Clone)]
pub struct InMemoryIndexer {
    validation: Arc<Mutex<std::result::Result<ValidationResponse, String>>>,
    lookups: Arc<Mutex<VecDeque<ScriptedLookup>>>,
    validations: Arc<Mutex<Vec<String>>>,
    lookup_calls: Arc<Mutex<Vec<String>>>,
}

impl Default for InMemoryIndexer {
    fn default() -> Self {
        Self {
            validation: Arc::new(Mutex::new(Ok(ValidationResponse {
                is_valid: true,
                msg: None,
            }))),
            lookups: Arc::default(),
            validations: Arc::default(),
            lookup_calls: Arc::default(),
        }
    }
}

impl InMemoryIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer validations with `{ is_valid, msg }`
    pub fn set_validation(&self, is_valid: bool, msg: Option<&str>) {
        *lock(&self.validation) = Ok(ValidationResponse {
            is_valid,
            msg: msg.map(str::to_string),
        });
    }

    /// Answer validations as if the validator returned a non-success status
    pub fn reject_validation_status(&self, message: &str) {
        *lock(&self.validation) = Err(message.to_string());
    }

    pub fn push_pending(&self, count: usize) {
        let mut lookups = lock(&self.lookups);
        for _ in 0..count {
            lookups.push_back(ScriptedLookup::Lookup(IndexerLookup::Pending));
        }
    }

    pub fn push_found(&self, record: serde_json::Value) {
        lock(&self.lookups).push_back(ScriptedLookup::Lookup(IndexerLookup::Found(record)));
    }

    /// Queue a transient fetch failure
    pub fn push_failure(&self, message: &str) {
        lock(&self.lookups).push_back(ScriptedLookup::Failure(message.to_string()));
    }

    pub fn validation_count(&self) -> usize {
        lock(&self.validations).len()
    }

    pub fn lookup_count(&self) -> usize {
        lock(&self.lookup_calls).len()
    }
}

#[async_trait]
impl IndexerProvider for InMemoryIndexer {
    async fn validate_transaction(&self, tx_hex: &str) -> Result<ValidationResponse> {
        lock(&self.validations).push(tx_hex.to_string());
        lock(&self.validation)
            .clone()
            .map_err(GlittrError::ValidationRejected)
    }

    async fn get_indexed_transaction(&self, txid: &str) -> Result<IndexerLookup> {
        lock(&self.lookup_calls).push(txid.to_string());
        match lock(&self.lookups).pop_front() {
            Some(ScriptedLookup::Lookup(lookup)) => Ok(lookup),
            Some(ScriptedLookup::Failure(message)) => Err(GlittrError::upstream(Stage::Index, message)),
            None => Ok(IndexerLookup::Pending),
        }
    }
}
