//! Error types for the glittr library
//!
//! Every failure surfaced by the submission flow maps onto one variant of
//! [`GlittrError`]. Only two situations are transient (indexer `404` and a
//! failed indexer fetch while polling); the pipeline retries those itself and
//! never lets them escape as errors unless a poll limit or cancellation is hit.

use std::fmt;

/// Stage of a submission at which an error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Loading configuration or keys
    Setup,
    /// Selecting a UTXO and fetching its previous transaction
    Resolve,
    /// Encoding the payload, assembling and signing the transaction
    Build,
    /// Remote validation by the Glittr API
    Validate,
    /// Broadcast to the network
    Broadcast,
    /// Waiting for the indexer to record the transaction
    Index,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Setup => "setup",
            Stage::Resolve => "utxo resolution",
            Stage::Build => "transaction build",
            Stage::Validate => "validation",
            Stage::Broadcast => "broadcast",
            Stage::Index => "indexing",
        };
        f.write_str(name)
    }
}

/// Errors produced by the glittr library
#[derive(Debug, thiserror::Error)]
pub enum GlittrError {
    #[error("No spendable output for address {address}")]
    NoSpendableOutput { address: String },

    #[error("Upstream unavailable during {stage}: {message}")]
    UpstreamUnavailable { stage: Stage, message: String },

    #[error("Invalid signature for input {input}")]
    InvalidSignature { input: usize },

    #[error("Insufficient funds: output of {value} sats cannot pay a {fee} sat fee")]
    InsufficientFunds { value: u64, fee: u64 },

    #[error("Transaction rejected by validator: {0}")]
    ValidationRejected(String),

    #[error("Broadcast rejected: {0}")]
    BroadcastRejected(String),

    #[error("Indexer record for {txid} has no usable block_tx: {reason}")]
    IndexingDataMissing { txid: String, reason: String },

    #[error("Transaction {txid} not indexed after {attempts} attempts")]
    Timeout { txid: String, attempts: u32 },

    #[error("Submission cancelled while waiting for {txid}")]
    Cancelled { txid: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Payload error: {0}")]
    Payload(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GlittrError {
    /// Build an [`GlittrError::UpstreamUnavailable`] for the given stage
    pub fn upstream(stage: Stage, message: impl Into<String>) -> Self {
        GlittrError::UpstreamUnavailable {
            stage,
            message: message.into(),
        }
    }

    /// The submission stage this error belongs to
    pub fn stage(&self) -> Stage {
        match self {
            GlittrError::NoSpendableOutput { .. } => Stage::Resolve,
            GlittrError::UpstreamUnavailable { stage, .. } => *stage,
            GlittrError::InvalidSignature { .. }
            | GlittrError::InsufficientFunds { .. }
            | GlittrError::Serialization(_)
            | GlittrError::Payload(_)
            | GlittrError::Transaction(_) => Stage::Build,
            GlittrError::ValidationRejected(_) => Stage::Validate,
            GlittrError::BroadcastRejected(_) => Stage::Broadcast,
            GlittrError::IndexingDataMissing { .. }
            | GlittrError::Timeout { .. }
            | GlittrError::Cancelled { .. } => Stage::Index,
            GlittrError::Config(_) => Stage::Setup,
        }
    }
}

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, GlittrError>;
