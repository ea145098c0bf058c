//! Glittr metaprotocol client library
//!
//! Builds Glittr messages (contract creations, contract calls and transfers),
//! embeds them in an `OP_RETURN` output, signs a one-input legacy transaction
//! and drives it through remote validation, broadcast and indexing.
//!
//! The flow through the modules is
//! [`message`] -> [`payload`] -> [`utxo`] -> [`transaction`] -> [`pipeline`].

pub mod config;
pub mod error;
pub mod message;
pub mod network;
pub mod payload;
pub mod pipeline;
pub mod rpc;
pub mod signer;
pub mod transaction;
pub mod utxo;

pub use config::{GlittrConfig, PollSettings};
pub use error::{GlittrError, Result, Stage};
pub use message::{BlockTxTuple, OpReturnMessage, TxBuilder, U128};
pub use network::NetworkPreset;
pub use payload::{decode_message, encode_message, extract_message};
pub use pipeline::{
    Backoff, CancellationFlag, PollPolicy, SubmissionPipeline, SubmissionReceipt,
    SubmissionRequest, SubmissionState,
};
pub use rpc::{ChainProvider, EsploraClient, GlittrApiClient, IndexerLookup, IndexerProvider};
pub use signer::Signer;
pub use transaction::{Secp256k1Verifier, SignatureVerifier, SignedTransaction, TransactionAssembler};
pub use utxo::{BitcoinUtxo, UtxoResolver};
