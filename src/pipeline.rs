//! Submission pipeline
//!
//! Drives one Glittr message from a signed transaction to an indexed
//! operation. Each submission walks the states
//! `Built -> Validated -> Broadcast -> Indexed -> Done` in order and stops in
//! `Failed` on the first terminal error.
//!
//! Only two situations are retried, both while polling the indexer: a
//! not-yet-indexed answer and a failed lookup. How long and how often that
//! happens is controlled by a [`PollPolicy`]; the default polls forever with
//! fixed delays. A [`CancellationFlag`] is checked at every retry boundary.

use bitcoin::{Address, Network};
use log::{debug, error, info, warn};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{GlittrError, Result};
use crate::message::{BlockTxTuple, OpReturnMessage};
use crate::payload::encode_message;
use crate::rpc::{ChainProvider, IndexerLookup, IndexerProvider};
use crate::signer::Signer;
use crate::transaction::{SignatureVerifier, SignedTransaction, TransactionAssembler};
use crate::utxo::{UtxoResolver, MIN_UTXO_VALUE};

/// Position of a submission in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Built,
    Validated,
    Broadcast,
    Indexed,
    Done,
    Failed,
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmissionState::Built => "BUILT",
            SubmissionState::Validated => "VALIDATED",
            SubmissionState::Broadcast => "BROADCAST",
            SubmissionState::Indexed => "INDEXED",
            SubmissionState::Done => "DONE",
            SubmissionState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Growth of the delay between indexer polls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed,
    /// Delay multiplied by `factor` after every retry, capped at `max_delay`
    Exponential { factor: u32, max_delay: Duration },
}

/// How the indexer is polled after broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay after a not-yet-indexed answer
    pub pending_delay: Duration,
    /// Delay after a failed lookup
    pub error_delay: Duration,
    /// Give up with [`GlittrError::Timeout`] after this many lookups
    pub max_attempts: Option<u32>,
    pub backoff: Backoff,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            pending_delay: Duration::from_millis(1500),
            error_delay: Duration::from_millis(1000),
            max_attempts: None,
            backoff: Backoff::Fixed,
        }
    }
}

impl PollPolicy {
    /// Delay before the next retry after `streak` consecutive answers of one kind
    ///
    /// A factor below 1 is treated as 1.
    pub fn delay(&self, base: Duration, streak: u32) -> Duration {
        match &self.backoff {
            Backoff::Fixed => base,
            Backoff::Exponential { factor, max_delay } => {
                let multiplier = (*factor).max(1).saturating_pow(streak.saturating_sub(1));
                base.saturating_mul(multiplier).min(*max_delay)
            }
        }
    }
}

/// Shared flag that stops a submission at its next retry boundary
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Who pays for a submission and where its change goes
#[derive(Debug, Clone)]
pub struct SubmissionRequest<'a> {
    pub signer: &'a Signer,
    /// Address whose UTXOs fund the transaction
    pub funding_address: Address,
    /// Receiver of output 1
    pub destination: Address,
    pub cancellation: Option<CancellationFlag>,
}

impl<'a> SubmissionRequest<'a> {
    /// Fund from and pay change back to the signer's P2PKH address
    pub fn new(signer: &'a Signer, network: Network) -> Self {
        let address = signer.p2pkh_address(network);
        Self {
            signer,
            funding_address: address.clone(),
            destination: address,
            cancellation: None,
        }
    }

    pub fn with_destination(mut self, destination: Address) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map_or(false, CancellationFlag::is_cancelled)
    }
}

/// Indexer record of a transaction
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedTransaction {
    pub txid: String,
    pub block_tx: BlockTxTuple,
    /// Full JSON record returned by the indexer
    pub record: Value,
}

/// Result of a completed submission
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReceipt {
    pub txid: String,
    pub block_tx: BlockTxTuple,
    pub record: Value,
    pub state: SubmissionState,
}

/// Runs submissions against a chain provider and a Glittr indexer
pub struct SubmissionPipeline<C, I, V> {
    chain: C,
    indexer: I,
    assembler: TransactionAssembler<V>,
    min_utxo_value: u64,
    poll: PollPolicy,
}

impl<C, I, V> SubmissionPipeline<C, I, V>
where
    C: ChainProvider,
    I: IndexerProvider,
    V: SignatureVerifier,
{
    pub fn new(chain: C, indexer: I, verifier: V) -> Self {
        Self {
            chain,
            indexer,
            assembler: TransactionAssembler::new(verifier),
            min_utxo_value: MIN_UTXO_VALUE,
            poll: PollPolicy::default(),
        }
    }

    pub fn with_fee(mut self, fee_sats: u64) -> Self {
        self.assembler = self.assembler.with_fee(fee_sats);
        self
    }

    pub fn with_min_utxo_value(mut self, min_utxo_value: u64) -> Self {
        self.min_utxo_value = min_utxo_value;
        self
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    pub fn indexer(&self) -> &I {
        &self.indexer
    }

    pub fn poll_policy(&self) -> &PollPolicy {
        &self.poll
    }

    /// Submit `message` and wait until it is indexed
    pub async fn submit(
        &self,
        message: &OpReturnMessage,
        request: &SubmissionRequest<'_>,
    ) -> Result<SubmissionReceipt> {
        self.submit_observed(message, request, |_, _| {}).await
    }

    /// Like [`submit`](Self::submit), reporting each state reached with the txid
    pub async fn submit_observed<F>(
        &self,
        message: &OpReturnMessage,
        request: &SubmissionRequest<'_>,
        mut observer: F,
    ) -> Result<SubmissionReceipt>
    where
        F: FnMut(SubmissionState, &str) + Send,
    {
        let mut reached: Option<(SubmissionState, String)> = None;
        let result = self
            .run(message, request, &mut |next: SubmissionState, txid: &str| {
                reached = Some((next, txid.to_string()));
                observer(next, txid);
            })
            .await;

        if let Err(e) = &result {
            let (from, txid) = match reached {
                Some((state, txid)) => (state.to_string(), txid),
                None => ("start".to_string(), String::new()),
            };
            error!(
                "Submission {} {} -> {} during {}: {}",
                txid,
                from,
                SubmissionState::Failed,
                e.stage(),
                e
            );
            observer(SubmissionState::Failed, &txid);
        }
        result
    }

    async fn run(
        &self,
        message: &OpReturnMessage,
        request: &SubmissionRequest<'_>,
        transition: &mut (dyn FnMut(SubmissionState, &str) + Send),
    ) -> Result<SubmissionReceipt> {
        let signed = self.build(message, request).await?;
        let txid = signed.txid.to_string();
        info!("Submission {} is {}", txid, SubmissionState::Built);
        transition(SubmissionState::Built, &txid);

        self.validate(&signed).await?;
        info!("Submission {} is {}", txid, SubmissionState::Validated);
        transition(SubmissionState::Validated, &txid);

        if request.is_cancelled() {
            return Err(GlittrError::Cancelled { txid });
        }
        let txid = self.broadcast(&signed).await?;
        info!("Submission {} is {}", txid, SubmissionState::Broadcast);
        transition(SubmissionState::Broadcast, &txid);

        let indexed = self
            .wait_for_indexer(&txid, request.cancellation.as_ref())
            .await?;
        info!(
            "Submission {} is {} at {}",
            txid,
            SubmissionState::Indexed,
            indexed.block_tx
        );
        transition(SubmissionState::Indexed, &txid);

        transition(SubmissionState::Done, &txid);
        Ok(SubmissionReceipt {
            txid: indexed.txid,
            block_tx: indexed.block_tx,
            record: indexed.record,
            state: SubmissionState::Done,
        })
    }

    /// Resolve a UTXO, embed `message` and return the signed transaction
    pub async fn build(
        &self,
        message: &OpReturnMessage,
        request: &SubmissionRequest<'_>,
    ) -> Result<SignedTransaction> {
        let payload = encode_message(message)?;
        debug!("Encoded {} message into {} byte script", message.kind(), payload.len());

        let funding_address = request.funding_address.to_string();
        let resolver = UtxoResolver::new(&self.chain).with_min_value(self.min_utxo_value);
        let utxo = resolver.select_utxo(&funding_address).await?;
        let prev_tx_hex = resolver.fetch_raw_transaction(&utxo.txid).await?;

        self.assembler.build_and_sign(
            request.signer.private_key(),
            request.signer.public_key(),
            &request.destination,
            payload,
            &utxo,
            &prev_tx_hex,
        )
    }

    /// Have the Glittr validator check a signed transaction
    pub async fn validate(&self, signed: &SignedTransaction) -> Result<()> {
        let response = self.indexer.validate_transaction(&signed.hex).await?;
        if !response.is_valid {
            return Err(GlittrError::ValidationRejected(response.msg.unwrap_or_else(|| {
                "validator reported the transaction as invalid".to_string()
            })));
        }
        Ok(())
    }

    /// Relay a validated transaction, returning the txid reported by the node
    pub async fn broadcast(&self, signed: &SignedTransaction) -> Result<String> {
        let txid = self.chain.broadcast_transaction(&signed.hex).await?;
        if txid != signed.txid.to_string() {
            warn!(
                "Broadcast returned txid {} but the signed transaction is {}",
                txid, signed.txid
            );
        }
        Ok(txid)
    }

    /// Poll the indexer until `txid` is recorded
    pub async fn wait_for_indexer(
        &self,
        txid: &str,
        cancellation: Option<&CancellationFlag>,
    ) -> Result<IndexedTransaction> {
        let mut attempts: u32 = 0;
        let mut pending_streak: u32 = 0;
        let mut error_streak: u32 = 0;

        loop {
            if cancellation.map_or(false, CancellationFlag::is_cancelled) {
                return Err(GlittrError::Cancelled {
                    txid: txid.to_string(),
                });
            }

            attempts = attempts.saturating_add(1);
            let delay = match self.indexer.get_indexed_transaction(txid).await {
                Ok(IndexerLookup::Found(record)) => return indexed_transaction(txid, record),
                Ok(IndexerLookup::Pending) => {
                    debug!("Transaction {} not indexed yet (attempt {})", txid, attempts);
                    pending_streak = pending_streak.saturating_add(1);
                    error_streak = 0;
                    self.poll.delay(self.poll.pending_delay, pending_streak)
                }
                Err(e) => {
                    warn!("Indexer lookup for {} failed (attempt {}): {}", txid, attempts, e);
                    error_streak = error_streak.saturating_add(1);
                    pending_streak = 0;
                    self.poll.delay(self.poll.error_delay, error_streak)
                }
            };

            if let Some(max_attempts) = self.poll.max_attempts {
                if attempts >= max_attempts {
                    return Err(GlittrError::Timeout {
                        txid: txid.to_string(),
                        attempts,
                    });
                }
            }

            tokio::time::sleep(delay).await;
        }
    }
}

fn indexed_transaction(txid: &str, record: Value) -> Result<IndexedTransaction> {
    let missing = |reason: String| GlittrError::IndexingDataMissing {
        txid: txid.to_string(),
        reason,
    };

    let block_tx = match record.get("block_tx") {
        None | Some(Value::Null) => return Err(missing("no block_tx field".to_string())),
        Some(Value::String(raw)) => raw
            .parse::<BlockTxTuple>()
            .map_err(|e| missing(format!("malformed block_tx {:?}: {}", raw, e)))?,
        Some(other) => return Err(missing(format!("block_tx is not a string: {}", other))),
    };

    Ok(IndexedTransaction {
        txid: txid.to_string(),
        block_tx,
        record,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_policy_is_unbounded_and_fixed() {
        let policy = PollPolicy::default();
        assert_eq!(policy.max_attempts, None);
        assert_eq!(policy.delay(policy.pending_delay, 10), Duration::from_millis(1500));
        assert_eq!(policy.delay(policy.error_delay, 10), Duration::from_millis(1000));
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let policy = PollPolicy {
            backoff: Backoff::Exponential {
                factor: 2,
                max_delay: Duration::from_millis(500),
            },
            ..Default::default()
        };
        let base = Duration::from_millis(100);
        assert_eq!(policy.delay(base, 1), Duration::from_millis(100));
        assert_eq!(policy.delay(base, 2), Duration::from_millis(200));
        assert_eq!(policy.delay(base, 3), Duration::from_millis(400));
        assert_eq!(policy.delay(base, 4), Duration::from_millis(500));
        assert_eq!(policy.delay(base, 200), Duration::from_millis(500));
    }

    #[test]
    fn test_zero_factor_keeps_base_delay() {
        let policy = PollPolicy {
            backoff: Backoff::Exponential {
                factor: 0,
                max_delay: Duration::from_secs(1),
            },
            ..Default::default()
        };
        let base = Duration::from_millis(100);
        assert_eq!(policy.delay(base, 1), base);
        assert_eq!(policy.delay(base, 5), base);
    }

    #[test]
    fn test_indexed_transaction_parses_block_tx() {
        let indexed = indexed_transaction("ab", json!({ "block_tx": "100:2" })).unwrap();
        assert_eq!(indexed.block_tx, BlockTxTuple(100, 2));
    }

    #[test]
    fn test_indexed_transaction_requires_block_tx() {
        for record in [
            json!({ "is_valid": true }),
            json!({ "block_tx": null }),
            json!({ "block_tx": "100" }),
            json!({ "block_tx": [100, 2] }),
        ] {
            let err = indexed_transaction("ab", record).unwrap_err();
            assert!(matches!(err, GlittrError::IndexingDataMissing { .. }));
        }
    }

    #[test]
    fn test_cancellation_flag_is_shared() {
        let flag = CancellationFlag::new();
        let handle = flag.clone();
        assert!(!flag.is_cancelled());
        handle.cancel();
        assert!(flag.is_cancelled());
    }
}
