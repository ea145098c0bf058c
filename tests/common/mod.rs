//! Shared fixtures for the integration tests

#![allow(dead_code)]

use bitcoin::absolute::LockTime;
use bitcoin::script::Builder;
use bitcoin::transaction::Version;
use bitcoin::{Amount, Network, OutPoint, PrivateKey, Sequence, Transaction, TxIn, TxOut, Witness};
use glittr::pipeline::{PollPolicy, SubmissionPipeline};
use glittr::rpc::in_memory::{InMemoryChain, InMemoryIndexer};
use glittr::utxo::{BitcoinUtxo, UtxoStatus};
use glittr::{Secp256k1Verifier, Signer};
use secp256k1::SecretKey;
use std::time::Duration;

pub const NETWORK: Network = Network::Regtest;

pub type TestPipeline = SubmissionPipeline<InMemoryChain, InMemoryIndexer, Secp256k1Verifier>;

pub fn signer(seed: u8) -> Signer {
    let secret = SecretKey::from_slice(&[seed; 32]).unwrap();
    Signer::new(PrivateKey::new(secret, NETWORK))
}

/// Transaction paying `value` sats to the signer's P2PKH address
pub fn funding_transaction(signer: &Signer, value: u64, nonce: i64) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig: Builder::new().push_int(nonce).into_script(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: Amount::from_sat(value),
            script_pubkey: signer.p2pkh_address(NETWORK).script_pubkey(),
        }],
    }
}

pub fn confirmed_utxo(tx: &Transaction) -> BitcoinUtxo {
    BitcoinUtxo {
        txid: tx.compute_txid(),
        vout: 0,
        value: tx.output[0].value.to_sat(),
        status: UtxoStatus {
            confirmed: true,
            ..Default::default()
        },
    }
}

/// Chain where the signer owns one confirmed output of `value` sats
pub fn funded_chain(signer: &Signer, value: u64) -> InMemoryChain {
    let chain = InMemoryChain::new();
    let tx = funding_transaction(signer, value, 1);
    chain.add_transaction(&tx);
    chain.set_utxos(
        &signer.p2pkh_address(NETWORK).to_string(),
        vec![confirmed_utxo(&tx)],
    );
    chain
}

/// Millisecond delays so polling tests finish quickly
pub fn fast_poll() -> PollPolicy {
    PollPolicy {
        pending_delay: Duration::from_millis(5),
        error_delay: Duration::from_millis(1),
        ..Default::default()
    }
}

pub fn pipeline(chain: &InMemoryChain, indexer: &InMemoryIndexer) -> TestPipeline {
    SubmissionPipeline::new(chain.clone(), indexer.clone(), Secp256k1Verifier::new())
        .with_poll_policy(fast_poll())
}
