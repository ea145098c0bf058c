//! Transaction construction and signing
//!
//! This module handles:
//! - Building the one-input, two-output Glittr transaction
//! - Legacy (non-segwit) signing of the input against the full previous transaction
//! - Local signature verification through an injected [`SignatureVerifier`]
//! - Finalizing the scriptSig and serializing the result
//!
//! Output 0 is always the zero-value data-carrying script and output 1 is the
//! destination, paid the input value minus a fixed fee.

use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode::{deserialize, serialize_hex};
use bitcoin::hashes::Hash;
use bitcoin::script::{Builder, ScriptBuf};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{
    ecdsa, Address, Amount, OutPoint, PrivateKey, PublicKey, Sequence, Transaction, TxIn, TxOut,
    Txid, Witness,
};
use log::{debug, info};
use secp256k1::{All, Message, Secp256k1, VerifyOnly};

use crate::error::{GlittrError, Result};
use crate::utxo::BitcoinUtxo;

/// Default fee paid by every Glittr transaction, in satoshis
pub const DEFAULT_FEE_SATS: u64 = 1000;

/// Checks an ECDSA signature over a sighash
///
/// The assembler never hard-codes a curve backend; callers supply one. Any
/// `Fn(&PublicKey, &Message, &secp256k1::ecdsa::Signature) -> bool` works.
pub trait SignatureVerifier: Send + Sync {
    fn verify(
        &self,
        pubkey: &PublicKey,
        sighash: &Message,
        signature: &secp256k1::ecdsa::Signature,
    ) -> bool;
}

impl<F> SignatureVerifier for F
where
    F: Fn(&PublicKey, &Message, &secp256k1::ecdsa::Signature) -> bool + Send + Sync,
{
    fn verify(
        &self,
        pubkey: &PublicKey,
        sighash: &Message,
        signature: &secp256k1::ecdsa::Signature,
    ) -> bool {
        self(pubkey, sighash, signature)
    }
}

/// Verifier backed by libsecp256k1
pub struct Secp256k1Verifier {
    secp: Secp256k1<VerifyOnly>,
}

impl Secp256k1Verifier {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::verification_only(),
        }
    }
}

impl Default for Secp256k1Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureVerifier for Secp256k1Verifier {
    fn verify(
        &self,
        pubkey: &PublicKey,
        sighash: &Message,
        signature: &secp256k1::ecdsa::Signature,
    ) -> bool {
        self.secp.verify_ecdsa(sighash, signature, &pubkey.inner).is_ok()
    }
}

/// A signed, verified and serialized transaction
#[derive(Debug, Clone, PartialEq)]
pub struct SignedTransaction {
    pub tx: Transaction,
    /// Consensus serialization as hex
    pub hex: String,
    pub txid: Txid,
}

/// Builds and signs Glittr transactions
pub struct TransactionAssembler<V> {
    verifier: V,
    fee_sats: u64,
    secp: Secp256k1<All>,
}

impl<V: SignatureVerifier> TransactionAssembler<V> {
    pub fn new(verifier: V) -> Self {
        Self {
            verifier,
            fee_sats: DEFAULT_FEE_SATS,
            secp: Secp256k1::new(),
        }
    }

    pub fn with_fee(mut self, fee_sats: u64) -> Self {
        self.fee_sats = fee_sats;
        self
    }

    pub fn fee_sats(&self) -> u64 {
        self.fee_sats
    }

    /// Build, sign, verify and finalize a transaction spending `utxo`
    ///
    /// `prev_tx_hex` is the full transaction that created `utxo`. The
    /// signature is checked against `public_key` before the input is
    /// finalized; a mismatch aborts with [`GlittrError::InvalidSignature`].
    pub fn build_and_sign(
        &self,
        private_key: &PrivateKey,
        public_key: &PublicKey,
        destination: &Address,
        payload_script: ScriptBuf,
        utxo: &BitcoinUtxo,
        prev_tx_hex: &str,
    ) -> Result<SignedTransaction> {
        if utxo.value <= self.fee_sats {
            return Err(GlittrError::InsufficientFunds {
                value: utxo.value,
                fee: self.fee_sats,
            });
        }
        let change = utxo.value - self.fee_sats;

        let prev_tx = decode_previous_transaction(prev_tx_hex)?;
        let prev_out = spent_output(&prev_tx, utxo)?;
        if prev_out.script_pubkey != ScriptBuf::new_p2pkh(&public_key.pubkey_hash()) {
            return Err(GlittrError::Transaction(format!(
                "Output {}:{} is not locked to the signing key",
                utxo.txid, utxo.vout
            )));
        }

        let mut tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::new(utxo.txid, utxo.vout),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![
                TxOut {
                    value: Amount::ZERO,
                    script_pubkey: payload_script,
                },
                TxOut {
                    value: Amount::from_sat(change),
                    script_pubkey: destination.script_pubkey(),
                },
            ],
        };

        let sighash_type = EcdsaSighashType::All;
        let sighash = SighashCache::new(&tx)
            .legacy_signature_hash(0, &prev_out.script_pubkey, sighash_type.to_u32())
            .map_err(|e| GlittrError::Transaction(format!("Failed to compute sighash: {}", e)))?;
        let message = Message::from_digest(sighash.to_byte_array());
        let signature = self.secp.sign_ecdsa(&message, &private_key.inner);

        if !self.verifier.verify(public_key, &message, &signature) {
            return Err(GlittrError::InvalidSignature { input: 0 });
        }
        debug!("Signature for input 0 verified");

        let signature = ecdsa::Signature {
            signature,
            sighash_type,
        };
        tx.input[0].script_sig = Builder::new()
            .push_slice(signature.serialize())
            .push_key(public_key)
            .into_script();

        let txid = tx.compute_txid();
        let hex = serialize_hex(&tx);
        info!("Built transaction {} ({} sats change)", txid, change);

        Ok(SignedTransaction { tx, hex, txid })
    }
}

fn decode_previous_transaction(prev_tx_hex: &str) -> Result<Transaction> {
    let bytes = hex::decode(prev_tx_hex.trim())
        .map_err(|e| GlittrError::Transaction(format!("Invalid previous transaction hex: {}", e)))?;
    deserialize(&bytes)
        .map_err(|e| GlittrError::Transaction(format!("Invalid previous transaction: {}", e)))
}

/// The output of `prev_tx` that `utxo` refers to, checked for consistency
fn spent_output<'a>(prev_tx: &'a Transaction, utxo: &BitcoinUtxo) -> Result<&'a TxOut> {
    let prev_txid = prev_tx.compute_txid();
    if prev_txid != utxo.txid {
        return Err(GlittrError::Transaction(format!(
            "Previous transaction {} does not match UTXO txid {}",
            prev_txid, utxo.txid
        )));
    }

    let output = prev_tx.output.get(utxo.vout as usize).ok_or_else(|| {
        GlittrError::Transaction(format!("Previous transaction has no output {}", utxo.vout))
    })?;

    if output.value.to_sat() != utxo.value {
        return Err(GlittrError::Transaction(format!(
            "UTXO value {} does not match previous output value {}",
            utxo.value,
            output.value.to_sat()
        )));
    }
    if output.script_pubkey.is_witness_program() {
        return Err(GlittrError::Transaction(
            "Witness outputs cannot be spent with legacy signing".to_string(),
        ));
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{FreeMintContractParams, SimpleAsset, TxBuilder, U128};
    use crate::payload::{decode_message, encode_message};
    use crate::utxo::UtxoStatus;
    use bitcoin::consensus::serialize;
    use bitcoin::Network;
    use secp256k1::SecretKey;

    struct Fixture {
        private_key: PrivateKey,
        public_key: PublicKey,
        address: Address,
        prev_tx: Transaction,
    }

    fn fixture(seed: u8, value: u64) -> Fixture {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[seed; 32]).unwrap();
        let private_key = PrivateKey::new(secret, Network::Regtest);
        let public_key = private_key.public_key(&secp);
        let address = Address::p2pkh(public_key, Network::Regtest);

        let prev_tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: Builder::new().push_int(1).into_script(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(value),
                script_pubkey: address.script_pubkey(),
            }],
        };

        Fixture {
            private_key,
            public_key,
            address,
            prev_tx,
        }
    }

    fn utxo_for(tx: &Transaction, value: u64) -> BitcoinUtxo {
        BitcoinUtxo {
            txid: tx.compute_txid(),
            vout: 0,
            value,
            status: UtxoStatus {
                confirmed: true,
                ..Default::default()
            },
        }
    }

    fn free_mint_script() -> ScriptBuf {
        let message = TxBuilder::free_mint_contract_instantiate(FreeMintContractParams {
            simple_asset: SimpleAsset {
                supply_cap: Some(U128(2000)),
                divisibility: 18,
                live_time: 0,
            },
            amount_per_mint: U128(2),
        });
        encode_message(&message).unwrap()
    }

    #[test]
    fn test_assembles_free_mint_transaction() {
        let f = fixture(0x11, 5000);
        let prev_hex = hex::encode(serialize(&f.prev_tx));
        let assembler = TransactionAssembler::new(Secp256k1Verifier::new());

        let signed = assembler
            .build_and_sign(
                &f.private_key,
                &f.public_key,
                &f.address,
                free_mint_script(),
                &utxo_for(&f.prev_tx, 5000),
                &prev_hex,
            )
            .unwrap();

        assert_eq!(signed.tx.input.len(), 1);
        assert_eq!(signed.tx.output.len(), 2);
        assert_eq!(signed.tx.output[0].value, Amount::ZERO);
        assert!(signed.tx.output[0].script_pubkey.is_op_return());
        assert_eq!(signed.tx.output[1].value, Amount::from_sat(4000));
        assert_eq!(signed.tx.output[1].script_pubkey, f.address.script_pubkey());
        assert!(!signed.tx.input[0].script_sig.is_empty());
        assert!(signed.tx.input[0].witness.is_empty());
        assert_eq!(signed.txid, signed.tx.compute_txid());
        assert_eq!(signed.hex, hex::encode(serialize(&signed.tx)));

        let carried = decode_message(&signed.tx.output[0].script_pubkey).unwrap();
        assert_eq!(carried, TxBuilder::free_mint_contract_instantiate(FreeMintContractParams {
            simple_asset: SimpleAsset {
                supply_cap: Some(U128(2000)),
                divisibility: 18,
                live_time: 0,
            },
            amount_per_mint: U128(2),
        }));
    }

    #[test]
    fn test_fee_is_independent_of_selection_threshold() {
        let f = fixture(0x12, 5000);
        let prev_hex = hex::encode(serialize(&f.prev_tx));
        let assembler = TransactionAssembler::new(Secp256k1Verifier::new()).with_fee(300);
        assert_eq!(assembler.fee_sats(), 300);

        let signed = assembler
            .build_and_sign(
                &f.private_key,
                &f.public_key,
                &f.address,
                free_mint_script(),
                &utxo_for(&f.prev_tx, 5000),
                &prev_hex,
            )
            .unwrap();
        assert_eq!(signed.tx.output[1].value, Amount::from_sat(4700));
    }

    #[test]
    fn test_insufficient_funds() {
        for value in [999, 1000] {
            let f = fixture(0x13, value);
            let prev_hex = hex::encode(serialize(&f.prev_tx));
            let assembler = TransactionAssembler::new(Secp256k1Verifier::new());

            let err = assembler
                .build_and_sign(
                    &f.private_key,
                    &f.public_key,
                    &f.address,
                    free_mint_script(),
                    &utxo_for(&f.prev_tx, value),
                    &prev_hex,
                )
                .unwrap_err();
            assert!(matches!(err, GlittrError::InsufficientFunds { fee: 1000, .. }));
        }
    }

    #[test]
    fn test_wrong_public_key_fails_verification() {
        let f = fixture(0x14, 5000);
        let other = fixture(0x15, 5000);
        // Output pays the other key, so only the verifier can catch the mismatch
        let prev_hex = hex::encode(serialize(&other.prev_tx));
        let assembler = TransactionAssembler::new(Secp256k1Verifier::new());

        let err = assembler
            .build_and_sign(
                &f.private_key,
                &other.public_key,
                &f.address,
                free_mint_script(),
                &utxo_for(&other.prev_tx, 5000),
                &prev_hex,
            )
            .unwrap_err();
        assert!(matches!(err, GlittrError::InvalidSignature { input: 0 }));
    }

    #[test]
    fn test_refuses_output_locked_to_another_key() {
        let f = fixture(0x31, 5000);
        let owner = fixture(0x32, 5000);
        let prev_hex = hex::encode(serialize(&owner.prev_tx));
        let assembler = TransactionAssembler::new(Secp256k1Verifier::new());

        let result = assembler.build_and_sign(
            &f.private_key,
            &f.public_key,
            &f.address,
            free_mint_script(),
            &utxo_for(&owner.prev_tx, 5000),
            &prev_hex,
        );
        match result {
            Err(GlittrError::Transaction(msg)) => assert!(msg.contains("not locked to the signing key")),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_closure_verifier_is_consulted() {
        let f = fixture(0x16, 5000);
        let prev_hex = hex::encode(serialize(&f.prev_tx));
        let reject_all = |_: &PublicKey, _: &Message, _: &secp256k1::ecdsa::Signature| false;
        let assembler = TransactionAssembler::new(reject_all);

        let err = assembler
            .build_and_sign(
                &f.private_key,
                &f.public_key,
                &f.address,
                free_mint_script(),
                &utxo_for(&f.prev_tx, 5000),
                &prev_hex,
            )
            .unwrap_err();
        assert!(matches!(err, GlittrError::InvalidSignature { .. }));
    }

    #[test]
    fn test_previous_transaction_must_match_utxo() {
        let f = fixture(0x17, 5000);
        let unrelated = fixture(0x18, 7000);
        let assembler = TransactionAssembler::new(Secp256k1Verifier::new());

        let mismatched_tx = assembler.build_and_sign(
            &f.private_key,
            &f.public_key,
            &f.address,
            free_mint_script(),
            &utxo_for(&f.prev_tx, 5000),
            &hex::encode(serialize(&unrelated.prev_tx)),
        );
        assert!(matches!(mismatched_tx, Err(GlittrError::Transaction(_))));

        let mismatched_value = assembler.build_and_sign(
            &f.private_key,
            &f.public_key,
            &f.address,
            free_mint_script(),
            &utxo_for(&f.prev_tx, 6000),
            &hex::encode(serialize(&f.prev_tx)),
        );
        assert!(matches!(mismatched_value, Err(GlittrError::Transaction(_))));

        let bad_hex = assembler.build_and_sign(
            &f.private_key,
            &f.public_key,
            &f.address,
            free_mint_script(),
            &utxo_for(&f.prev_tx, 5000),
            "zz",
        );
        assert!(matches!(bad_hex, Err(GlittrError::Transaction(_))));
    }
}
