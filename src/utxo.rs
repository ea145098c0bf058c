//! UTXO resolution
//!
//! Picks the output a Glittr transaction spends and fetches the full previous
//! transaction required for legacy input signing. Selection is first-fit:
//! the first confirmed output worth strictly more than the threshold wins.

use bitcoin::Txid;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{GlittrError, Result, Stage};
use crate::rpc::ChainProvider;

/// Default minimum value of a usable UTXO in satoshis
pub const MIN_UTXO_VALUE: u64 = 1000;

/// Confirmation status of an output as reported by Esplora
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoStatus {
    pub confirmed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_time: Option<u64>,
}

/// Unspent output owned by an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitcoinUtxo {
    pub txid: Txid,
    pub vout: u32,
    /// Value in satoshis
    pub value: u64,
    #[serde(default)]
    pub status: UtxoStatus,
}

impl BitcoinUtxo {
    pub fn is_spendable(&self, min_value: u64) -> bool {
        self.status.confirmed && self.value > min_value
    }
}

/// First confirmed output worth more than `min_value`
pub fn select_first_spendable(utxos: &[BitcoinUtxo], min_value: u64) -> Option<&BitcoinUtxo> {
    utxos.iter().find(|utxo| utxo.is_spendable(min_value))
}

/// Resolves spendable outputs through a chain data provider
pub struct UtxoResolver<'a, P: ?Sized> {
    provider: &'a P,
    min_value: u64,
}

impl<'a, P: ChainProvider + ?Sized> UtxoResolver<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self {
            provider,
            min_value: MIN_UTXO_VALUE,
        }
    }

    pub fn with_min_value(mut self, min_value: u64) -> Self {
        self.min_value = min_value;
        self
    }

    /// Select the first spendable output of `address`
    pub async fn select_utxo(&self, address: &str) -> Result<BitcoinUtxo> {
        let utxos = self.provider.get_address_utxos(address).await?;
        debug!("Address {} has {} UTXOs", address, utxos.len());

        let utxo = select_first_spendable(&utxos, self.min_value)
            .cloned()
            .ok_or_else(|| GlittrError::NoSpendableOutput {
                address: address.to_string(),
            })?;

        info!("Selected UTXO {}:{} ({} sats)", utxo.txid, utxo.vout, utxo.value);
        Ok(utxo)
    }

    /// Fetch the hex of the transaction that created an output
    pub async fn fetch_raw_transaction(&self, txid: &Txid) -> Result<String> {
        let hex = self.provider.get_transaction_hex(&txid.to_string()).await?;
        let hex = hex.trim();
        if hex.is_empty() {
            return Err(GlittrError::upstream(
                Stage::Resolve,
                format!("empty transaction hex for {}", txid),
            ));
        }
        Ok(hex.to_string())
    }
}
