//! Named endpoint sets for Glittr networks
//!
//! A preset bundles the Bitcoin network with the Esplora, Glittr API and
//! explorer URLs that belong to it.

use bitcoin::Network;
use std::fmt;
use std::str::FromStr;

use crate::error::GlittrError;

/// Endpoints of a Glittr deployment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkPreset {
    pub name: String,
    /// Bitcoin network used for address encoding
    pub network: Network,
    /// Esplora API URL
    pub esplora_url: String,
    /// Glittr core API URL (validator and indexer)
    pub glittr_api_url: String,
    /// Block explorer URL
    pub explorer_url: String,
}

impl NetworkPreset {
    /// Public Glittr devnet
    pub fn devnet() -> Self {
        Self {
            name: "devnet".to_string(),
            network: Network::Regtest,
            esplora_url: "https://devnet-electrum.glittr.fi".to_string(),
            glittr_api_url: "https://devnet-core-api.glittr.fi".to_string(),
            explorer_url: "https://explorer.glittr.fi".to_string(),
        }
    }

    /// Local regtest node with Esplora and Glittr services on localhost
    pub fn regtest() -> Self {
        Self {
            name: "regtest".to_string(),
            network: Network::Regtest,
            esplora_url: "http://localhost:3000".to_string(),
            glittr_api_url: "http://localhost:3001".to_string(),
            explorer_url: "http://localhost:3002".to_string(),
        }
    }

    /// Look a preset up by name
    pub fn from_name(name: &str) -> Result<Self, GlittrError> {
        match name.to_lowercase().as_str() {
            "devnet" => Ok(Self::devnet()),
            "regtest" | "local" => Ok(Self::regtest()),
            other => Err(GlittrError::Config(format!("Unknown network preset: {}", other))),
        }
    }

    /// Explorer page for a transaction
    pub fn explorer_tx_url(&self, txid: &str) -> String {
        explorer_tx_url(&self.explorer_url, txid)
    }
}

impl Default for NetworkPreset {
    fn default() -> Self {
        Self::devnet()
    }
}

impl FromStr for NetworkPreset {
    type Err = GlittrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl fmt::Display for NetworkPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Explorer page for a transaction under `explorer_url`
pub fn explorer_tx_url(explorer_url: &str, txid: &str) -> String {
    format!("{}/tx/{}", explorer_url.trim_end_matches('/'), txid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(NetworkPreset::from_name("devnet").unwrap(), NetworkPreset::devnet());
        assert_eq!(NetworkPreset::from_name("REGTEST").unwrap(), NetworkPreset::regtest());
        assert!(NetworkPreset::from_name("mainnet").is_err());
    }

    #[test]
    fn test_explorer_link() {
        let preset = NetworkPreset::devnet();
        assert_eq!(
            preset.explorer_tx_url("abcd"),
            "https://explorer.glittr.fi/tx/abcd"
        );
        assert_eq!(explorer_tx_url("http://x/", "ff"), "http://x/tx/ff");
    }
}
