//! Configuration loading
//!
//! Settings come from a JSON file (an explicit path, or `~/.glittr/config.json`
//! when present) layered over the defaults of the devnet preset. Command line
//! flags are applied on top by the binary.

use bitcoin::Network;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{GlittrError, Result};
use crate::network::NetworkPreset;
use crate::pipeline::{Backoff, PollPolicy};
use crate::rpc::{EsploraConfig, GlittrApiConfig};
use crate::transaction::DEFAULT_FEE_SATS;
use crate::utxo::MIN_UTXO_VALUE;

/// Indexer polling settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub pending_delay_ms: u64,
    pub error_delay_ms: u64,
    /// Unbounded when absent
    pub max_attempts: Option<u32>,
    /// 1 keeps the delays fixed
    pub backoff_factor: u32,
    pub max_delay_ms: Option<u64>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            pending_delay_ms: 1500,
            error_delay_ms: 1000,
            max_attempts: None,
            backoff_factor: 1,
            max_delay_ms: None,
        }
    }
}

impl PollSettings {
    pub fn to_poll_policy(&self) -> PollPolicy {
        let pending_delay = Duration::from_millis(self.pending_delay_ms);
        let error_delay = Duration::from_millis(self.error_delay_ms);
        let backoff = if self.backoff_factor > 1 {
            Backoff::Exponential {
                factor: self.backoff_factor,
                max_delay: self
                    .max_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| pending_delay.max(error_delay).saturating_mul(16)),
            }
        } else {
            Backoff::Fixed
        };

        PollPolicy {
            pending_delay,
            error_delay,
            max_attempts: self.max_attempts,
            backoff,
        }
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlittrConfig {
    pub network: Network,
    pub esplora_url: String,
    pub glittr_api_url: String,
    pub explorer_url: String,
    /// Fee paid by every transaction, in satoshis
    pub fee_sats: u64,
    /// UTXOs must be worth strictly more than this to be spent
    pub min_utxo_value: u64,
    pub http_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub max_concurrent_requests: usize,
    pub poll: PollSettings,
}

impl Default for GlittrConfig {
    fn default() -> Self {
        Self::from_preset(&NetworkPreset::devnet())
    }
}

impl GlittrConfig {
    /// Defaults with the endpoints of `preset`
    pub fn from_preset(preset: &NetworkPreset) -> Self {
        Self {
            network: preset.network,
            esplora_url: preset.esplora_url.clone(),
            glittr_api_url: preset.glittr_api_url.clone(),
            explorer_url: preset.explorer_url.clone(),
            fee_sats: DEFAULT_FEE_SATS,
            min_utxo_value: MIN_UTXO_VALUE,
            http_timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 1000,
            max_concurrent_requests: 10,
            poll: PollSettings::default(),
        }
    }

    /// Switch endpoints and network to those of `preset`
    pub fn apply_preset(&mut self, preset: &NetworkPreset) {
        self.network = preset.network;
        self.esplora_url = preset.esplora_url.clone();
        self.glittr_api_url = preset.glittr_api_url.clone();
        self.explorer_url = preset.explorer_url.clone();
    }

    /// Read a configuration file; missing fields take default values
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            GlittrError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            GlittrError::Config(format!("Invalid config file {}: {}", path.display(), e))
        })
    }

    /// Load from `path`, else from the default location, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            debug!("Loading config from {}", path.display());
            return Self::from_file(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                debug!("Loading config from {}", path.display());
                Self::from_file(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                GlittrError::Config(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| {
            GlittrError::Config(format!("Failed to write config file {}: {}", path.display(), e))
        })
    }

    pub fn esplora_config(&self) -> EsploraConfig {
        EsploraConfig {
            url: self.esplora_url.clone(),
            timeout: self.http_timeout_secs,
            max_retries: self.max_retries,
            retry_delay: self.retry_delay_ms,
            max_concurrent_requests: self.max_concurrent_requests,
        }
    }

    pub fn glittr_api_config(&self) -> GlittrApiConfig {
        GlittrApiConfig {
            url: self.glittr_api_url.clone(),
            timeout: self.http_timeout_secs,
        }
    }
}

/// `~/.glittr/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".glittr").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_follow_devnet() {
        let config = GlittrConfig::default();
        assert_eq!(config.esplora_url, "https://devnet-electrum.glittr.fi");
        assert_eq!(config.fee_sats, 1000);
        assert_eq!(config.min_utxo_value, 1000);
        assert_eq!(config.poll.to_poll_policy(), PollPolicy::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"esplora_url":"http://localhost:3000","fee_sats":500,"poll":{"max_attempts":20}}"#,
        )
        .unwrap();

        let config = GlittrConfig::load(Some(&path)).unwrap();
        assert_eq!(config.esplora_url, "http://localhost:3000");
        assert_eq!(config.fee_sats, 500);
        assert_eq!(config.min_utxo_value, 1000);
        assert_eq!(config.glittr_api_url, "https://devnet-core-api.glittr.fi");
        assert_eq!(config.poll.max_attempts, Some(20));
        assert_eq!(config.poll.pending_delay_ms, 1500);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = GlittrConfig::from_preset(&NetworkPreset::regtest());
        config.poll.backoff_factor = 2;
        config.save(&path).unwrap();

        assert_eq!(GlittrConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            GlittrConfig::load(Some(&path)),
            Err(GlittrError::Config(_))
        ));
        assert!(GlittrConfig::load(Some(&dir.path().join("missing.json"))).is_err());
    }

    #[test]
    fn test_backoff_factor_enables_exponential_policy() {
        let settings = PollSettings {
            backoff_factor: 2,
            max_delay_ms: Some(8000),
            max_attempts: Some(5),
            ..Default::default()
        };
        let policy = settings.to_poll_policy();
        assert_eq!(policy.max_attempts, Some(5));
        assert_eq!(
            policy.backoff,
            Backoff::Exponential {
                factor: 2,
                max_delay: Duration::from_millis(8000)
            }
        );
    }
}
