//! Key material for signing Glittr transactions
//!
//! A [`Signer`] wraps a single WIF-encoded private key and exposes the
//! public key and P2PKH address the submission flow needs. The key is only
//! read during signing; it is never mutated after construction.

use bitcoin::{Address, Network, PrivateKey, PublicKey};
use secp256k1::Secp256k1;
use std::fmt;
use std::str::FromStr;

use crate::error::{GlittrError, Result};

/// Private key and its derived public data
#[derive(Clone)]
pub struct Signer {
    private_key: PrivateKey,
    public_key: PublicKey,
}

impl Signer {
    /// Create a signer from a WIF-encoded private key
    pub fn from_wif(wif: &str) -> Result<Self> {
        let private_key = PrivateKey::from_str(wif.trim())
            .map_err(|e| GlittrError::Config(format!("Invalid WIF private key: {}", e)))?;
        Ok(Self::new(private_key))
    }

    pub fn new(private_key: PrivateKey) -> Self {
        let secp = Secp256k1::signing_only();
        let public_key = private_key.public_key(&secp);
        Self {
            private_key,
            public_key,
        }
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Legacy P2PKH address on `network`
    pub fn p2pkh_address(&self, network: Network) -> Address {
        Address::p2pkh(self.public_key, network)
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::SecretKey;

    #[test]
    fn test_wif_round_trip() {
        let secret = SecretKey::from_slice(&[0x21; 32]).unwrap();
        let key = PrivateKey::new(secret, Network::Regtest);
        let signer = Signer::from_wif(&key.to_wif()).unwrap();

        assert_eq!(signer.private_key(), &key);
        assert!(signer.public_key().compressed);

        let address = signer.p2pkh_address(Network::Regtest);
        assert!(address.to_string().starts_with('m') || address.to_string().starts_with('n'));
        assert_eq!(address.script_pubkey(), signer.p2pkh_address(Network::Testnet).script_pubkey());
    }

    #[test]
    fn test_invalid_wif() {
        let err = Signer::from_wif("not-a-key").unwrap_err();
        assert!(matches!(err, GlittrError::Config(_)));
    }

    #[test]
    fn test_debug_hides_private_key() {
        let secret = SecretKey::from_slice(&[0x22; 32]).unwrap();
        let signer = Signer::new(PrivateKey::new(secret, Network::Regtest));
        let printed = format!("{:?}", signer);
        assert!(!printed.contains(&signer.private_key().to_wif()));
    }
}
