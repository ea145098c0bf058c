//! Contract parameter types
//!
//! This module holds the building blocks of a contract creation message:
//! - Asset descriptors (simple and NFT)
//! - Distribution schemes (free mint, preallocation, purchase/burn/swap, NFT mint)
//! - Vesting plans and oracle settings

use bitcoin::OutPoint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::{
    BitcoinAddress, BlockHeight, BlockTxTuple, Pubkey, Ratio, RelativeOrAbsoluteBlockHeight, U128,
};

/// Asset consumed by a purchase/burn/swap contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputAsset {
    RawBtc,
    GlittrAsset(BlockTxTuple),
    Metaprotocol,
}

/// What happens to the input asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferScheme {
    /// Input is paid to this address
    Purchase(BitcoinAddress),
    /// Input is burned
    Burn {},
}

/// How many output units are issued per input unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferRatioType {
    Fixed { ratio: Ratio },
    Oracle { pubkey: Pubkey, setting: OracleSetting },
}

/// Oracle trust settings for oracle-priced contracts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleSetting {
    /// `None` fully trusts the oracle; otherwise the ordinal number, rune block_tx, etc.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    /// Number of blocks an oracle message stays valid for
    pub block_height_slippage: u8,
}

/// Oracle attestation attached to a mint call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_outpoint: Option<OutPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_in_value: Option<U128>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_value: Option<U128>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    pub block_height: BlockHeight,
}

/// Oracle message together with the oracle's signature over it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleMessageSigned {
    pub signature: Vec<u8>,
    pub message: OracleMessage,
}

/// Anyone may mint `amount_per_mint` until `supply_cap` is reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeMint {
    /// `None` means unlimited supply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supply_cap: Option<U128>,
    pub amount_per_mint: U128,
}

/// Release schedule for preallocated amounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VestingPlan {
    Timelock(RelativeOrAbsoluteBlockHeight),
    Scheduled(Vec<(Ratio, RelativeOrAbsoluteBlockHeight)>),
}

impl VestingPlan {
    /// Whether the plan releases exactly the whole allocation
    ///
    /// A timelock always releases everything at once. A schedule is complete
    /// when its ratios sum to exactly one.
    pub fn is_fully_allocated(&self) -> bool {
        let schedule = match self {
            VestingPlan::Timelock(_) => return true,
            VestingPlan::Scheduled(schedule) => schedule,
        };

        let mut sum: (u128, u128) = (0, 1);
        for ((num, den), _) in schedule {
            let (num, den) = (num.value(), den.value());
            if den == 0 {
                return false;
            }
            let next = sum
                .0
                .checked_mul(den)
                .zip(num.checked_mul(sum.1))
                .and_then(|(a, b)| a.checked_add(b))
                .zip(sum.1.checked_mul(den));
            let Some((n, d)) = next else {
                return false;
            };
            let g = gcd(n, d);
            sum = (n / g, d / g);
        }
        sum.0 == sum.1
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

/// Amounts reserved for known recipients at creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preallocated {
    /// Amount to the ordered list of recipient keys that each receive it
    pub allocations: BTreeMap<U128, Vec<Pubkey>>,
    pub vesting_plan: VestingPlan,
}

/// Asset issued in exchange for another asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseBurnSwap {
    pub input_asset: InputAsset,
    pub transfer_scheme: TransferScheme,
    pub transfer_ratio_type: TransferRatioType,
}

/// Minting terms for an NFT collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftMint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supply_cap: Option<U128>,
    pub amount_per_mint: U128,
    pub name: String,
    pub url: String,
    pub url_hash: String,
}

/// Fungible asset metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleAsset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supply_cap: Option<U128>,
    pub divisibility: u8,
    pub live_time: BlockHeight,
}

/// NFT asset metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftAsset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supply_cap: Option<U128>,
    pub divisibility: u8,
    pub name: String,
    pub url: String,
    pub url_hash: String,
    pub live_time: BlockHeight,
}

/// Asset descriptor carried by an asset contract
///
/// The wire form has no tag, the NFT shape is tried first because it is a
/// strict superset of the simple one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssetDescriptor {
    Nft(NftAsset),
    Simple(SimpleAsset),
}

impl From<SimpleAsset> for AssetDescriptor {
    fn from(asset: SimpleAsset) -> Self {
        AssetDescriptor::Simple(asset)
    }
}

impl From<NftAsset> for AssetDescriptor {
    fn from(asset: NftAsset) -> Self {
        AssetDescriptor::Nft(asset)
    }
}

/// A single way of distributing an asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistributionScheme {
    FreeMint(FreeMint),
    Preallocated(Preallocated),
    Purchase(PurchaseBurnSwap),
    NftMint(NftMint),
}

impl DistributionScheme {
    /// Position of the scheme in the wire record
    fn rank(&self) -> u8 {
        match self {
            DistributionScheme::FreeMint(_) => 0,
            DistributionScheme::Preallocated(_) => 1,
            DistributionScheme::Purchase(_) => 2,
            DistributionScheme::NftMint(_) => 3,
        }
    }
}

/// Non-empty set of distribution schemes offered by a contract, at most one per kind
///
/// On the wire this is a record with one optional field per kind; a missing
/// field means the contract does not offer that scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireDistributionSchemes", into = "WireDistributionSchemes")]
pub struct DistributionSchemes {
    schemes: Vec<DistributionScheme>,
}

impl DistributionSchemes {
    pub fn new(scheme: DistributionScheme) -> Self {
        Self {
            schemes: vec![scheme],
        }
    }

    /// Add a scheme, replacing any existing scheme of the same kind
    pub fn with(mut self, scheme: DistributionScheme) -> Self {
        self.schemes.retain(|s| s.rank() != scheme.rank());
        self.schemes.push(scheme);
        self.schemes.sort_by_key(DistributionScheme::rank);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &DistributionScheme> {
        self.schemes.iter()
    }

    pub fn len(&self) -> usize {
        self.schemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }

    pub fn free_mint(&self) -> Option<&FreeMint> {
        self.iter().find_map(|s| match s {
            DistributionScheme::FreeMint(v) => Some(v),
            _ => None,
        })
    }

    pub fn preallocated(&self) -> Option<&Preallocated> {
        self.iter().find_map(|s| match s {
            DistributionScheme::Preallocated(v) => Some(v),
            _ => None,
        })
    }

    pub fn purchase(&self) -> Option<&PurchaseBurnSwap> {
        self.iter().find_map(|s| match s {
            DistributionScheme::Purchase(v) => Some(v),
            _ => None,
        })
    }

    pub fn nft_mint(&self) -> Option<&NftMint> {
        self.iter().find_map(|s| match s {
            DistributionScheme::NftMint(v) => Some(v),
            _ => None,
        })
    }
}

/// Error decoding a distribution record that offers no scheme
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("distribution_schemes must offer at least one scheme")]
pub struct EmptyDistributionSchemes;

#[derive(Serialize, Deserialize)]
struct WireDistributionSchemes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    free_mint: Option<FreeMint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preallocated: Option<Preallocated>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    purchase: Option<PurchaseBurnSwap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nft_mint: Option<NftMint>,
}

impl From<DistributionSchemes> for WireDistributionSchemes {
    fn from(value: DistributionSchemes) -> Self {
        let mut wire = WireDistributionSchemes {
            free_mint: None,
            preallocated: None,
            purchase: None,
            nft_mint: None,
        };
        for scheme in value.schemes {
            match scheme {
                DistributionScheme::FreeMint(v) => wire.free_mint = Some(v),
                DistributionScheme::Preallocated(v) => wire.preallocated = Some(v),
                DistributionScheme::Purchase(v) => wire.purchase = Some(v),
                DistributionScheme::NftMint(v) => wire.nft_mint = Some(v),
            }
        }
        wire
    }
}

impl TryFrom<WireDistributionSchemes> for DistributionSchemes {
    type Error = EmptyDistributionSchemes;

    fn try_from(wire: WireDistributionSchemes) -> Result<Self, Self::Error> {
        let schemes: Vec<DistributionScheme> = [
            wire.free_mint.map(DistributionScheme::FreeMint),
            wire.preallocated.map(DistributionScheme::Preallocated),
            wire.purchase.map(DistributionScheme::Purchase),
            wire.nft_mint.map(DistributionScheme::NftMint),
        ]
        .into_iter()
        .flatten()
        .collect();

        if schemes.is_empty() {
            return Err(EmptyDistributionSchemes);
        }
        Ok(Self { schemes })
    }
}

/// Asset contract: descriptor plus the schemes it is distributed through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetContract {
    pub asset: AssetDescriptor,
    pub distribution_schemes: DistributionSchemes,
}
