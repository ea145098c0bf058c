//! Scalar wire types shared by Glittr messages

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Block height
pub type BlockHeight = u64;

/// Negative values are relative to the block the contract is created in
pub type RelativeOrAbsoluteBlockHeight = i64;

/// Compressed public key bytes
pub type Pubkey = Vec<u8>;

/// Bitcoin address in its string form
pub type BitcoinAddress = String;

/// Fraction expressed as `(numerator, denominator)`
pub type Ratio = (U128, U128);

/// Unsigned 128-bit quantity
///
/// Carried on the wire as a decimal string so that values above 2^53 survive
/// JSON consumers that only have double precision numbers. Integer input is
/// accepted when decoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct U128(pub u128);

impl U128 {
    pub fn value(&self) -> u128 {
        self.0
    }
}

impl From<u128> for U128 {
    fn from(value: u128) -> Self {
        U128(value)
    }
}

impl From<u64> for U128 {
    fn from(value: u64) -> Self {
        U128(u128::from(value))
    }
}

impl fmt::Display for U128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for U128 {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u128>().map(U128)
    }
}

impl Serialize for U128 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

struct U128Visitor;

impl<'de> Visitor<'de> for U128Visitor {
    type Value = U128;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an unsigned 128-bit integer or its decimal string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<U128, E> {
        v.parse::<U128>()
            .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<U128, E> {
        Ok(U128::from(v))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<U128, E> {
        Ok(U128(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<U128, E> {
        u64::try_from(v)
            .map(U128::from)
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
    }
}

impl<'de> Deserialize<'de> for U128 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(U128Visitor)
    }
}

/// Durable identifier of a confirmed contract: `(block height, tx index in block)`
///
/// Encoded as `[block, tx]` inside messages and as `"block:tx"` by the indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockTxTuple(pub BlockHeight, pub u32);

impl BlockTxTuple {
    pub fn block(&self) -> BlockHeight {
        self.0
    }

    pub fn tx(&self) -> u32 {
        self.1
    }
}

impl fmt::Display for BlockTxTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0, self.1)
    }
}

/// Error parsing a `"block:tx"` string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid block_tx '{0}', expected <block>:<tx>")]
pub struct ParseBlockTxError(pub String);

impl FromStr for BlockTxTuple {
    type Err = ParseBlockTxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseBlockTxError(s.to_string());
        let (block, tx) = s.trim().split_once(':').ok_or_else(err)?;
        let block = block.parse::<BlockHeight>().map_err(|_| err())?;
        let tx = tx.parse::<u32>().map_err(|_| err())?;
        Ok(BlockTxTuple(block, tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_u128_serializes_as_string() {
        let value = U128(340282366920938463463374607431768211455);
        assert_eq!(
            serde_json::to_value(value).unwrap(),
            json!("340282366920938463463374607431768211455")
        );
    }

    #[test]
    fn test_u128_accepts_string_and_number() {
        let from_str: U128 = serde_json::from_value(json!("2000")).unwrap();
        let from_num: U128 = serde_json::from_value(json!(2000)).unwrap();
        assert_eq!(from_str, U128(2000));
        assert_eq!(from_num, U128(2000));
        assert!(serde_json::from_value::<U128>(json!(-1)).is_err());
        assert!(serde_json::from_value::<U128>(json!("12abc")).is_err());
    }

    #[test]
    fn test_block_tx_wire_forms() {
        let block_tx: BlockTxTuple = "100:2".parse().unwrap();
        assert_eq!(block_tx, BlockTxTuple(100, 2));
        assert_eq!((block_tx.block(), block_tx.tx()), (100, 2));
        assert_eq!(block_tx.to_string(), "100:2");
        assert_eq!(serde_json::to_value(block_tx).unwrap(), json!([100, 2]));
    }

    #[test]
    fn test_block_tx_rejects_malformed() {
        assert!("100".parse::<BlockTxTuple>().is_err());
        assert!("a:2".parse::<BlockTxTuple>().is_err());
        assert!("100:".parse::<BlockTxTuple>().is_err());
        assert!("100:2:3".parse::<BlockTxTuple>().is_err());
    }
}
