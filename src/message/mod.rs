//! Glittr metaprotocol messages
//!
//! This module handles:
//! - The `OpReturnMessage` tagged union (transfer, contract creation, contract call)
//! - Pure constructors for every supported operation (`TxBuilder`)
//!
//! Messages are plain data. Field names and the presence or absence of
//! optional fields are part of the wire contract, so constructors pass
//! optional values through untouched.

pub mod contract;
pub mod types;

use serde::{Deserialize, Serialize};

pub use contract::*;
pub use types::*;

/// Top level message embedded in a Glittr transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpReturnMessage {
    Transfer(Transfer),
    ContractCreation(ContractCreation),
    ContractCall(ContractCall),
}

impl OpReturnMessage {
    /// Short operation name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            OpReturnMessage::Transfer(_) => "transfer",
            OpReturnMessage::ContractCreation(_) => "contract_creation",
            OpReturnMessage::ContractCall(_) => "contract_call",
        }
    }
}

/// Asset movements between outputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub transfers: Vec<TxTypeTransfer>,
}

/// One asset movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxTypeTransfer {
    /// Contract that issued the asset
    pub asset: BlockTxTuple,
    /// Receiving output index
    pub output: u32,
    pub amount: U128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCreation {
    pub contract_type: ContractType,
}

/// Kinds of contract that can be created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractType {
    Asset(AssetContract),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    /// Contract being called, as assigned by the indexer
    pub contract: BlockTxTuple,
    pub call_type: CallType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    Mint(MintOption),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintOption {
    /// Output index receiving the minted amount
    pub pointer: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oracle_message: Option<OracleMessageSigned>,
}

/// Parameters for [`TxBuilder::transfer`]
#[derive(Debug, Clone)]
pub struct TransferParams {
    pub transfers: Vec<TxTypeTransfer>,
}

/// Parameters for [`TxBuilder::free_mint_contract_instantiate`]
#[derive(Debug, Clone)]
pub struct FreeMintContractParams {
    pub simple_asset: SimpleAsset,
    pub amount_per_mint: U128,
}

/// Parameters for [`TxBuilder::nft_mint_contract_instantiate`]
#[derive(Debug, Clone)]
pub struct NftMintContractParams {
    pub nft_asset: NftAsset,
    pub amount_per_mint: U128,
}

/// Parameters for [`TxBuilder::preallocated_contract_instantiate`]
#[derive(Debug, Clone)]
pub struct PreallocatedContractParams {
    pub simple_asset: SimpleAsset,
    pub preallocated: Preallocated,
    /// Remaining supply may additionally be offered as a free mint
    pub free_mint: Option<FreeMint>,
}

/// Parameters for [`TxBuilder::purchase_burn_swap_contract_instantiate`]
#[derive(Debug, Clone)]
pub struct PurchaseBurnContractParams {
    pub simple_asset: SimpleAsset,
    pub purchase_burn_swap: PurchaseBurnSwap,
}

/// Parameters for [`TxBuilder::mint`]
#[derive(Debug, Clone)]
pub struct MintContractCallParams {
    pub contract: BlockTxTuple,
    pub pointer: u32,
    pub oracle_message: Option<OracleMessageSigned>,
}

/// Pure constructors, one per operation kind
pub struct TxBuilder;

impl TxBuilder {
    pub fn transfer(params: TransferParams) -> OpReturnMessage {
        OpReturnMessage::Transfer(Transfer {
            transfers: params.transfers,
        })
    }

    /// Fungible asset anyone can mint; the asset's supply cap doubles as the mint cap
    pub fn free_mint_contract_instantiate(params: FreeMintContractParams) -> OpReturnMessage {
        let free_mint = FreeMint {
            supply_cap: params.simple_asset.supply_cap,
            amount_per_mint: params.amount_per_mint,
        };
        asset_contract(
            params.simple_asset.into(),
            DistributionSchemes::new(DistributionScheme::FreeMint(free_mint)),
        )
    }

    pub fn nft_mint_contract_instantiate(params: NftMintContractParams) -> OpReturnMessage {
        let nft_mint = NftMint {
            supply_cap: params.nft_asset.supply_cap,
            amount_per_mint: params.amount_per_mint,
            name: params.nft_asset.name.clone(),
            url: params.nft_asset.url.clone(),
            url_hash: params.nft_asset.url_hash.clone(),
        };
        asset_contract(
            params.nft_asset.into(),
            DistributionSchemes::new(DistributionScheme::NftMint(nft_mint)),
        )
    }

    pub fn preallocated_contract_instantiate(params: PreallocatedContractParams) -> OpReturnMessage {
        let mut schemes =
            DistributionSchemes::new(DistributionScheme::Preallocated(params.preallocated));
        if let Some(free_mint) = params.free_mint {
            schemes = schemes.with(DistributionScheme::FreeMint(free_mint));
        }
        asset_contract(params.simple_asset.into(), schemes)
    }

    pub fn purchase_burn_swap_contract_instantiate(
        params: PurchaseBurnContractParams,
    ) -> OpReturnMessage {
        asset_contract(
            params.simple_asset.into(),
            DistributionSchemes::new(DistributionScheme::Purchase(params.purchase_burn_swap)),
        )
    }

    pub fn mint(params: MintContractCallParams) -> OpReturnMessage {
        OpReturnMessage::ContractCall(ContractCall {
            contract: params.contract,
            call_type: CallType::Mint(MintOption {
                pointer: params.pointer,
                oracle_message: params.oracle_message,
            }),
        })
    }

    /// Identity constructor for messages assembled by hand
    pub fn build_message(message: OpReturnMessage) -> OpReturnMessage {
        message
    }
}

fn asset_contract(asset: AssetDescriptor, schemes: DistributionSchemes) -> OpReturnMessage {
    OpReturnMessage::ContractCreation(ContractCreation {
        contract_type: ContractType::Asset(AssetContract {
            asset,
            distribution_schemes: schemes,
        }),
    })
}
