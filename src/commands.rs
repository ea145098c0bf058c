//! # CLI Commands for `glittr`
//!
//! Defines the `clap` command structure. Every submitting command shares
//! [`SubmitArgs`]; global flags override values from the config file.

use clap::{Args, Parser, Subcommand};
use glittr::{BlockTxTuple, U128};
use std::path::PathBuf;

/// Glittr is a command-line tool for issuing and moving Glittr assets
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct GlittrCommands {
    /// Path to a JSON config file (defaults to ~/.glittr/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Named endpoint set (devnet, regtest)
    #[arg(long, global = true)]
    pub preset: Option<String>,
    /// Esplora API URL
    #[arg(long, global = true)]
    pub esplora_url: Option<String>,
    /// Glittr API URL
    #[arg(long, global = true)]
    pub glittr_url: Option<String>,
    /// WIF private key used to fund and sign transactions
    #[arg(long, global = true, env = "GLITTR_WIF", hide_env_values = true)]
    pub wif: Option<String>,
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Print the P2PKH address of the key
    Address,
    /// Print the OP_RETURN script hex for a message
    Encode {
        /// JSON file holding the message
        message: PathBuf,
    },
    /// Print the message carried by an OP_RETURN script
    Decode {
        /// Script hex
        script: String,
    },
    /// Create a free-mint asset contract
    FreeMint {
        #[command(flatten)]
        asset: FreeMintArgs,
        #[command(flatten)]
        submit: SubmitArgs,
    },
    /// Mint from a contract
    Mint {
        /// Contract id as block:tx
        #[arg(long)]
        contract: BlockTxTuple,
        /// Output receiving the minted amount
        #[arg(long, default_value_t = 1)]
        pointer: u32,
        #[command(flatten)]
        submit: SubmitArgs,
    },
    /// Transfer an asset to an output
    Transfer {
        /// Asset id as block:tx
        #[arg(long)]
        asset: BlockTxTuple,
        /// Output receiving the amount
        #[arg(long)]
        output: u32,
        #[arg(long)]
        amount: U128,
        #[command(flatten)]
        submit: SubmitArgs,
    },
    /// Submit a message read from a JSON file
    Submit {
        /// JSON file holding the message
        message: PathBuf,
        #[command(flatten)]
        submit: SubmitArgs,
    },
    /// Create a free-mint contract, wait for it to be indexed, then mint from it
    Issue {
        #[command(flatten)]
        asset: FreeMintArgs,
        /// Output receiving the minted amount
        #[arg(long, default_value_t = 1)]
        pointer: u32,
        #[command(flatten)]
        submit: SubmitArgs,
    },
}

/// Free-mint contract parameters
#[derive(Args, Debug, Clone)]
pub struct FreeMintArgs {
    /// Amount minted per mint call
    #[arg(long)]
    pub amount_per_mint: U128,
    /// Total supply cap (unlimited when omitted)
    #[arg(long)]
    pub supply_cap: Option<U128>,
    #[arg(long, default_value_t = 18)]
    pub divisibility: u8,
    /// Block height at which minting opens
    #[arg(long, default_value_t = 0)]
    pub live_time: u64,
}

/// Options shared by submitting commands
#[derive(Args, Debug, Clone)]
pub struct SubmitArgs {
    /// Receiver of the change output (defaults to the key's own address)
    #[arg(long)]
    pub destination: Option<String>,
}
