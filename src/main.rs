//! GLITTR CLI - A thin wrapper around the glittr library
//!
//! Parses command-line arguments, loads configuration and delegates the
//! actual work to the library's submission pipeline.

use anyhow::{anyhow, Context, Result};
use bitcoin::{Address, ScriptBuf};
use clap::Parser;
use glittr::message::{FreeMintContractParams, MintContractCallParams, SimpleAsset, TransferParams, TxTypeTransfer};
use glittr::network::explorer_tx_url;
use glittr::{
    decode_message, encode_message, CancellationFlag, EsploraClient, GlittrApiClient,
    GlittrConfig, GlittrError, NetworkPreset, OpReturnMessage, Secp256k1Verifier, Signer,
    SubmissionPipeline, SubmissionReceipt, SubmissionRequest, SubmissionState, TxBuilder,
};
use log::info;
use std::fs;
use std::path::Path;
use std::str::FromStr;

mod commands;
use commands::{Commands, FreeMintArgs, GlittrCommands, SubmitArgs};

type Pipeline = SubmissionPipeline<EsploraClient, GlittrApiClient, Secp256k1Verifier>;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = GlittrCommands::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level.as_str()))
        .init();

    if let Err(e) = run(args).await {
        match e.downcast_ref::<GlittrError>() {
            Some(err) => eprintln!("❌ Failed during {}: {}", err.stage(), err),
            None => eprintln!("❌ Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

async fn run(args: GlittrCommands) -> Result<()> {
    let config = load_config(&args)?;

    match args.command {
        Commands::Encode { ref message } => {
            let message = read_message(message)?;
            let script = encode_message(&message)?;
            println!("{}", hex::encode(script.as_bytes()));
            Ok(())
        }
        Commands::Decode { ref script } => {
            let bytes = hex::decode(script.trim()).context("Script must be hex encoded")?;
            let message = decode_message(&ScriptBuf::from_bytes(bytes))?;
            println!("{}", serde_json::to_string_pretty(&message)?);
            Ok(())
        }
        Commands::Address => {
            let signer = signer(&args)?;
            println!("{}", signer.p2pkh_address(config.network));
            Ok(())
        }
        Commands::FreeMint { ref asset, ref submit } => {
            let signer = signer(&args)?;
            let message = free_mint_message(asset);
            Submitter::new(&config, &signer, submit)?.submit(&message).await?;
            Ok(())
        }
        Commands::Mint {
            contract,
            pointer,
            ref submit,
        } => {
            let signer = signer(&args)?;
            let message = TxBuilder::mint(MintContractCallParams {
                contract,
                pointer,
                oracle_message: None,
            });
            Submitter::new(&config, &signer, submit)?.submit(&message).await?;
            Ok(())
        }
        Commands::Transfer {
            asset,
            output,
            amount,
            ref submit,
        } => {
            let signer = signer(&args)?;
            let message = TxBuilder::transfer(TransferParams {
                transfers: vec![TxTypeTransfer {
                    asset,
                    output,
                    amount,
                }],
            });
            Submitter::new(&config, &signer, submit)?.submit(&message).await?;
            Ok(())
        }
        Commands::Submit {
            ref message,
            ref submit,
        } => {
            let signer = signer(&args)?;
            let message = read_message(message)?;
            Submitter::new(&config, &signer, submit)?.submit(&message).await?;
            Ok(())
        }
        Commands::Issue {
            ref asset,
            pointer,
            ref submit,
        } => {
            let signer = signer(&args)?;
            let submitter = Submitter::new(&config, &signer, submit)?;

            println!("🚀 Creating free-mint contract...");
            let created = submitter.submit(&free_mint_message(asset)).await?;

            println!("🚀 Minting from contract {}...", created.block_tx);
            let mint = TxBuilder::mint(MintContractCallParams {
                contract: created.block_tx,
                pointer,
                oracle_message: None,
            });
            submitter.submit(&mint).await?;
            Ok(())
        }
    }
}

fn load_config(args: &GlittrCommands) -> Result<GlittrConfig> {
    let mut config = GlittrConfig::load(args.config.as_deref())?;
    if let Some(preset) = &args.preset {
        config.apply_preset(&NetworkPreset::from_name(preset)?);
    }
    if let Some(url) = &args.esplora_url {
        config.esplora_url = url.clone();
    }
    if let Some(url) = &args.glittr_url {
        config.glittr_api_url = url.clone();
    }
    info!(
        "Using Esplora at {} and Glittr API at {}",
        config.esplora_url, config.glittr_api_url
    );
    Ok(config)
}

fn signer(args: &GlittrCommands) -> Result<Signer> {
    let wif = args
        .wif
        .as_deref()
        .ok_or_else(|| anyhow!("A private key is required: pass --wif or set GLITTR_WIF"))?;
    Ok(Signer::from_wif(wif)?)
}

fn read_message(path: &Path) -> Result<OpReturnMessage> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read message file {}", path.display()))?;
    let message = serde_json::from_str(&content).map_err(GlittrError::from)?;
    Ok(message)
}

fn free_mint_message(args: &FreeMintArgs) -> OpReturnMessage {
    TxBuilder::free_mint_contract_instantiate(FreeMintContractParams {
        simple_asset: SimpleAsset {
            supply_cap: args.supply_cap,
            divisibility: args.divisibility,
            live_time: args.live_time,
        },
        amount_per_mint: args.amount_per_mint,
    })
}

/// Pipeline plus the per-invocation request
struct Submitter<'a> {
    pipeline: Pipeline,
    request: SubmissionRequest<'a>,
    explorer_url: String,
}

impl<'a> Submitter<'a> {
    fn new(config: &GlittrConfig, signer: &'a Signer, args: &SubmitArgs) -> Result<Self> {
        let pipeline = SubmissionPipeline::new(
            EsploraClient::new(config.esplora_config())?,
            GlittrApiClient::new(config.glittr_api_config())?,
            Secp256k1Verifier::new(),
        )
        .with_fee(config.fee_sats)
        .with_min_utxo_value(config.min_utxo_value)
        .with_poll_policy(config.poll.to_poll_policy());

        let cancellation = CancellationFlag::new();
        let on_interrupt = cancellation.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_interrupt.cancel();
            }
        });

        let mut request =
            SubmissionRequest::new(signer, config.network).with_cancellation(cancellation);
        if let Some(destination) = &args.destination {
            let address = Address::from_str(destination)
                .with_context(|| format!("Invalid destination address {}", destination))?
                .require_network(config.network)
                .with_context(|| format!("Destination {} is for another network", destination))?;
            request = request.with_destination(address);
        }

        Ok(Self {
            pipeline,
            request,
            explorer_url: config.explorer_url.clone(),
        })
    }

    async fn submit(&self, message: &OpReturnMessage) -> Result<SubmissionReceipt> {
        println!("📍 Funding from {}", self.request.funding_address);

        let explorer_url = self.explorer_url.as_str();
        let receipt = self
            .pipeline
            .submit_observed(message, &self.request, |state, txid| match state {
                SubmissionState::Validated => println!("✅ Transaction {} validated", txid),
                SubmissionState::Broadcast => {
                    println!("🔗 {}", explorer_tx_url(explorer_url, txid));
                    println!("⏳ Waiting for the indexer...");
                }
                _ => {}
            })
            .await?;

        println!("✅ Indexed with block_tx {}", receipt.block_tx);
        Ok(receipt)
    }
}
