use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cert_anchor::anchor::rpc::JsonRpcNode;
use cert_anchor::anchor::Chain;
use cert_anchor::config::{node_url_from_env, IssuerConfig};
use cert_anchor::document::{signature_of, UnsignedDocument};
use cert_anchor::merkle::proof::verify_signature;
use cert_anchor::pipeline::issue_batch;

#[derive(Parser)]
#[command(name = "cert-anchor")]
#[command(about = "Anchor a batch of credentials on Ethereum with one transaction")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Anchor a batch and write the signed credentials
    Issue {
        /// JSON array of {"id", "content", "normalized"} documents
        #[arg(long)]
        batch: PathBuf,
        #[arg(long, default_value = "ethereum_ropsten")]
        chain: Chain,
        /// Base gas price in wei
        #[arg(long)]
        gas_price: Option<u128>,
        #[arg(long)]
        gas_limit: Option<u64>,
        #[arg(long)]
        max_attempts: Option<u32>,
        /// Node endpoint; defaults to ETH_NODE_URL_<NETWORK>
        #[arg(long)]
        node_url: Option<String>,
        /// Output file; stdout if omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Check a signed credential's proof against its merkle root
    Verify {
        #[arg(long)]
        document: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Issue {
            batch,
            chain,
            gas_price,
            gas_limit,
            max_attempts,
            node_url,
            out,
        } => {
            let text = std::fs::read_to_string(&batch)
                .with_context(|| format!("reading {}", batch.display()))?;
            let documents: Vec<UnsignedDocument> =
                serde_json::from_str(&text).context("parsing batch file")?;

            let mut config = IssuerConfig::from_env(chain)?;
            if let Some(gas_price) = gas_price {
                config.fees.gas_price = gas_price;
            }
            if let Some(gas_limit) = gas_limit {
                config.fees.gas_limit = gas_limit;
            }
            if let Some(max_attempts) = max_attempts {
                config.max_attempts = max_attempts;
            }
            config.validate()?;

            let url = match node_url {
                Some(url) => url,
                None => node_url_from_env(chain)?,
            };
            let node = JsonRpcNode::new(url);

            let issued = issue_batch(documents, &config, &node).await?;
            let output = serde_json::json!({
                "tx_id": issued.tx_id,
                "merkle_root": hex::encode(issued.merkle_root),
                "credentials": issued.credentials(),
            });
            let rendered = serde_json::to_string_pretty(&output)?;

            match out {
                Some(path) => std::fs::write(&path, rendered)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{rendered}"),
            }
        }
        Commands::Verify { document } => {
            let text = std::fs::read_to_string(&document)
                .with_context(|| format!("reading {}", document.display()))?;
            let credential: serde_json::Value = serde_json::from_str(&text)?;
            let signature = signature_of(&credential)?;

            if !verify_signature(&signature)? {
                bail!("proof does not lead to merkle root {}", signature.merkle_root);
            }
            for anchor in &signature.anchors {
                println!(
                    "proof ok: root {} anchored in {} on {}",
                    signature.merkle_root, anchor.source_id, anchor.chain
                );
            }
        }
    }

    Ok(())
}
