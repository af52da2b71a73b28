use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use fluxnode_starter::blockchain::encoding::decode_hex;
use fluxnode_starter::blockchain::{compute_broadcast_txid, parse_start_transaction, MESSAGE_MAGIC};

#[derive(Parser)]
#[command(name = "starter-cli")]
#[command(about = "Operator CLI for the Flux node start relay", long_about = None)]
struct Cli {
    #[arg(short, long, env = "STARTER_URL", default_value = "http://localhost:9001")]
    url: String,

    /// Sent as X-API-Key when the relay requires one
    #[arg(long, env = "STARTER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check relay status, cache size and circuit breakers
    Status,
    /// List configured profiles (names and collateral addresses)
    Profiles,
    /// Start the node funded by a collateral output
    Start {
        txid: String,
        index: u32,
        /// Sign with this profile instead of scanning by address
        #[arg(short, long)]
        profile: Option<String>,
    },
    /// Decode a raw start transaction offline and print its broadcast id
    Txid { raw_hex: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = build_client(cli.api_key.as_deref())?;

    match cli.command {
        Commands::Status => {
            let res = client.get(endpoint(&cli.url, &["api", "status"])?).send().await?;
            print_response(res).await?;
        }
        Commands::Profiles => {
            let res = client.get(endpoint(&cli.url, &["api", "profiles"])?).send().await?;
            print_response(res).await?;
        }
        Commands::Start {
            txid,
            index,
            profile,
        } => {
            let index = index.to_string();
            let mut segments = vec!["api", "start", txid.as_str(), index.as_str()];
            if let Some(name) = profile.as_deref() {
                segments.push(name);
            }
            let res = client.get(endpoint(&cli.url, &segments)?).send().await?;
            print_response(res).await?;
        }
        Commands::Txid { raw_hex } => {
            let raw = decode_hex(raw_hex.trim())?;
            let parsed = parse_start_transaction(&raw)?;
            let summary = json!({
                "txid": compute_broadcast_txid(raw_hex.trim())?,
                "version": parsed.version,
                "type": parsed.record_type,
                "collateral": format!("{}:{}", parsed.collateral_txid, parsed.output_index),
                "collateralPublicKey": hex::encode(&parsed.collateral_public_key),
                "operatorPublicKey": hex::encode(&parsed.operator_public_key),
                "timestamp": parsed.timestamp,
                "signatureValid": parsed.verify_signature(&raw, MESSAGE_MAGIC)?,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

/// Base URL with percent-encoded path segments appended.
fn build_client(api_key: Option<&str>) -> Result<reqwest::Client, Box<dyn std::error::Error>> {
    let mut headers = reqwest::header::HeaderMap::new();
    if let Some(key) = api_key {
        let mut value = reqwest::header::HeaderValue::from_str(key)?;
        value.set_sensitive(true);
        headers.insert("x-api-key", value);
    }
    Ok(reqwest::Client::builder().default_headers(headers).build()?)
}

fn endpoint(base: &str, segments: &[&str]) -> Result<url::Url, Box<dyn std::error::Error>> {
    let mut url = url::Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| format!("{} cannot be used as a base URL", base))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let body = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|json| serde_json::to_string_pretty(&json).ok())
        .unwrap_or(text);

    if status.is_success() {
        println!("{}", body);
    } else {
        eprintln!("Error: relay returned status {}", status);
        eprintln!("{}", body);
    }
    Ok(())
}
