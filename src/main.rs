//! Flux node start relay.
//!
//! ```text
//!   GET /api/start/{txid}/{index}[/{profile}]
//!        │
//!        ▼
//!   ┌──────────┐   ┌────────────┐   ┌──────────┐   ┌─────────┐   ┌───────────┐
//!   │   http   │──▶│ collateral │──▶│ profiles │──▶│ signing │──▶│ broadcast │
//!   │ adapter  │   │ validator  │   │ resolve  │   │         │   │           │
//!   └──────────┘   └─────┬──────┘   └──────────┘   └─────────┘   └─────┬─────┘
//!                        │                                             │
//!                        ▼                                             ▼
//!                  explorer API  ◀──── resilient client ────▶     daemon API
//!                                 (cache, retry, breaker)
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use fluxnode_starter::blockchain::encoding::decode_hex;
use fluxnode_starter::config::load_config;
use fluxnode_starter::observability::{logging, metrics};
use fluxnode_starter::profiles::check_redeem_scripts;
use fluxnode_starter::{HttpServer, Orchestrator};

#[derive(Parser, Debug)]
#[command(name = "fluxnode-starter", version, about = "Flux node start relay")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "STARTER_CONFIG", default_value = "config/starter.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {}", args.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        "fluxnode-starter starting"
    );

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: fluxnode_starter::StarterConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let orchestrator = Orchestrator::from_config(&config)?;

    let version = decode_hex(&config.network.p2sh_version_hex)?;
    if let &[high, low] = version.as_slice() {
        check_redeem_scripts(orchestrator.profiles().iter(), [high, low]);
    }

    tracing::info!(
        profiles = orchestrator.profiles().len(),
        default_profile = %orchestrator.profiles().default_profile().name(),
        explorer = %config.explorer.base_url,
        daemon = %config.daemon.base_url,
        max_retries = config.http.max_retries,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let server = HttpServer::new(&config, Arc::new(orchestrator));
    server.run(listener).await?;
    Ok(())
}
