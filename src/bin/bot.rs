//! Misery Bot Binary
//!
//! Connects to the gateway and serves commands until shut down.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use misery::config::{self, StoreBackend};
use misery::network::{Exit, GatewayClient};
use misery::{Bot, Config, Services};
use tracing_subscriber::{fmt, EnvFilter};

/// Misery Bot
#[derive(Parser, Debug)]
#[command(name = "misery-bot")]
#[command(about = "Chat bot backed by a partitioned document store and a cache")]
#[command(version)]
struct Args {
    /// Gateway address (host:port); overrides MISERYBOT_GATEWAY
    #[arg(short, long)]
    gateway: Option<String>,

    /// Document store backend (memory or file)
    #[arg(short, long, default_value = "file")]
    store: String,

    /// Data directory for the file store
    #[arg(short, long, default_value = "./misery_data")]
    data_dir: PathBuf,

    /// Chunk ceiling in bytes for striping large values
    #[arg(short, long, default_value_t = misery::partition::DEFAULT_PARTITION_LIMIT)]
    partition_limit: usize,

    /// Extra authorized identity (repeatable), added to MISERYBOT_OWNERS
    #[arg(short, long = "owner")]
    owners: Vec<u64>,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,misery=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("Misery Bot v{}", misery::VERSION);

    let config = match build_config(args) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    tracing::info!("Gateway address: {}", config.gateway_addr);
    tracing::info!("Authorized identities: {:?}", config.authorized_ids);

    let services = match Services::init(&config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to start services: {}", e);
            std::process::exit(1);
        }
    };

    // Ctrl+C / SIGTERM raise the same flag as the shutdown command
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Received termination signal, initiating shutdown...");
        shutdown_flag.store(true, Ordering::SeqCst);
    }) {
        tracing::warn!("Could not install signal handler: {}", e);
    }

    let client = match GatewayClient::connect(&config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to connect to gateway: {}", e);
            services.shutdown();
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config, services.clone(), shutdown);
    let code = match client.run(&bot) {
        Ok(Exit::Shutdown) => 0,
        Ok(Exit::GatewayClosed) => 0,
        Err(e) => {
            tracing::error!("Gateway session failed: {}", e);
            1
        }
    };

    drop(bot);
    services.shutdown();
    tracing::info!("Bot stopped");
    std::process::exit(code);
}

fn build_config(args: Args) -> misery::Result<Config> {
    let mut config = Config::from_env()?;
    if let Some(gateway) = args.gateway {
        config.gateway_addr = gateway;
    }
    config.store_backend = args.store.parse::<StoreBackend>()?;
    config.data_dir = args.data_dir;
    config.partition_limit = args.partition_limit;
    config.authorized_ids.extend(args.owners);
    config.validate()?;

    if config.authorized_ids.is_empty() {
        tracing::warn!(
            "No authorized identities ({} unset); shutdown command disabled",
            config::ENV_OWNERS
        );
    }
    Ok(config)
}
