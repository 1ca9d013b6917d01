//! Minecraft Server Finder - CLI Entry Point
//!
//! Loads the configuration (file, then environment, then flags) and serves
//! the JSON-RPC tool endpoint until Ctrl-C.

// Use mimalloc as global allocator for better p99 latency
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::Parser;
use mc_server_finder::{Config, Service, VERSION};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "mc-server-finder")]
#[command(version = VERSION)]
#[command(about = "Minecraft server status checker with alternative-server suggestions")]
struct Args {
    /// Path to configuration file
    #[arg(short = 'c', short_alias = 'f', long = "config", default_value = "config.yaml")]
    config: PathBuf,

    /// Listen address (overrides config and LISTEN_ADDR)
    #[arg(long = "listen")]
    listen: Option<String>,

    /// Bearer secret (overrides config and AUTH_TOKEN)
    #[arg(long = "secret")]
    secret: Option<String>,

    /// Test configuration and exit
    #[arg(short = 't', long = "test")]
    test: bool,
}

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get().max(2))
        .max_blocking_threads(32)
        .enable_all()
        .thread_name("finder-worker")
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    let args = Args::parse();

    let loaded = load_config(&args);

    let level = loaded
        .as_ref()
        .ok()
        .and_then(|c| c.log_level.clone())
        .unwrap_or_else(|| "info".to_string());

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("mc_server_finder={}", level).parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    info!("Minecraft Server Finder v{}", VERSION);
    info!("Loading configuration from: {}", args.config.display());

    let config = match loaded {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Test mode
    if args.test {
        info!("Configuration test passed");
        return Ok(());
    }

    let service = match Service::new(&config) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to initialize service: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = service.run().await {
        error!("Service error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// File and environment, then CLI overrides, then validation
fn load_config(args: &Args) -> mc_server_finder::Result<Config> {
    let mut config = Config::read(args.config.to_str().unwrap_or("config.yaml"))?;

    if let Some(listen) = &args.listen {
        config.listen = listen.clone();
    }
    if let Some(secret) = &args.secret {
        config.auth_token = Some(secret.clone());
    }

    config.validate()?;
    Ok(config)
}
