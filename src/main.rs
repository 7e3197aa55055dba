//! Treasure CLI - standalone server for the treasure hunt session

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use treasure::config::expand_path;
use treasure::handlers::InitOutcome;
use treasure::{Config, Core};

#[derive(Parser, Debug)]
#[command(name = "treasure")]
#[command(author = "Treasure Team")]
#[command(version)]
#[command(about = "Treasure - passcode-gated treasure hunt backend", long_about = None)]
struct Args {
    /// Path to configuration file (default: ~/.treasure/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override server host
    #[arg(long)]
    host: Option<String>,

    /// Override database connection string
    #[arg(long)]
    database_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Write a new config file with defaults
    #[arg(long)]
    init_config: bool,

    /// Create the session record and exit
    #[arg(long)]
    seed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // .env is optional
    dotenvy::dotenv().ok();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("treasure={},tower_http=debug", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = args
        .config
        .as_deref()
        .map(expand_path)
        .unwrap_or_else(Config::default_path);

    // Handle --init-config flag
    if args.init_config {
        if config_path.exists() {
            tracing::warn!("Config file already exists: {}", config_path.display());
            return Ok(());
        }
        Config::create_default(&config_path)?;
        tracing::info!("Created default config at: {}", config_path.display());
        return Ok(());
    }

    // Load configuration
    let mut config = if config_path.exists() {
        Config::from_file(&config_path)?
    } else {
        tracing::warn!(
            "Config file not found at {}, using defaults",
            config_path.display()
        );
        Config::default()
    };
    config.apply_env_overrides()?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = Some(host);
    }
    if let Some(url) = args.database_url {
        config.database.url = url;
    }

    let core = Core::new(config);

    if args.seed {
        match core.seed().await? {
            InitOutcome::Created => tracing::info!("Session record created"),
            InitOutcome::AlreadyExists => tracing::info!("Session record already exists"),
        }
        core.shutdown().await;
        return Ok(());
    }

    // Start API server (blocks until shutdown)
    core.start_api_server().await?;

    Ok(())
}
