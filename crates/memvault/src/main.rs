//! Memvault daemon - encrypted semantic memory over HTTP

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use memvault_server::api::ApiServer;
use memvault_server::config::Config;
use memvault_server::crypto::VaultKey;
use memvault_server::error::Result;
use memvault_server::service::MemoryService;

/// Memvault - encrypted semantic memory daemon
#[derive(Parser)]
#[command(name = "memvault")]
#[command(about = "Encrypted semantic memory daemon with vector search")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the daemon (default command)
    #[command(name = "serve")]
    Serve,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => serve(cli.config).await,
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,memvault=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    if let Some(path) = config_path {
        tracing::info!("Loading config from: {}", path.display());
        return read_config(&path);
    }

    let default_paths = [
        dirs::home_dir().map(|h| h.join(".memvault").join("config.toml")),
        dirs::config_dir().map(|c| c.join("memvault").join("config.toml")),
        Some(PathBuf::from("config.toml")),
    ];

    for path in default_paths.iter().flatten() {
        if path.exists() {
            tracing::info!("Loading config from: {}", path.display());
            return read_config(path);
        }
    }

    tracing::info!("No config file found, using defaults");
    Ok(Config::default())
}

fn read_config(path: &std::path::Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        memvault_server::MemvaultError::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    toml::from_str(&content)
        .map_err(|e| memvault_server::MemvaultError::Config(format!("Failed to parse config: {e}")))
}

async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    tracing::info!("Starting Memvault daemon");

    let config = load_config(config_path)?;
    tracing::debug!("Config loaded: {:?}", config);

    let data_dir = &config.storage.data_dir;
    std::fs::create_dir_all(data_dir).map_err(|e| {
        memvault_server::MemvaultError::Config(format!(
            "Failed to create data directory {}: {}",
            data_dir.display(),
            e
        ))
    })?;

    let key = VaultKey::load_or_create(&config.storage.key_path())?;

    let vault_path = config.storage.vault_path();
    tracing::info!(
        "Opening vault at {} (dimension {})",
        vault_path.display(),
        config.index.embedding_dimension
    );

    let service =
        MemoryService::open(&vault_path, key, config.index.embedding_dimension).await?;
    let service = Arc::new(service);

    let api = ApiServer::new(config.api.clone(), service);
    api.serve().await?;

    tracing::info!("Memvault daemon stopped");
    Ok(())
}
