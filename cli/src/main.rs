// dropvault — encrypted file-upload server
//
// Binds a TCP listener and serves the registration / key-exchange /
// chunked-upload protocol, one task per connection.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use dropvault_core::{server, ServerConfig, SledAccountStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dropvault")]
#[command(about = "Authenticated, encrypted file-upload server", long_about = None)]
#[command(version)]
struct Cli {
    /// Listen address, e.g. 0.0.0.0:1234 (overrides config)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Upload storage root (overrides config)
    #[arg(short, long)]
    root: Option<std::path::PathBuf>,

    /// Account database path (overrides config)
    #[arg(short, long)]
    database: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("Failed to load configuration")?;

    let bind_addr = match cli.listen {
        Some(addr) => addr,
        None => config
            .listen_addr
            .parse()
            .context("Invalid listen address in config")?,
    };
    let storage_root = match cli.root {
        Some(root) => root,
        None => config.resolve_storage_root()?,
    };
    let database_path = match cli.database {
        Some(path) => path,
        None => config.resolve_database_path()?,
    };

    std::fs::create_dir_all(&storage_root).context("Failed to create storage root")?;
    let store = SledAccountStore::open(&database_path)
        .with_context(|| format!("Failed to open account database at {}", database_path.display()))?;

    server::run(
        ServerConfig {
            bind_addr,
            storage_root,
        },
        Arc::new(store),
    )
    .await
    .context("Server terminated")?;
    Ok(())
}
