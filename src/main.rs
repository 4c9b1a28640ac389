use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use medicalbot::bootstrap;
use medicalbot::config::{Config, Credentials};
use medicalbot::server::{self, AppState, ChatServer};
use tracing_subscriber::EnvFilter;

/// Retrieval-augmented medical chatbot server.
#[derive(Parser, Debug)]
#[command(name = "medicalbot", version, about, long_about = None)]
struct Cli {
    /// JSON settings file (defaults are used if it does not exist)
    #[arg(short, long, default_value = "medicalbot.json")]
    config: PathBuf,

    /// Address to bind, overrides the settings file
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, overrides the settings file
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // 1. Credentials first: nothing else is worth doing without them
    let creds = Credentials::from_env().context("missing credentials")?;

    // 2. Settings
    let mut config = Config::load(&cli.config)?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    config.validate().context("invalid configuration")?;

    // 3. Pipeline
    tracing::info!("Starting medicalbot...");
    let chain = bootstrap::assemble(&config, &creds).await?;
    let chat_page = server::load_chat_page(config.template_dir.as_deref().map(std::path::Path::new))?;

    // 4. Serve
    let state = AppState::new(Arc::new(chain), chat_page);
    ChatServer::new(state).start(&config.bind_addr()).await
}
