//! Strictly Avalon - CLI entry point.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use std::path::PathBuf;
use std::sync::Arc;
use strictly_avalon::{
    AppState, AvalonConfig, DecisionGateway, LlmClient, LlmGateway, RandomGateway,
    SessionManager, router,
};
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Http {
            port,
            host,
            config,
            offline,
        } => run_http_server(host, port, config, offline).await,
    }
}

/// Run the HTTP game server
#[instrument]
async fn run_http_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<PathBuf>,
    offline: bool,
) -> Result<()> {
    let config = match &config_path {
        Some(path) => AvalonConfig::from_file(path)?,
        None => AvalonConfig::default(),
    }
    .with_listener(host, port);

    let gateway: Arc<dyn DecisionGateway> = if offline {
        info!("Offline mode, automated seats play at random");
        match config.seed() {
            Some(seed) => Arc::new(RandomGateway::seeded(*seed)),
            None => Arc::new(RandomGateway::new()),
        }
    } else {
        let llm = config.create_llm_config()?;
        info!(provider = %llm.provider(), model = %llm.model(), "Using language model gateway");
        Arc::new(LlmGateway::new(LlmClient::new(llm)))
    };

    let sessions = SessionManager::new(config.fallback_policy(), *config.seed())
        .with_retention(config.session_retention());
    let app = router(AppState::new(sessions, gateway));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(address = %address, "Server ready at http://{}/", address);

    axum::serve(listener, app).await?;
    Ok(())
}
