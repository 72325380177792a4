//! wikioffline-agent entry point.
//!
//! This is the main binary that hosts the offline agent and exposes its
//! triggers as MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;
use wikioffline_client::{FetchClient, FetchConfig};
use wikioffline_core::{Agent, AppConfig, CacheDb, UpdateCoordinator};

mod handler;
mod host;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(origin = %config.origin, cache = %config.cache_version(), "Starting wikioffline agent on stdio transport");

    let db = CacheDb::open(&config.db_path).await?;
    let fetcher = Arc::new(FetchClient::new(FetchConfig::from_app(&config)?)?);
    let notifier = Arc::new(host::HostNotifier::default());
    let agent = Arc::new(Agent::new(&config, db, fetcher, notifier.clone())?);

    let coordinator = UpdateCoordinator::new(agent.has_previous_controller().await?);
    let prompt = Arc::new(host::HostPrompt::new(config.auto_accept_updates));
    tokio::spawn(coordinator.run(agent.lifecycle().subscribe(), prompt.clone(), agent.clone()));

    let handler = handler::AgentServer::new(agent, notifier, prompt);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
