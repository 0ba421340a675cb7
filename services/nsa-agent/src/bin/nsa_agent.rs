//! NSA agent process binary: loads configuration, wires an [`NsaAgent`],
//! runs startup recovery and the topology fetcher, then waits for a
//! shutdown signal.
//!
//! The northbound listening socket (`host`/`port`/`tls` in config) is
//! where a concrete SOAP/HTTP transport would dispatch incoming
//! requests into `agent.entry_point`; that transport is out of scope
//! for this core (spec §1), so this binary does not bind one — it
//! exists to prove the wiring runs end to end (recovery, scheduling,
//! topology polling) the way a real deployment's supervisor would host
//! it behind a transport layer.

use anyhow::{Context, Result};
use nsa_agent::NsaAgent;
use nsa_config::AgentConfig;
use std::path::PathBuf;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::var("NSA_CONFIG_FILE").ok().map(PathBuf::from);
    let config = AgentConfig::load(config_path.as_deref()).context("failed to load agent configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(network_name = %config.network_name, nsa_urn = %config.nsa_urn(), "starting NSA agent");

    let agent = NsaAgent::bootstrap(config).await.context("failed to bootstrap agent")?;
    agent.clone().run().await.context("failed to run startup recovery")?;

    info!("NSA agent running, press Ctrl+C to stop");
    signal::ctrl_c().await.context("failed to listen for shutdown signal")?;

    info!("shutdown signal received");
    agent.shutdown();

    info!("NSA agent stopped");
    Ok(())
}
