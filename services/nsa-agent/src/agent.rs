//! Wires one agent's worth of components together: Topology, Provider
//! Registry, Local Backend, Aggregator and Fetcher sharing one
//! [`ConnectionStore`] and configuration. The northbound request/reply
//! transport (SOAP/XML, HTTP, TLS — spec §1) is out of scope; this
//! struct's `entry_point` is the `NsaProvider` a concrete transport
//! layer dispatches incoming requests into.

use crate::peers::DudPeerProviderFactory;
use crate::topology_source::FileTopologyDocumentSource;
use async_trait::async_trait;
use nsa_aggregator::Aggregator;
use nsa_backend::{ConnectionManager, DudConnectionManager, LocalBackend};
use nsa_calendar::ReservationCalendar;
use nsa_config::AgentConfig;
use nsa_fetcher::{DudTopologyDocumentParser, Fetcher, TopologyDocumentParser};
use nsa_persistence::{ConnectionStore, InMemoryStore};
use nsa_protocol::{Header, NsaProvider, NsaRequester};
use nsa_registry::ProviderRegistry;
use nsa_scheduler::CallScheduler;
use nsa_topology::Topology;
use nsa_types::{Network, NsaError};
use std::sync::Arc;
use std::time::Duration;

/// Receives notifications the Aggregator has nobody else to hand them
/// to: the agent's own requests (a local operator tool, a northbound
/// transport's reply channel, ...). Logs at `info!` rather than
/// dropping them silently, since delivering them onward is a transport
/// concern out of this core's scope (spec §1).
struct LoggingRequester;

#[async_trait]
impl NsaRequester for LoggingRequester {
    async fn notify(&self, header: Header, notification: nsa_protocol::notification::Notification) {
        tracing::info!(
            correlation_id = %header.correlation_id,
            connection_id = ?notification.connection_id(),
            notification = ?notification,
            "northbound notification (no transport configured to deliver it further)"
        );
    }
}

/// Picks the [`ConnectionManager`] named by `config.backend.manager_type`.
/// Hardware command dispatch is out of scope (spec §1); `"dud"` is the
/// only manager this crate ships, and a concrete deployment registers
/// its own by extending this match or constructing [`NsaAgent`] pieces
/// directly instead of through [`NsaAgent::bootstrap`].
fn build_connection_manager(config: &nsa_config::BackendConfig) -> Result<Arc<dyn ConnectionManager>, NsaError> {
    match config.manager_type.as_str() {
        "dud" => {
            let swap_types = config
                .settings
                .get("swap_label_types")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or_default();
            Ok(Arc::new(DudConnectionManager::with_swap(swap_types)))
        }
        other => Err(NsaError::Internal(format!(
            "unknown backend type {other:?}: wire a ConnectionManager implementation for it"
        ))),
    }
}

pub struct NsaAgent {
    pub config: AgentConfig,
    pub topology: Arc<Topology>,
    pub registry: Arc<ProviderRegistry>,
    pub store: Arc<dyn ConnectionStore>,
    pub backend: Arc<LocalBackend>,
    pub entry_point: Arc<Aggregator>,
    pub fetcher: Arc<Fetcher>,
    scheduler: Arc<CallScheduler>,
}

impl NsaAgent {
    /// Builds every component per spec §4.5-§4.9 wiring and returns them
    /// unstarted: no recovery sweep, no fetcher poll loop yet. Callers
    /// that want the defaults (in-memory store, dud connection manager,
    /// no peer transport) use this; a deployment needing a real
    /// database or hardware backend constructs the pieces directly and
    /// assembles its own `NsaAgent`.
    pub async fn bootstrap(config: AgentConfig) -> Result<Arc<Self>, NsaError> {
        let local_nsa_urn = config.nsa_urn();

        let local_networks = load_local_networks(&config).await?;
        let topology = Arc::new(Topology::from_networks(local_networks.clone()));

        let registry = Arc::new(ProviderRegistry::new(Arc::new(DudPeerProviderFactory)));

        let store: Arc<dyn ConnectionStore> = Arc::new(InMemoryStore::new());

        let entry_point = Arc::new(Aggregator::new(
            local_nsa_urn.clone(),
            registry.clone(),
            topology.clone(),
            store.clone(),
            Arc::new(LoggingRequester) as Arc<dyn NsaRequester>,
            Duration::from_secs(10),
        ));

        let connection_manager = build_connection_manager(&config.backend)?;
        let calendar = ReservationCalendar::new_shared();
        let scheduler = Arc::new(CallScheduler::new());

        let backend = LocalBackend::new(
            local_nsa_urn.clone(),
            connection_manager,
            calendar,
            scheduler.clone(),
            store.clone(),
            entry_point.clone() as Arc<dyn NsaRequester>,
            chrono::Duration::seconds(config.reserve_hold_timeout_secs as i64),
        );
        registry.register_local(local_nsa_urn, backend.clone() as Arc<dyn NsaProvider>).await;

        let fetcher = Fetcher::new(
            topology.clone(),
            Arc::new(nsa_fetcher::DudTopologyDocumentSource),
            Arc::new(DudTopologyDocumentParser) as Arc<dyn TopologyDocumentParser>,
            config.peers.clone(),
            Duration::from_secs(config.fetcher_poll_interval_secs),
            local_networks,
        );

        Ok(Arc::new(NsaAgent {
            config,
            topology,
            registry,
            store,
            backend,
            entry_point,
            fetcher,
            scheduler,
        }))
    }

    /// Runs the startup recovery sweep (spec §4.5, §4.6 scenario 6) and
    /// an initial topology poll before spawning the Fetcher's background
    /// loop, then returns — the caller awaits its own shutdown signal.
    pub async fn run(self: Arc<Self>) -> Result<(), NsaError> {
        self.fetcher.poll_all().await;
        self.backend.clone().recover().await?;

        let fetcher = self.fetcher.clone();
        tokio::spawn(async move {
            fetcher.run().await;
        });

        Ok(())
    }

    /// Cancels every pending scheduler call (spec §5: "on service stop,
    /// cancel all scheduler calls ... then stop accepting new
    /// requests"). The background fetcher task and any in-flight
    /// downstream calls are left to the process's own shutdown, since
    /// cancelling them here would just race whatever drop glue the
    /// runtime itself applies on exit.
    pub fn shutdown(&self) {
        tracing::info!("shutting down: cancelling all pending scheduler calls");
        self.scheduler.cancel_all();
    }
}

/// Loads the agent's own NRM map (spec §6 `nrm_map_file`) through the
/// same pluggable source/parser seam the Fetcher uses for peers (the
/// document format is out of scope either way, spec §1). With the
/// default dud parser this yields an empty network list and the agent
/// logs a warning rather than failing to start — a deployment that
/// wants real topology wires a concrete `TopologyDocumentParser` in.
async fn load_local_networks(config: &AgentConfig) -> Result<Vec<Network>, NsaError> {
    let source = FileTopologyDocumentSource { path: config.nrm_map_file.clone() };
    let parser = DudTopologyDocumentParser;

    let networks = match source.fetch_document().await {
        Ok(document) => parser.parse(&document)?,
        Err(e) => {
            tracing::warn!(
                nrm_map_file = %config.nrm_map_file.display(),
                error = %e,
                "could not read NRM map file, starting with no local networks"
            );
            Vec::new()
        }
    };

    if networks.is_empty() {
        tracing::warn!(
            nrm_map_file = %config.nrm_map_file.display(),
            "no networks parsed from the configured NRM map (dud parser): wire a concrete TopologyDocumentParser for this document format"
        );
    } else {
        tracing::info!(network_count = networks.len(), "loaded local networks from NRM map");
    }

    Ok(networks)
}

impl FileTopologyDocumentSource {
    async fn fetch_document(&self) -> Result<Vec<u8>, NsaError> {
        use nsa_fetcher::TopologyDocumentSource;
        self.fetch("local").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn test_config(nrm_map_file: std::path::PathBuf) -> AgentConfig {
        AgentConfig {
            host: "0.0.0.0".to_string(),
            port: 9080,
            tls: false,
            network_name: "example".to_string(),
            nrm_map_file,
            database: "memory".to_string(),
            database_user: None,
            database_password: None,
            peers: Vec::new(),
            backend: nsa_config::BackendConfig {
                manager_type: "dud".to_string(),
                settings: HashMap::new(),
            },
            log_file: std::path::PathBuf::from("./nsa-agent.log"),
            log_level: "info".to_string(),
            fetcher_poll_interval_secs: 300,
            reserve_hold_timeout_secs: 600,
        }
    }

    #[tokio::test]
    async fn bootstraps_and_registers_the_local_backend() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"unused-nrm-map-bytes").unwrap();
        let config = test_config(file.path().to_path_buf());

        let agent = NsaAgent::bootstrap(config).await.unwrap();

        let handle = agent.registry.resolve("urn:ogf:network:example:nsa").await.unwrap();
        let header = Header::new("urn:ogf:network:requester:nsa", "urn:ogf:network:example:nsa", "http://requester/reply");
        assert!(handle
            .query_summary_sync(header, vec!["nonexistent".to_string()])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn run_performs_recovery_and_an_initial_topology_poll_without_panicking() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"unused-nrm-map-bytes").unwrap();
        let config = test_config(file.path().to_path_buf());

        let agent = NsaAgent::bootstrap(config).await.unwrap();
        agent.clone().run().await.unwrap();

        agent.shutdown();
    }

    #[tokio::test]
    async fn missing_nrm_map_file_does_not_fail_bootstrap() {
        let config = test_config(std::path::PathBuf::from("/nonexistent/nrm-map.xml"));

        let agent = NsaAgent::bootstrap(config).await.unwrap();
        assert!(agent.topology.get_network("aruba").is_err());
    }

    #[tokio::test]
    async fn unknown_backend_type_fails_bootstrap() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"unused").unwrap();
        let mut config = test_config(file.path().to_path_buf());
        config.backend.manager_type = "hardware-magic".to_string();

        assert!(NsaAgent::bootstrap(config).await.is_err());
    }
}
