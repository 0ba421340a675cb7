//! Periodic topology/discovery pull (spec §4.9): for each configured
//! peer, at a fixed interval, retrieve a topology document, parse it
//! into Networks, and atomically fold the result into the topology
//! model. A failure against one peer is logged and retried on the next
//! tick; it never crashes the service or poisons the topology for other
//! peers (spec §4.9 step 4).
//!
//! Document retrieval and parsing are both out of scope as wire formats
//! (spec §1's Non-goals); this crate owns only the poll loop and the
//! merge-then-replace discipline, the same reconnect-and-retry shape as
//! `services/adapters/gas_price_collector`'s streaming loop.

use async_trait::async_trait;
use dashmap::DashMap;
use nsa_topology::Topology;
use nsa_types::{Network, NsaError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Retrieves the raw topology document a peer publishes. The transport
/// (HTTP, file, discovery service, ...) is pluggable and out of scope.
#[async_trait]
pub trait TopologyDocumentSource: Send + Sync {
    async fn fetch(&self, peer_url: &str) -> Result<Vec<u8>, NsaError>;
}

/// Parses a raw topology document into the Networks it describes. The
/// wire format is out of scope; only the resulting graph matters to the
/// rest of the core.
pub trait TopologyDocumentParser: Send + Sync {
    fn parse(&self, document: &[u8]) -> Result<Vec<Network>, NsaError>;
}

/// A source that never has anything to fetch, used where no peer
/// discovery transport is configured. Mirrors
/// `nsa_backend::DudConnectionManager`'s role for the Connection
/// Manager seam.
pub struct DudTopologyDocumentSource;

#[async_trait]
impl TopologyDocumentSource for DudTopologyDocumentSource {
    async fn fetch(&self, peer_url: &str) -> Result<Vec<u8>, NsaError> {
        Err(NsaError::Internal(format!("no topology document transport configured for {peer_url}")))
    }
}

/// A parser that never finds any networks in a document. Paired with
/// [`DudTopologyDocumentSource`] this lets an agent with no configured
/// peers run the Fetcher's poll loop harmlessly.
pub struct DudTopologyDocumentParser;

impl TopologyDocumentParser for DudTopologyDocumentParser {
    fn parse(&self, _document: &[u8]) -> Result<Vec<Network>, NsaError> {
        Ok(Vec::new())
    }
}

pub struct Fetcher {
    topology: Arc<Topology>,
    source: Arc<dyn TopologyDocumentSource>,
    parser: Arc<dyn TopologyDocumentParser>,
    peers: Vec<String>,
    poll_interval: Duration,
    /// Networks this agent manages itself; always present in the merged
    /// topology regardless of peer polling outcomes.
    local_networks: Vec<Network>,
    /// Last successfully parsed networks per peer, keyed by peer URL.
    /// Survives individual poll failures so one flaky peer never blanks
    /// out what is already known about it.
    last_known: DashMap<String, Vec<Network>>,
}

impl Fetcher {
    pub fn new(
        topology: Arc<Topology>,
        source: Arc<dyn TopologyDocumentSource>,
        parser: Arc<dyn TopologyDocumentParser>,
        peers: Vec<String>,
        poll_interval: Duration,
        local_networks: Vec<Network>,
    ) -> Arc<Self> {
        Arc::new(Fetcher {
            topology,
            source,
            parser,
            peers,
            poll_interval,
            local_networks,
            last_known: DashMap::new(),
        })
    }

    /// Runs the poll loop until the task is cancelled. The first tick
    /// fires after one full interval, not immediately; callers that want
    /// topology populated before serving requests should call
    /// [`Fetcher::poll_all`] once up front.
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.poll_all().await;
        }
    }

    /// Polls every configured peer once and rebuilds the topology from
    /// whatever is cached afterward, including peers that failed this
    /// tick (their last known document is kept).
    pub async fn poll_all(&self) {
        for peer_url in &self.peers {
            match self.poll_one(peer_url).await {
                Ok(networks) => {
                    tracing::info!(peer_url, network_count = networks.len(), "topology document refreshed");
                    self.last_known.insert(peer_url.clone(), networks);
                }
                Err(e) => {
                    tracing::warn!(peer_url, error = %e, "topology poll failed, keeping last known document");
                }
            }
        }
        self.rebuild_topology();
    }

    async fn poll_one(&self, peer_url: &str) -> Result<Vec<Network>, NsaError> {
        let document = self.source.fetch(peer_url).await?;
        self.parser.parse(&document)
    }

    /// Atomic copy-on-replace fold of local networks plus every peer's
    /// last known networks (spec §4.9 step 3, §5's shared-resource
    /// discipline).
    fn rebuild_topology(&self) {
        let mut merged = self.local_networks.clone();
        for entry in self.last_known.iter() {
            merged.extend(entry.value().clone());
        }
        self.topology.replace_all(merged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsa_types::{BidirectionalPort, Orientation, Port};

    fn network(id: &str, managing_nsa: &str) -> Network {
        Network {
            id: id.to_string(),
            name: id.to_string(),
            ports: vec![Port {
                id: format!("{id}-ps"),
                name: format!("{id}-ps"),
                labels: vec![],
                remote_network_id: None,
                remote_port_id: None,
                orientation: Orientation::Ingress,
                capacity_mbps: None,
            }],
            bidirectional_ports: Vec::<BidirectionalPort>::new(),
            managing_nsa: managing_nsa.to_string(),
            swappable_label_types: Default::default(),
        }
    }

    struct StaticSource {
        documents: std::collections::HashMap<String, Result<Vec<u8>, NsaError>>,
    }

    #[async_trait]
    impl TopologyDocumentSource for StaticSource {
        async fn fetch(&self, peer_url: &str) -> Result<Vec<u8>, NsaError> {
            match self.documents.get(peer_url) {
                Some(Ok(doc)) => Ok(doc.clone()),
                Some(Err(e)) => Err(e.clone()),
                None => Err(NsaError::Internal(format!("no document stubbed for {peer_url}"))),
            }
        }
    }

    /// Each parsed document is just the peer's own network, identified by
    /// the single byte it carries.
    struct TaggedNetworkParser;

    impl TopologyDocumentParser for TaggedNetworkParser {
        fn parse(&self, document: &[u8]) -> Result<Vec<Network>, NsaError> {
            let tag = std::str::from_utf8(document).map_err(|e| NsaError::Payload(e.to_string()))?;
            Ok(vec![network(tag, &nsa_types::nsa_urn(tag))])
        }
    }

    #[tokio::test]
    async fn successful_poll_merges_local_and_peer_networks() {
        let topology = Arc::new(Topology::new());
        let mut documents = std::collections::HashMap::new();
        documents.insert("http://peer-a".to_string(), Ok(b"aruba".to_vec()));
        let source = Arc::new(StaticSource { documents });

        let fetcher = Fetcher::new(
            topology.clone(),
            source,
            Arc::new(TaggedNetworkParser),
            vec!["http://peer-a".to_string()],
            Duration::from_secs(30),
            vec![network("core", "urn:ogf:network:core:nsa")],
        );

        fetcher.poll_all().await;

        assert!(topology.get_network("core").is_ok());
        assert!(topology.get_network("aruba").is_ok());
    }

    #[tokio::test]
    async fn a_failing_peer_keeps_its_last_known_networks_and_does_not_affect_others() {
        let topology = Arc::new(Topology::new());
        let mut documents = std::collections::HashMap::new();
        documents.insert("http://peer-a".to_string(), Ok(b"aruba".to_vec()));
        documents.insert("http://peer-b".to_string(), Ok(b"bonaire".to_vec()));
        let source = Arc::new(StaticSource { documents });

        let fetcher = Fetcher::new(
            topology.clone(),
            source,
            Arc::new(TaggedNetworkParser),
            vec!["http://peer-a".to_string(), "http://peer-b".to_string()],
            Duration::from_secs(30),
            vec![],
        );

        fetcher.poll_all().await;
        assert!(topology.get_network("aruba").is_ok());
        assert!(topology.get_network("bonaire").is_ok());

        // peer-b starts failing; its previously discovered network must
        // remain in the topology, and peer-a's refresh must still land.
        let mut failing_documents = std::collections::HashMap::new();
        failing_documents.insert("http://peer-a".to_string(), Ok(b"aruba".to_vec()));
        failing_documents.insert("http://peer-b".to_string(), Err(NsaError::Internal("unreachable".into())));
        let failing_source = Arc::new(StaticSource {
            documents: failing_documents,
        });
        let fetcher = Fetcher::new(
            topology.clone(),
            failing_source,
            Arc::new(TaggedNetworkParser),
            vec!["http://peer-a".to_string(), "http://peer-b".to_string()],
            Duration::from_secs(30),
            vec![],
        );
        // Seed this fetcher's own cache the way a long-running instance
        // would already have it, then poll through the failure.
        fetcher.last_known.insert("http://peer-b".to_string(), vec![network("bonaire", "urn:ogf:network:bonaire:nsa")]);
        fetcher.poll_all().await;

        assert!(topology.get_network("aruba").is_ok());
        assert!(topology.get_network("bonaire").is_ok(), "a stale peer must not blank out its last known networks");
    }

    #[tokio::test]
    async fn poll_never_panics_on_a_persistently_unreachable_peer() {
        let topology = Arc::new(Topology::new());
        let source = Arc::new(StaticSource {
            documents: std::collections::HashMap::new(),
        });

        let fetcher = Fetcher::new(
            topology.clone(),
            source,
            Arc::new(TaggedNetworkParser),
            vec!["http://unreachable".to_string()],
            Duration::from_secs(30),
            vec![network("core", "urn:ogf:network:core:nsa")],
        );

        fetcher.poll_all().await;
        assert!(topology.get_network("core").is_ok(), "the local network must survive a peer that never responds");
        assert!(topology.get_network("unreachable").is_err());
    }
}
