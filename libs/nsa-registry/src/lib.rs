//! Provider lookup by NSA urn (spec §4.8): a single static local handle
//! registered at startup, plus peer handles built lazily the first time
//! a given peer is dialed.

use nsa_protocol::NsaProvider;
use nsa_types::NsaError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Builds a provider handle for a peer NSA the registry has not seen
/// before. Kept as a trait object so the aggregator can wire in
/// whatever transport (HTTP, in-process loopback for tests, ...)
/// without the registry knowing about it.
#[async_trait::async_trait]
pub trait PeerProviderFactory: Send + Sync {
    async fn build(&self, nsa_urn: &str) -> Result<Arc<dyn NsaProvider>, NsaError>;
}

/// Maps `nsa_urn -> provider handle`.
pub struct ProviderRegistry {
    local_nsa_urn: RwLock<Option<String>>,
    local: RwLock<Option<Arc<dyn NsaProvider>>>,
    peers: RwLock<HashMap<String, Arc<dyn NsaProvider>>>,
    peer_factory: Arc<dyn PeerProviderFactory>,
}

impl ProviderRegistry {
    pub fn new(peer_factory: Arc<dyn PeerProviderFactory>) -> Self {
        ProviderRegistry {
            local_nsa_urn: RwLock::new(None),
            local: RwLock::new(None),
            peers: RwLock::new(HashMap::new()),
            peer_factory,
        }
    }

    /// Registers the static local-backend handle under its own urn.
    pub async fn register_local(&self, nsa_urn: impl Into<String>, handle: Arc<dyn NsaProvider>) {
        let nsa_urn = nsa_urn.into();
        tracing::debug!(nsa_urn = %nsa_urn, "registering local provider handle");
        *self.local_nsa_urn.write().await = Some(nsa_urn);
        *self.local.write().await = Some(handle);
    }

    /// Resolves a provider handle for `nsa_urn`, building and caching a
    /// peer handle on first use.
    pub async fn resolve(&self, nsa_urn: &str) -> Result<Arc<dyn NsaProvider>, NsaError> {
        if self.local_nsa_urn.read().await.as_deref() == Some(nsa_urn) {
            if let Some(handle) = self.local.read().await.clone() {
                return Ok(handle);
            }
        }

        if let Some(handle) = self.peers.read().await.get(nsa_urn).cloned() {
            return Ok(handle);
        }

        tracing::info!(nsa_urn, "constructing peer provider handle on demand");
        let handle = self.peer_factory.build(nsa_urn).await?;
        self.peers.write().await.insert(nsa_urn.to_string(), handle.clone());
        Ok(handle)
    }

    pub async fn forget_peer(&self, nsa_urn: &str) {
        self.peers.write().await.remove(nsa_urn);
    }

    pub async fn known_peers(&self) -> Vec<String> {
        self.peers.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nsa_protocol::{Header, Notification, QuerySummaryResult, ReserveRequest};

    struct StubProvider(&'static str);

    #[async_trait]
    impl NsaProvider for StubProvider {
        async fn reserve(&self, _header: Header, _request: ReserveRequest) -> Result<String, NsaError> {
            Ok(self.0.to_string())
        }
        async fn reserve_commit(&self, _header: Header, _connection_id: &str) -> Result<(), NsaError> {
            Ok(())
        }
        async fn reserve_abort(&self, _header: Header, _connection_id: &str) -> Result<(), NsaError> {
            Ok(())
        }
        async fn provision(&self, _header: Header, _connection_id: &str) -> Result<(), NsaError> {
            Ok(())
        }
        async fn release(&self, _header: Header, _connection_id: &str) -> Result<(), NsaError> {
            Ok(())
        }
        async fn terminate(&self, _header: Header, _connection_id: &str) -> Result<(), NsaError> {
            Ok(())
        }
        async fn query_summary(&self, _header: Header, _connection_ids: Vec<String>) -> Result<(), NsaError> {
            Ok(())
        }
        async fn query_summary_sync(&self, _header: Header, _connection_ids: Vec<String>) -> Result<Vec<QuerySummaryResult>, NsaError> {
            Ok(vec![])
        }
    }

    struct StubRequester;

    #[async_trait]
    impl nsa_protocol::NsaRequester for StubRequester {
        async fn notify(&self, _header: Header, _notification: Notification) {}
    }

    struct CountingFactory {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl PeerProviderFactory for CountingFactory {
        async fn build(&self, nsa_urn: &str) -> Result<Arc<dyn NsaProvider>, NsaError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Arc::new(StubProvider(Box::leak(nsa_urn.to_string().into_boxed_str()))))
        }
    }

    #[tokio::test]
    async fn resolves_local_handle_without_invoking_factory() {
        let factory = Arc::new(CountingFactory {
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let registry = ProviderRegistry::new(factory.clone());
        registry.register_local("urn:ogf:network:example:nsa", Arc::new(StubProvider("local"))).await;

        let handle = registry.resolve("urn:ogf:network:example:nsa").await.unwrap();
        let header = Header::new("x", "y", "z");
        let request = ReserveRequest {
            connection_id: None,
            global_reservation_id: "g".into(),
            description: "d".into(),
            source_stp: nsa_types::Stp::new("a", "p1", vec![]),
            dest_stp: nsa_types::Stp::new("b", "p2", vec![]),
            start_time: chrono::Utc::now(),
            end_time: chrono::Utc::now(),
            bandwidth: 1000,
        };
        assert_eq!(handle.reserve(header, request).await.unwrap(), "local");
        assert_eq!(factory.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn builds_and_caches_peer_handle_lazily() {
        let factory = Arc::new(CountingFactory {
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let registry = ProviderRegistry::new(factory.clone());

        registry.resolve("urn:ogf:network:peer:nsa").await.unwrap();
        registry.resolve("urn:ogf:network:peer:nsa").await.unwrap();

        assert_eq!(factory.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(registry.known_peers().await, vec!["urn:ogf:network:peer:nsa".to_string()]);
    }

    #[tokio::test]
    async fn forget_peer_forces_rebuild() {
        let factory = Arc::new(CountingFactory {
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let registry = ProviderRegistry::new(factory.clone());

        registry.resolve("urn:ogf:network:peer:nsa").await.unwrap();
        registry.forget_peer("urn:ogf:network:peer:nsa").await;
        registry.resolve("urn:ogf:network:peer:nsa").await.unwrap();

        assert_eq!(factory.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
