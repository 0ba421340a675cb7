//! The default [`PeerProviderFactory`](nsa_registry::PeerProviderFactory):
//! dialing another NSA requires the SOAP/XML envelope codec and the
//! HTTP/TLS transport, both explicitly out of scope for the core (spec
//! §1). This factory documents that boundary with a clear error rather
//! than silently no-opping; a concrete deployment wires in its own
//! transport-backed factory in place of this one.

use async_trait::async_trait;
use nsa_protocol::NsaProvider;
use nsa_registry::PeerProviderFactory;
use nsa_types::NsaError;
use std::sync::Arc;

pub struct DudPeerProviderFactory;

#[async_trait]
impl PeerProviderFactory for DudPeerProviderFactory {
    async fn build(&self, nsa_urn: &str) -> Result<Arc<dyn NsaProvider>, NsaError> {
        Err(NsaError::Internal(format!(
            "no peer transport configured for {nsa_urn}: wire a PeerProviderFactory backed by a SOAP/HTTP client in its place"
        )))
    }
}
