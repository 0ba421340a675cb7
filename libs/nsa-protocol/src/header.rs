//! The request header every operation carries (spec §6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub protocol_version: String,
    pub correlation_id: String,
    pub requester_nsa_urn: String,
    pub provider_nsa_urn: String,
    pub reply_to_url: String,
    pub session_security_attrs: Vec<String>,
}

impl Header {
    /// Builds a header for a fresh request, generating a new
    /// correlation id.
    pub fn new(
        requester_nsa_urn: impl Into<String>,
        provider_nsa_urn: impl Into<String>,
        reply_to_url: impl Into<String>,
    ) -> Self {
        Header {
            protocol_version: "nsi-core/1".to_string(),
            correlation_id: uuid::Uuid::new_v4().to_string(),
            requester_nsa_urn: requester_nsa_urn.into(),
            provider_nsa_urn: provider_nsa_urn.into(),
            reply_to_url: reply_to_url.into(),
            session_security_attrs: Vec::new(),
        }
    }

    /// Builds the header for a downstream call made on behalf of an
    /// upstream request, keeping the requester/provider/reply_to fields
    /// but generating a fresh correlation id for the new hop.
    pub fn for_downstream(&self, provider_nsa_urn: impl Into<String>, reply_to_url: impl Into<String>) -> Self {
        Header {
            protocol_version: self.protocol_version.clone(),
            correlation_id: uuid::Uuid::new_v4().to_string(),
            requester_nsa_urn: self.provider_nsa_urn.clone(),
            provider_nsa_urn: provider_nsa_urn.into(),
            reply_to_url: reply_to_url.into(),
            session_security_attrs: self.session_security_attrs.clone(),
        }
    }
}
