//! Loads the agent's own NRM map (spec §6's `nrm_map_file`) through the
//! same pluggable source/parser seam the Fetcher uses for peer discovery
//! documents (`nsa_fetcher::TopologyDocumentSource`/`TopologyDocumentParser`)
//! — the document format is out of scope here exactly as it is there
//! (spec §1), so the local file is read as bytes and handed to whatever
//! parser the deployment configures.

use async_trait::async_trait;
use nsa_fetcher::TopologyDocumentSource;
use nsa_types::NsaError;
use std::path::PathBuf;

/// Reads the configured NRM map file from disk. `peer_url` is unused —
/// the trait is shared with the Fetcher, which addresses peers by URL;
/// here there is exactly one source, the local file.
pub struct FileTopologyDocumentSource {
    pub path: PathBuf,
}

#[async_trait]
impl TopologyDocumentSource for FileTopologyDocumentSource {
    async fn fetch(&self, _peer_url: &str) -> Result<Vec<u8>, NsaError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| NsaError::Internal(format!("failed to read nrm map file {}: {e}", self.path.display())))
    }
}
