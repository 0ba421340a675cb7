//! Fetcher service crate (spec §4.9): periodically pulls a topology
//! document from each configured peer and folds the parsed result into
//! the shared [`nsa_topology::Topology`] (spec §4.1).

pub mod fetcher;

pub use fetcher::{DudTopologyDocumentParser, DudTopologyDocumentSource, Fetcher, TopologyDocumentParser, TopologyDocumentSource};
