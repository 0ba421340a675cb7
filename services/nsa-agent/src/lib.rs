//! Process entry point crate (spec §4.5, §4.9, §5): wires the Topology
//! Model, Provider Registry, Local Backend and Aggregator together
//! behind one configuration, runs the startup recovery sweep, drives
//! the Fetcher's poll loop, and owns graceful shutdown.
//!
//! Grounded on `services/adapters/gas_price_collector/src/lib.rs`'s
//! service-struct-plus-bin-wrapper split: this crate is the struct, the
//! `nsa-agent` binary in `src/bin` is the wrapper.

pub mod agent;
pub mod peers;
pub mod topology_source;

pub use agent::NsaAgent;
