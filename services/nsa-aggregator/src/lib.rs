//! Aggregator service crate (spec §4.7): computes a path across the
//! topology, fans a reservation out to one child per segment, and joins
//! their asynchronous confirmations back into a single parent
//! notification. Implements [`nsa_protocol::NsaProvider`] the same as
//! [`nsa_backend::LocalBackend`] (spec §9's recursive self-dispatch) and
//! [`nsa_protocol::NsaRequester`] to receive those children's callbacks.

pub mod aggregator;

pub use aggregator::Aggregator;
