//! Core data model for the NSA core (spec §3): labels, service
//! termination points, the port/network/link/path graph, and the shared
//! error type (spec §7).

pub mod error;
pub mod label;
pub mod stp;

pub use error::{ChildOutcome, NsaError};
pub use label::Label;
pub use stp::{nsa_urn, BidirectionalPort, Link, Network, Orientation, Path, Port, Stp};
