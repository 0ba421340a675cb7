//! Error kinds shared across the NSA core (spec §7).
//!
//! Each variant maps to a wire error code at the (out-of-scope) SOAP/XML
//! boundary; that mapping lives with the codec, not here.

use thiserror::Error;

/// Top-level error type returned by every operation in the core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NsaError {
    #[error("topology error: {0}")]
    Topology(String),

    #[error("connection {0} already exists")]
    ConnectionExists(String),

    #[error("connection {0} does not exist")]
    ConnectionNonExistent(String),

    #[error("connection {connection_id} is gone: {reason}")]
    ConnectionGone {
        connection_id: String,
        reason: String,
    },

    #[error("illegal state transition: {axis} {from} -> {to}")]
    StateTransition {
        axis: &'static str,
        from: String,
        to: String,
    },

    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("bandwidth unavailable: requested {requested}, available {available}")]
    BandwidthUnavailable { requested: u64, available: u64 },

    #[error("malformed payload: {0}")]
    Payload(String),

    #[error("missing parameter: {0}")]
    MissingParameter(String),

    #[error("downstream call timed out after {0:?}")]
    CallbackTimeout(std::time::Duration),

    #[error("internal server error: {0}")]
    Internal(String),

    /// Composite error returned when a fan-out across several downstream
    /// providers fails; carries the originating provider NSA for each
    /// failure rather than collapsing them into a single string (spec §7,
    /// supplemented per SPEC_FULL.md §C.4).
    #[error("aggregate failure during {action}: {count} children involved", count = children.len())]
    Aggregate {
        action: String,
        children: Vec<ChildOutcome>,
    },
}

/// The outcome of one child/segment in a fan-out operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildOutcome {
    pub provider_nsa: String,
    pub error: Option<Box<NsaError>>,
}

impl NsaError {
    /// Build an `Aggregate` error from per-child outcomes, per §7's
    /// propagation policy: a single downstream failure passes through
    /// unchanged, multiple failures are composed.
    pub fn aggregate(action: impl Into<String>, children: Vec<ChildOutcome>) -> NsaError {
        let failures: Vec<&ChildOutcome> = children.iter().filter(|c| c.error.is_some()).collect();
        if failures.len() == 1 && children.len() == 1 {
            return (*failures[0].error.clone().unwrap()).clone();
        }
        NsaError::Aggregate {
            action: action.into(),
            children,
        }
    }
}
