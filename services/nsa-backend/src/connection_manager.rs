//! The pluggable Connection Manager (spec §4.6): the only thing a
//! concrete backend deployment has to supply. Everything else —
//! two-phase reservation, calendar bookkeeping, timer-driven
//! activation — lives in [`crate::backend::LocalBackend`] and is
//! shared across managers.

use async_trait::async_trait;
use nsa_types::NsaError;

/// Three primitives plus a target formatter (spec §4.6): resource
/// identity for the calendar, swap capability, and dataplane
/// activation/teardown. Hardware command dispatch (CLI-over-SSH, HTTP
/// configuration APIs) lives behind a concrete implementation of this
/// trait and is out of scope for the core (spec §1).
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    /// An opaque identifier for `(port, label_type, label_value)`,
    /// consumed only by the reservation calendar (spec §4.3) — the
    /// calendar never sees the triple it was derived from.
    fn resource_key(&self, port: &str, label_type: &str, label_value: u32) -> String;

    /// A human/hardware-facing target descriptor for `setup_link` /
    /// `teardown_link`, distinct from the calendar's opaque resource
    /// key (grounded on `DUDConnectionManager.getTarget` in the
    /// reference implementation).
    fn target(&self, port: &str, label_type: &str, label_value: u32) -> String {
        format!("{port}#{label_type}={label_value}")
    }

    fn can_swap_label(&self, label_type: &str) -> bool;

    async fn setup_link(&self, connection_id: &str, src_target: &str, dst_target: &str, bandwidth: u64) -> Result<(), NsaError>;

    async fn teardown_link(&self, connection_id: &str, src_target: &str, dst_target: &str, bandwidth: u64) -> Result<(), NsaError>;
}

/// A manager that only logs the actions it would take, performing no
/// real hardware dispatch. Grounded directly on `opennsa/backends/dud.py`
/// — used for local development and the core's own tests.
pub struct DudConnectionManager {
    pub swap_label_types: std::collections::HashSet<String>,
}

impl DudConnectionManager {
    pub fn new() -> Self {
        DudConnectionManager {
            swap_label_types: Default::default(),
        }
    }

    pub fn with_swap(label_types: impl IntoIterator<Item = String>) -> Self {
        DudConnectionManager {
            swap_label_types: label_types.into_iter().collect(),
        }
    }
}

impl Default for DudConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionManager for DudConnectionManager {
    fn resource_key(&self, port: &str, label_type: &str, label_value: u32) -> String {
        format!("{port}:{label_type}:{label_value}")
    }

    fn can_swap_label(&self, label_type: &str) -> bool {
        self.swap_label_types.contains(label_type)
    }

    async fn setup_link(&self, connection_id: &str, src_target: &str, dst_target: &str, bandwidth: u64) -> Result<(), NsaError> {
        tracing::info!(connection_id, src_target, dst_target, bandwidth, "dud link up");
        Ok(())
    }

    async fn teardown_link(&self, connection_id: &str, src_target: &str, dst_target: &str, bandwidth: u64) -> Result<(), NsaError> {
        tracing::info!(connection_id, src_target, dst_target, bandwidth, "dud link down");
        Ok(())
    }
}
