//! The four parallel connection state machines (spec §4.2) and their
//! join discipline for parent/child aggregation (spec §3).

pub mod aggregation;
pub mod dataplane;
pub mod lifecycle;
pub mod provision;
pub mod reservation;

pub use aggregation::{aggregate_dataplane, aggregate_uniform};
pub use dataplane::DataPlaneStatus;
pub use lifecycle::LifecycleState;
pub use provision::ProvisionState;
pub use reservation::ReservationState;

/// The four-axis state of a single connection (service or
/// sub-connection), bundled for persistence and version tracking.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConnectionState {
    pub reservation: ReservationState,
    pub provision: ProvisionState,
    pub lifecycle: LifecycleState,
    pub dataplane: DataPlaneStatus,
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState {
            reservation: ReservationState::default(),
            provision: ProvisionState::default(),
            lifecycle: LifecycleState::default(),
            dataplane: DataPlaneStatus::default(),
        }
    }
}
