//! Notifications (provider -> requester, spec §6) and the query-summary
//! projection (spec §4.7, §D.1).

use chrono::{DateTime, Utc};
use nsa_state::{ConnectionState, DataPlaneStatus};
use nsa_types::{NsaError, Stp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveConfirmedCriteria {
    pub source_stp: Stp,
    pub dest_stp: Stp,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub bandwidth: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuerySummaryResult {
    pub connection_id: String,
    pub state: ConnectionState,
    pub child_states: Vec<(String, ConnectionState)>,
}

#[derive(Debug, Clone)]
pub enum Notification {
    ReserveConfirmed {
        connection_id: String,
        criteria: ReserveConfirmedCriteria,
    },
    ReserveFailed {
        connection_id: String,
        error: NsaError,
    },
    ReserveCommitConfirmed {
        connection_id: String,
    },
    ReserveCommitFailed {
        connection_id: String,
        error: NsaError,
    },
    ReserveAbortConfirmed {
        connection_id: String,
    },
    ProvisionConfirmed {
        connection_id: String,
    },
    ReleaseConfirmed {
        connection_id: String,
    },
    TerminateConfirmed {
        connection_id: String,
    },
    ErrorEvent {
        connection_id: String,
        error: NsaError,
    },
    DataPlaneStateChange {
        connection_id: String,
        status: DataPlaneStatus,
    },
    /// A reservation held past `TPC_TIMEOUT` without a commit (spec
    /// §4.6). `held_since` lets the recipient compute how late the
    /// commit/abort decision already is.
    ReserveTimeout {
        connection_id: String,
        held_since: DateTime<Utc>,
        timeout: chrono::Duration,
    },
    QuerySummaryConfirmed {
        results: Vec<QuerySummaryResult>,
    },
}

impl Notification {
    pub fn connection_id(&self) -> Option<&str> {
        match self {
            Notification::ReserveConfirmed { connection_id, .. }
            | Notification::ReserveFailed { connection_id, .. }
            | Notification::ReserveCommitConfirmed { connection_id }
            | Notification::ReserveCommitFailed { connection_id, .. }
            | Notification::ReserveAbortConfirmed { connection_id }
            | Notification::ProvisionConfirmed { connection_id }
            | Notification::ReleaseConfirmed { connection_id }
            | Notification::TerminateConfirmed { connection_id }
            | Notification::ErrorEvent { connection_id, .. }
            | Notification::DataPlaneStateChange { connection_id, .. }
            | Notification::ReserveTimeout { connection_id, .. } => Some(connection_id),
            Notification::QuerySummaryConfirmed { .. } => None,
        }
    }
}
