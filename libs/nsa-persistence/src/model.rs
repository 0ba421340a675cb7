//! Persisted record shapes (spec §3). Required columns are listed here;
//! the database driver underneath is out of scope (spec §1).

use chrono::{DateTime, Utc};
use nsa_state::ConnectionState;
use nsa_types::Stp;
use serde::{Deserialize, Serialize};

/// A Service Connection: the aggregator-side, persistent root of a
/// reservation. Owns zero or more sub-connections in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConnectionRecord {
    pub connection_id: String,
    pub global_reservation_id: String,
    pub description: String,
    pub requester_nsa: String,
    pub requester_reply_url: String,
    pub source_stp: Stp,
    pub dest_stp: Stp,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub bandwidth: u64,
    pub state: ConnectionState,
    pub created_at: DateTime<Utc>,
    /// Ordered `connection_id`s of this connection's sub-connections.
    pub sub_connection_ids: Vec<String>,
}

/// A Sub-Connection: one per downstream provider segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubConnectionRecord {
    pub connection_id: String,
    pub service_connection_id: String,
    pub global_reservation_id: String,
    pub description: String,
    pub provider_nsa: String,
    /// Position along the path; 0 is the segment touching the parent's
    /// source_stp, the last is the segment touching dest_stp.
    pub order_id: u32,
    /// True iff this segment's provider is the local backend.
    pub local_link: bool,
    pub source_stp: Stp,
    pub dest_stp: Stp,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub bandwidth: u64,
    pub state: ConnectionState,
    pub created_at: DateTime<Utc>,
}
