//! The request interface (spec §6), symmetric northbound and
//! southbound: every provider — the Local Backend, the Aggregator, or a
//! remote peer reached through the registry — implements the same
//! trait, so a caller never special-cases "local" (spec §9).

use crate::header::Header;
use crate::notification::QuerySummaryResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nsa_types::{NsaError, Stp};

#[derive(Debug, Clone)]
pub struct ReserveRequest {
    /// `Some` only for reservation modification, which is rejected
    /// (spec §9, SPEC_FULL.md §D.2).
    pub connection_id: Option<String>,
    pub global_reservation_id: String,
    pub description: String,
    pub source_stp: Stp,
    pub dest_stp: Stp,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub bandwidth: u64,
}

#[async_trait]
pub trait NsaProvider: Send + Sync {
    /// Acks *receipt* of the reservation request and returns the
    /// connection id; the reservation itself is confirmed later via
    /// `NsaRequester::notify(ReserveConfirmed)` (spec §4.7 step 7).
    async fn reserve(&self, header: Header, request: ReserveRequest) -> Result<String, NsaError>;

    async fn reserve_commit(&self, header: Header, connection_id: &str) -> Result<(), NsaError>;

    async fn reserve_abort(&self, header: Header, connection_id: &str) -> Result<(), NsaError>;

    async fn provision(&self, header: Header, connection_id: &str) -> Result<(), NsaError>;

    async fn release(&self, header: Header, connection_id: &str) -> Result<(), NsaError>;

    async fn terminate(&self, header: Header, connection_id: &str) -> Result<(), NsaError>;

    /// Asynchronous: the result arrives later via
    /// `Notification::QuerySummaryConfirmed`.
    async fn query_summary(&self, header: Header, connection_ids: Vec<String>) -> Result<(), NsaError>;

    /// Synchronous: resolves immediately from whatever is already
    /// persisted locally (SPEC_FULL.md §C.1).
    async fn query_summary_sync(&self, header: Header, connection_ids: Vec<String>) -> Result<Vec<QuerySummaryResult>, NsaError>;
}

/// The requester side: receives asynchronous confirmations and
/// notifications emitted by a provider it called.
#[async_trait]
pub trait NsaRequester: Send + Sync {
    async fn notify(&self, header: Header, notification: crate::notification::Notification);
}
