//! The persistence contract (spec §4.5). A contract, not a schema:
//! insert/update, find by `connection_id`, find by `(provider_nsa,
//! connection_id)`, and "all connections not in lifecycle TERMINATED".
//! No join other than parent -> children by `service_connection_id`.

use crate::model::{ServiceConnectionRecord, SubConnectionRecord};
use async_trait::async_trait;
use nsa_types::NsaError;

#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Atomic write of the whole record, all four state fields
    /// together — single-writer under the caller's per-connection lock,
    /// readers see either the pre- or post-state, never torn.
    async fn put_service_connection(&self, record: ServiceConnectionRecord) -> Result<(), NsaError>;

    async fn get_service_connection(&self, connection_id: &str) -> Result<ServiceConnectionRecord, NsaError>;

    async fn put_sub_connection(&self, record: SubConnectionRecord) -> Result<(), NsaError>;

    async fn get_sub_connection(&self, provider_nsa: &str, connection_id: &str) -> Result<SubConnectionRecord, NsaError>;

    /// Children of a service connection, in insertion (`order_id`) order.
    async fn sub_connections_of(&self, service_connection_id: &str) -> Result<Vec<SubConnectionRecord>, NsaError>;

    /// Every service connection whose lifecycle state is not
    /// `Terminated` — consulted by the Local Backend's restart recovery
    /// sweep (spec §4.5, §4.6).
    async fn non_terminated_connections(&self) -> Result<Vec<ServiceConnectionRecord>, NsaError>;

    async fn non_terminated_sub_connections(&self) -> Result<Vec<SubConnectionRecord>, NsaError>;
}
