//! In-memory reference implementation of the persistence contract.
//! Stands in for the out-of-scope database driver (spec §1): same
//! contract, no durability across process restarts.

use crate::model::{ServiceConnectionRecord, SubConnectionRecord};
use crate::store::ConnectionStore;
use async_trait::async_trait;
use nsa_state::LifecycleState;
use nsa_types::NsaError;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryStore {
    connections: RwLock<HashMap<String, ServiceConnectionRecord>>,
    /// Keyed by `(provider_nsa, connection_id)`.
    sub_connections: RwLock<HashMap<(String, String), SubConnectionRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionStore for InMemoryStore {
    async fn put_service_connection(&self, record: ServiceConnectionRecord) -> Result<(), NsaError> {
        self.connections
            .write()
            .await
            .insert(record.connection_id.clone(), record);
        Ok(())
    }

    async fn get_service_connection(&self, connection_id: &str) -> Result<ServiceConnectionRecord, NsaError> {
        self.connections
            .read()
            .await
            .get(connection_id)
            .cloned()
            .ok_or_else(|| NsaError::ConnectionNonExistent(connection_id.to_string()))
    }

    async fn put_sub_connection(&self, record: SubConnectionRecord) -> Result<(), NsaError> {
        let key = (record.provider_nsa.clone(), record.connection_id.clone());
        self.sub_connections.write().await.insert(key, record);
        Ok(())
    }

    async fn get_sub_connection(&self, provider_nsa: &str, connection_id: &str) -> Result<SubConnectionRecord, NsaError> {
        self.sub_connections
            .read()
            .await
            .get(&(provider_nsa.to_string(), connection_id.to_string()))
            .cloned()
            .ok_or_else(|| NsaError::ConnectionNonExistent(connection_id.to_string()))
    }

    async fn sub_connections_of(&self, service_connection_id: &str) -> Result<Vec<SubConnectionRecord>, NsaError> {
        let mut children: Vec<SubConnectionRecord> = self
            .sub_connections
            .read()
            .await
            .values()
            .filter(|sc| sc.service_connection_id == service_connection_id)
            .cloned()
            .collect();
        children.sort_by_key(|sc| sc.order_id);
        Ok(children)
    }

    async fn non_terminated_connections(&self) -> Result<Vec<ServiceConnectionRecord>, NsaError> {
        Ok(self
            .connections
            .read()
            .await
            .values()
            .filter(|c| !c.state.lifecycle.is_terminal())
            .cloned()
            .collect())
    }

    async fn non_terminated_sub_connections(&self) -> Result<Vec<SubConnectionRecord>, NsaError> {
        Ok(self
            .sub_connections
            .read()
            .await
            .values()
            .filter(|sc| !matches!(sc.state.lifecycle, LifecycleState::Terminated))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use nsa_state::ConnectionState;
    use nsa_types::Stp;

    fn sample(connection_id: &str) -> ServiceConnectionRecord {
        ServiceConnectionRecord {
            connection_id: connection_id.to_string(),
            global_reservation_id: "grid".to_string(),
            description: "test".to_string(),
            requester_nsa: "urn:ogf:network:requester:nsa".to_string(),
            requester_reply_url: "http://localhost/reply".to_string(),
            source_stp: Stp::new("aruba", "a1", vec![]),
            dest_stp: Stp::new("aruba", "a3", vec![]),
            start_time: Utc::now(),
            end_time: Utc::now(),
            bandwidth: 200,
            state: ConnectionState::default(),
            created_at: Utc::now(),
            sub_connection_ids: vec![],
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryStore::new();
        store.put_service_connection(sample("c1")).await.unwrap();
        let got = store.get_service_connection("c1").await.unwrap();
        assert_eq!(got.connection_id, "c1");
    }

    #[tokio::test]
    async fn get_missing_is_non_existent_error() {
        let store = InMemoryStore::new();
        let err = store.get_service_connection("missing").await.unwrap_err();
        assert!(matches!(err, NsaError::ConnectionNonExistent(_)));
    }

    #[tokio::test]
    async fn non_terminated_filter_excludes_terminated() {
        let store = InMemoryStore::new();
        let mut terminated = sample("c1");
        terminated.state.lifecycle = LifecycleState::Terminated;
        store.put_service_connection(terminated).await.unwrap();
        store.put_service_connection(sample("c2")).await.unwrap();

        let active = store.non_terminated_connections().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].connection_id, "c2");
    }

    #[tokio::test]
    async fn sub_connections_are_returned_in_order_id_order() {
        let store = InMemoryStore::new();
        for (order, provider) in [(1u32, "p2"), (0u32, "p1")] {
            store
                .put_sub_connection(SubConnectionRecord {
                    connection_id: format!("sub-{order}"),
                    service_connection_id: "parent".to_string(),
                    global_reservation_id: "grid".to_string(),
                    description: "seg".to_string(),
                    provider_nsa: provider.to_string(),
                    order_id: order,
                    local_link: false,
                    source_stp: Stp::new("aruba", "a1", vec![]),
                    dest_stp: Stp::new("bonaire", "b1", vec![]),
                    start_time: Utc::now(),
                    end_time: Utc::now(),
                    bandwidth: 100,
                    state: ConnectionState::default(),
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let children = store.sub_connections_of("parent").await.unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].order_id, 0);
        assert_eq!(children[1].order_id, 1);
    }
}
