//! The Local Backend (spec §4.6): the edge provider. Implements
//! [`NsaProvider`] the same way the Aggregator does, so the registry can
//! resolve either behind the same trait object (spec §9's recursive
//! self-dispatch).
//!
//! Grounded on `opennsa/backends/common/simplebackend.py`: per-connection
//! label selection against the calendar, a scheduled terminate at
//! `end_time`, lazy activation at `start_time`, and a restart-recovery
//! sweep that reclassifies every non-terminated connection against the
//! wall clock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nsa_calendar::ReservationCalendar;
use nsa_persistence::{ConnectionStore, ServiceConnectionRecord};
use nsa_protocol::notification::{Notification, QuerySummaryResult, ReserveConfirmedCriteria};
use nsa_protocol::{Header, NsaProvider, NsaRequester, ReserveRequest};
use nsa_scheduler::CallScheduler;
use nsa_state::{ConnectionState, LifecycleState, ProvisionState, ReservationState};
use nsa_types::{Label, NsaError, Stp};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::connection_manager::ConnectionManager;

fn transition_err<T: std::fmt::Debug>(axis: &'static str) -> impl Fn((T, T)) -> NsaError {
    move |(from, to)| NsaError::StateTransition {
        axis,
        from: format!("{from:?}"),
        to: format!("{to:?}"),
    }
}

fn term_key(connection_id: &str) -> String {
    format!("term:{connection_id}")
}

fn activate_key(connection_id: &str) -> String {
    format!("activate:{connection_id}")
}

fn tpc_key(connection_id: &str) -> String {
    format!("tpc:{connection_id}")
}

/// Drives `lifecycle` to `Terminated`, taking the intermediate
/// `Terminating` hop only when coming from `Created` (spec §4.2: there
/// is no direct `Created -> Terminated` edge other than through
/// `Terminating`, while `Initial -> Terminated` is direct).
fn terminate_lifecycle(from: LifecycleState) -> Result<LifecycleState, NsaError> {
    match from {
        LifecycleState::Initial => from.transition(LifecycleState::Terminated).map_err(transition_err("lifecycle")),
        LifecycleState::Created => from
            .transition(LifecycleState::Terminating)
            .map_err(transition_err("lifecycle"))?
            .transition(LifecycleState::Terminated)
            .map_err(transition_err("lifecycle")),
        LifecycleState::Terminating => from.transition(LifecycleState::Terminated).map_err(transition_err("lifecycle")),
        LifecycleState::Terminated => Ok(LifecycleState::Terminated),
    }
}

pub struct LocalBackend {
    local_nsa_urn: String,
    connection_manager: Arc<dyn ConnectionManager>,
    calendar: Arc<ReservationCalendar>,
    scheduler: Arc<CallScheduler>,
    store: Arc<dyn ConnectionStore>,
    requester: Arc<dyn NsaRequester>,
    reserve_hold_timeout: chrono::Duration,
    /// Serializes operations per connection; `RESERVE_CHECKING` is the
    /// logical lock, this mutex is its enforcement (spec §4.2's note on
    /// `ReservationState`).
    locks: dashmap::DashMap<String, Arc<Mutex<()>>>,
    /// Lets `&self` methods obtain an owned `Arc<Self>` to move into
    /// scheduled tasks, since [`NsaProvider`] only hands out `&self`.
    self_weak: std::sync::Weak<LocalBackend>,
}

impl LocalBackend {
    pub fn new(
        local_nsa_urn: impl Into<String>,
        connection_manager: Arc<dyn ConnectionManager>,
        calendar: Arc<ReservationCalendar>,
        scheduler: Arc<CallScheduler>,
        store: Arc<dyn ConnectionStore>,
        requester: Arc<dyn NsaRequester>,
        reserve_hold_timeout: chrono::Duration,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| LocalBackend {
            local_nsa_urn: local_nsa_urn.into(),
            connection_manager,
            calendar,
            scheduler,
            store,
            requester,
            reserve_hold_timeout,
            locks: dashmap::DashMap::new(),
            self_weak: weak.clone(),
        })
    }

    /// Upgrades the backend's self-reference. Only fails if called while
    /// the backend itself is being dropped.
    fn arc(&self) -> Arc<LocalBackend> {
        self.self_weak.upgrade().expect("LocalBackend dropped while an operation was in flight")
    }

    /// Delivers a notification without making the caller wait for it.
    /// The spec draws a hard line between the synchronous ack a
    /// `reserve`-family call returns and the asynchronous confirmation
    /// that follows (spec §4.7 step 7); awaiting `notify` inline here
    /// would silently collapse that distinction back into one event.
    fn notify_async(&self, header: Header, notification: Notification) {
        let requester = self.requester.clone();
        tokio::spawn(async move {
            requester.notify(header, notification).await;
        });
    }

    fn lock_for(&self, connection_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(connection_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn try_book(&self, port: &str, label_type: &str, value: u32, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<(u32, String)> {
        let key = self.connection_manager.resource_key(port, label_type, value);
        self.calendar.add(&key, start, end).ok().map(|_| (value, key))
    }

    /// Chooses concrete label values for both endpoints, booking the
    /// calendar as it goes and rolling back on partial failure (spec
    /// §4.6 step 2). Returns the chosen `(source_stp, dest_stp)`.
    fn select_labels(&self, request: &ReserveRequest) -> Result<(Stp, Stp), NsaError> {
        let src_label = request
            .source_stp
            .single_label()
            .ok_or_else(|| NsaError::MissingParameter("source STP must specify exactly one label".into()))?
            .clone();
        let dst_label = request
            .dest_stp
            .single_label()
            .ok_or_else(|| NsaError::MissingParameter("destination STP must specify exactly one label".into()))?
            .clone();

        if src_label.label_type() != dst_label.label_type() {
            return Err(NsaError::Payload(format!(
                "cannot connect label types {} and {}",
                src_label.label_type(),
                dst_label.label_type()
            )));
        }
        let label_type = src_label.label_type().to_string();

        let (src_value, dst_value) = if self.connection_manager.can_swap_label(&label_type) {
            let (src_value, _) = src_label
                .enumerate()
                .find_map(|v| self.try_book(&request.source_stp.port_id, &label_type, v, request.start_time, request.end_time))
                .ok_or_else(|| NsaError::ResourceUnavailable(format!("no available {label_type} label at {}", request.source_stp.port_id)))?;

            let dst_booked = dst_label
                .enumerate()
                .find_map(|v| self.try_book(&request.dest_stp.port_id, &label_type, v, request.start_time, request.end_time));

            let (dst_value, _) = match dst_booked {
                Some(booked) => booked,
                None => {
                    let src_key = self.connection_manager.resource_key(&request.source_stp.port_id, &label_type, src_value);
                    self.calendar.remove(&src_key, request.start_time, request.end_time);
                    return Err(NsaError::ResourceUnavailable(format!(
                        "no available {label_type} label at {}",
                        request.dest_stp.port_id
                    )));
                }
            };
            (src_value, dst_value)
        } else {
            let intersected = src_label.intersect(&dst_label)?;
            let mut chosen = None;
            for v in intersected.enumerate() {
                let src_key = self.connection_manager.resource_key(&request.source_stp.port_id, &label_type, v);
                if self.calendar.add(&src_key, request.start_time, request.end_time).is_err() {
                    continue;
                }
                let dst_key = self.connection_manager.resource_key(&request.dest_stp.port_id, &label_type, v);
                if self.calendar.add(&dst_key, request.start_time, request.end_time).is_ok() {
                    chosen = Some(v);
                    break;
                }
                self.calendar.remove(&src_key, request.start_time, request.end_time);
            }
            let v = chosen.ok_or_else(|| NsaError::ResourceUnavailable(format!("no available {label_type} label shared by both endpoints")))?;
            (v, v)
        };

        let source_stp = Stp::new(
            request.source_stp.network_id.clone(),
            request.source_stp.port_id.clone(),
            vec![Label::single(label_type.clone(), src_value)],
        );
        let dest_stp = Stp::new(
            request.dest_stp.network_id.clone(),
            request.dest_stp.port_id.clone(),
            vec![Label::single(label_type, dst_value)],
        );
        Ok((source_stp, dest_stp))
    }

    fn release_calendar(&self, record: &ServiceConnectionRecord) {
        if let Some(src) = record.source_stp.single_label() {
            if let Some(&(v, _)) = src.ranges().first() {
                let key = self.connection_manager.resource_key(&record.source_stp.port_id, src.label_type(), v);
                self.calendar.remove(&key, record.start_time, record.end_time);
            }
        }
        if let Some(dst) = record.dest_stp.single_label() {
            if let Some(&(v, _)) = dst.ranges().first() {
                let key = self.connection_manager.resource_key(&record.dest_stp.port_id, dst.label_type(), v);
                self.calendar.remove(&key, record.start_time, record.end_time);
            }
        }
    }

    fn targets(&self, record: &ServiceConnectionRecord) -> Option<(String, String)> {
        let src = record.source_stp.single_label()?;
        let dst = record.dest_stp.single_label()?;
        let src_value = src.ranges().first()?.0;
        let dst_value = dst.ranges().first()?.0;
        Some((
            self.connection_manager.target(&record.source_stp.port_id, src.label_type(), src_value),
            self.connection_manager.target(&record.dest_stp.port_id, dst.label_type(), dst_value),
        ))
    }

    async fn do_activate(&self, connection_id: &str) -> Result<(), NsaError> {
        let guard = self.lock_for(connection_id);
        let _held = guard.lock().await;

        let mut record = self.store.get_service_connection(connection_id).await?;
        if record.state.lifecycle.is_terminal() || record.state.dataplane.active {
            return Ok(());
        }
        let Some((src_target, dst_target)) = self.targets(&record) else {
            return Ok(());
        };
        self.connection_manager
            .setup_link(connection_id, &src_target, &dst_target, record.bandwidth)
            .await?;

        if let Ok(provisioned) = record.state.provision.transition(ProvisionState::Provisioned) {
            record.state.provision = provisioned;
        }
        record.state.dataplane = record.state.dataplane.activate();
        self.store.put_service_connection(record.clone()).await?;

        let header = Header::new(&self.local_nsa_urn, &record.requester_nsa, &record.requester_reply_url);
        self.notify_async(
            header,
            Notification::DataPlaneStateChange {
                connection_id: connection_id.to_string(),
                status: record.state.dataplane,
            },
        );
        Ok(())
    }

    async fn do_terminate(&self, connection_id: &str) -> Result<(), NsaError> {
        let guard = self.lock_for(connection_id);
        let _held = guard.lock().await;

        let mut record = match self.store.get_service_connection(connection_id).await {
            Ok(record) => record,
            Err(_) => return Ok(()),
        };
        if record.state.lifecycle.is_terminal() {
            return Ok(());
        }

        self.scheduler.cancel(&term_key(connection_id));
        self.scheduler.cancel(&activate_key(connection_id));
        self.scheduler.cancel(&tpc_key(connection_id));

        if record.state.dataplane.active {
            if let Some((src_target, dst_target)) = self.targets(&record) {
                self.connection_manager
                    .teardown_link(connection_id, &src_target, &dst_target, record.bandwidth)
                    .await?;
            }
            record.state.dataplane = record.state.dataplane.deactivate();
        }

        self.release_calendar(&record);
        record.state.lifecycle = terminate_lifecycle(record.state.lifecycle)?;
        self.store.put_service_connection(record.clone()).await?;

        let header = Header::new(&self.local_nsa_urn, &record.requester_nsa, &record.requester_reply_url);
        self.notify_async(
            header,
            Notification::TerminateConfirmed {
                connection_id: connection_id.to_string(),
            },
        );
        Ok(())
    }

    /// Restart recovery (spec §4.6, scenario 6): reclassify every
    /// non-terminated connection by `(now vs start_time, now vs
    /// end_time, provision_state)`, terminating anything past its
    /// `end_time` and re-activating anything that should already be on
    /// the data plane.
    pub async fn recover(self: Arc<Self>) -> Result<(), NsaError> {
        let connections = self.store.non_terminated_connections().await?;
        let now = Utc::now();
        for record in connections {
            if record.end_time <= now {
                tracing::info!(connection_id = %record.connection_id, "recovery: end_time already passed, terminating");
                if let Err(e) = self.clone().do_terminate(&record.connection_id).await {
                    tracing::warn!(connection_id = %record.connection_id, error = %e, "recovery terminate failed");
                }
                continue;
            }

            let committed = matches!(record.state.provision, ProvisionState::Scheduled | ProvisionState::Provisioned);
            if !committed {
                continue;
            }

            if record.start_time <= now {
                tracing::info!(connection_id = %record.connection_id, "recovery: in active window, re-activating");
                if let Err(e) = self.clone().do_activate(&record.connection_id).await {
                    tracing::warn!(connection_id = %record.connection_id, error = %e, "recovery activation failed");
                }
            } else {
                let this = self.clone();
                let connection_id = record.connection_id.clone();
                self.scheduler.schedule(activate_key(&connection_id), record.start_time, async move {
                    if let Err(e) = this.do_activate(&connection_id).await {
                        tracing::warn!(connection_id = %connection_id, error = %e, "scheduled activation failed");
                    }
                });
            }

            let this = self.clone();
            let connection_id = record.connection_id.clone();
            self.scheduler.schedule(term_key(&connection_id), record.end_time, async move {
                if let Err(e) = this.do_terminate(&connection_id).await {
                    tracing::warn!(connection_id = %connection_id, error = %e, "scheduled terminate failed");
                }
            });
        }
        Ok(())
    }
}

#[async_trait]
impl NsaProvider for Arc<LocalBackend> {
    async fn reserve(&self, header: Header, request: ReserveRequest) -> Result<String, NsaError> {
        if let Some(existing) = &request.connection_id {
            return match self.store.get_service_connection(existing).await {
                Ok(_) => Err(NsaError::ConnectionExists(existing.clone())),
                Err(_) => Err(NsaError::Payload("reservation modification is not supported".into())),
            };
        }

        let connection_id = format!("urn:uuid:{}", uuid::Uuid::new_v4());
        let guard = self.lock_for(&connection_id);
        let _held = guard.lock().await;

        let reservation = ReservationState::ReserveStart
            .transition(ReservationState::ReserveChecking)
            .map_err(transition_err("reservation"))?;

        let (source_stp, dest_stp) = match self.select_labels(&request) {
            Ok(stps) => stps,
            Err(e) => {
                self.notify_async(
                    header.for_downstream(&self.local_nsa_urn, &header.reply_to_url),
                    Notification::ReserveFailed {
                        connection_id: connection_id.clone(),
                        error: e.clone(),
                    },
                );
                return Err(e);
            }
        };

        let reservation = reservation.transition(ReservationState::ReserveHeld).map_err(transition_err("reservation"))?;

        let record = ServiceConnectionRecord {
            connection_id: connection_id.clone(),
            global_reservation_id: request.global_reservation_id.clone(),
            description: request.description.clone(),
            requester_nsa: header.requester_nsa_urn.clone(),
            requester_reply_url: header.reply_to_url.clone(),
            source_stp: source_stp.clone(),
            dest_stp: dest_stp.clone(),
            start_time: request.start_time,
            end_time: request.end_time,
            bandwidth: request.bandwidth,
            state: ConnectionState {
                reservation,
                // Set at creation, not deferred to `reserve_commit` (spec
                // §4.6 step 3; `simplebackend.py` sets `SCHEDULED` the
                // same way, before any commit call exists).
                provision: ProvisionState::Scheduled,
                lifecycle: LifecycleState::Initial,
                dataplane: Default::default(),
            },
            created_at: Utc::now(),
            sub_connection_ids: vec![],
        };
        self.store.put_service_connection(record).await?;

        self.scheduler.schedule(term_key(&connection_id), request.end_time, {
            let this = self.clone();
            let connection_id = connection_id.clone();
            async move {
                if let Err(e) = this.do_terminate(&connection_id).await {
                    tracing::warn!(connection_id = %connection_id, error = %e, "scheduled terminate failed");
                }
            }
        });

        let held_since = Utc::now();
        self.scheduler.schedule(tpc_key(&connection_id), held_since + self.reserve_hold_timeout, {
            let this = self.requester.clone();
            let connection_id = connection_id.clone();
            let notify_header = header.for_downstream(&self.local_nsa_urn, &header.reply_to_url);
            let timeout = self.reserve_hold_timeout;
            async move {
                this.notify(
                    notify_header,
                    Notification::ReserveTimeout {
                        connection_id,
                        held_since,
                        timeout,
                    },
                )
                .await;
            }
        });

        self.notify_async(
            header.for_downstream(&self.local_nsa_urn, &header.reply_to_url),
            Notification::ReserveConfirmed {
                connection_id: connection_id.clone(),
                criteria: ReserveConfirmedCriteria {
                    source_stp,
                    dest_stp,
                    start_time: request.start_time,
                    end_time: request.end_time,
                    bandwidth: request.bandwidth,
                },
            },
        );

        Ok(connection_id)
    }

    async fn reserve_commit(&self, header: Header, connection_id: &str) -> Result<(), NsaError> {
        let guard = self.lock_for(connection_id);
        let _held = guard.lock().await;

        let mut record = self.store.get_service_connection(connection_id).await?;
        self.scheduler.cancel(&tpc_key(connection_id));

        record.state.reservation = record
            .state
            .reservation
            .transition(ReservationState::ReserveCommitting)
            .map_err(transition_err("reservation"))?
            .transition(ReservationState::ReserveStart)
            .map_err(transition_err("reservation"))?;
        record.state.lifecycle = record
            .state
            .lifecycle
            .transition(LifecycleState::Created)
            .map_err(transition_err("lifecycle"))?;
        self.store.put_service_connection(record).await?;

        self.notify_async(
            header.for_downstream(&self.local_nsa_urn, &header.reply_to_url),
            Notification::ReserveCommitConfirmed {
                connection_id: connection_id.to_string(),
            },
        );
        Ok(())
    }

    async fn reserve_abort(&self, header: Header, connection_id: &str) -> Result<(), NsaError> {
        let guard = self.lock_for(connection_id);
        let _held = guard.lock().await;

        let mut record = self.store.get_service_connection(connection_id).await?;
        self.scheduler.cancel(&tpc_key(connection_id));
        self.scheduler.cancel(&term_key(connection_id));
        self.scheduler.cancel(&activate_key(connection_id));

        record.state.reservation = record
            .state
            .reservation
            .transition(ReservationState::ReserveAborting)
            .map_err(transition_err("reservation"))?
            .transition(ReservationState::ReserveStart)
            .map_err(transition_err("reservation"))?;

        self.release_calendar(&record);
        record.state.lifecycle = terminate_lifecycle(record.state.lifecycle)?;
        self.store.put_service_connection(record).await?;

        self.notify_async(
            header.for_downstream(&self.local_nsa_urn, &header.reply_to_url),
            Notification::ReserveAbortConfirmed {
                connection_id: connection_id.to_string(),
            },
        );
        Ok(())
    }

    async fn provision(&self, header: Header, connection_id: &str) -> Result<(), NsaError> {
        let record = {
            let guard = self.lock_for(connection_id);
            let _held = guard.lock().await;

            let record = self.store.get_service_connection(connection_id).await?;
            if record.state.lifecycle.is_terminal() {
                return Err(NsaError::ConnectionGone {
                    connection_id: connection_id.to_string(),
                    reason: "already terminated".into(),
                });
            }
            self.scheduler.cancel(&activate_key(connection_id));
            record
        };

        let now = Utc::now();
        if record.end_time <= now {
            return Err(NsaError::ConnectionGone {
                connection_id: connection_id.to_string(),
                reason: "end time has passed".into(),
            });
        }
        if record.start_time <= now {
            self.clone().do_activate(connection_id).await?;
        } else {
            let this = self.clone();
            let cid = connection_id.to_string();
            self.scheduler.schedule(activate_key(connection_id), record.start_time, async move {
                if let Err(e) = this.do_activate(&cid).await {
                    tracing::warn!(connection_id = %cid, error = %e, "scheduled activation failed");
                }
            });
        }

        self.notify_async(
            header.for_downstream(&self.local_nsa_urn, &header.reply_to_url),
            Notification::ProvisionConfirmed {
                connection_id: connection_id.to_string(),
            },
        );
        Ok(())
    }

    async fn release(&self, header: Header, connection_id: &str) -> Result<(), NsaError> {
        let guard = self.lock_for(connection_id);
        let _held = guard.lock().await;

        self.scheduler.cancel(&activate_key(connection_id));
        let mut record = self.store.get_service_connection(connection_id).await?;
        if record.state.dataplane.active {
            if let Some((src_target, dst_target)) = self.targets(&record) {
                self.connection_manager
                    .teardown_link(connection_id, &src_target, &dst_target, record.bandwidth)
                    .await?;
            }
            record.state.dataplane = record.state.dataplane.deactivate();
        }
        record.state.provision = ProvisionState::Released;
        self.store.put_service_connection(record).await?;

        self.notify_async(
            header.for_downstream(&self.local_nsa_urn, &header.reply_to_url),
            Notification::ReleaseConfirmed {
                connection_id: connection_id.to_string(),
            },
        );
        Ok(())
    }

    async fn terminate(&self, _header: Header, connection_id: &str) -> Result<(), NsaError> {
        self.clone().do_terminate(connection_id).await
    }

    async fn query_summary(&self, header: Header, connection_ids: Vec<String>) -> Result<(), NsaError> {
        let results = self.query_summary_sync(header.clone(), connection_ids).await?;
        self.notify_async(header, Notification::QuerySummaryConfirmed { results });
        Ok(())
    }

    async fn query_summary_sync(&self, _header: Header, connection_ids: Vec<String>) -> Result<Vec<QuerySummaryResult>, NsaError> {
        let mut out = Vec::with_capacity(connection_ids.len());
        for connection_id in connection_ids {
            let record = self.store.get_service_connection(&connection_id).await?;
            out.push(QuerySummaryResult {
                connection_id,
                state: record.state,
                child_states: vec![],
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection_manager::DudConnectionManager;
    use chrono::Duration;
    use nsa_persistence::InMemoryStore;
    use nsa_types::Label;
    use tokio::sync::Mutex as TokioMutex;

    #[derive(Default)]
    struct RecordingRequester {
        notifications: TokioMutex<Vec<Notification>>,
    }

    #[async_trait]
    impl NsaRequester for RecordingRequester {
        async fn notify(&self, _header: Header, notification: Notification) {
            self.notifications.lock().await.push(notification);
        }
    }

    fn vlan(range: (u32, u32)) -> Label {
        Label::new("vlan", [range])
    }

    fn test_request(start_offset: Duration, end_offset: Duration) -> ReserveRequest {
        let now = Utc::now();
        ReserveRequest {
            connection_id: None,
            global_reservation_id: "urn:ogf:network:example:reservation:1".to_string(),
            description: "test circuit".to_string(),
            source_stp: Stp::new("aruba", "a-ps", vec![vlan((1780, 1789))]),
            dest_stp: Stp::new("aruba", "a-pe", vec![vlan((1780, 1789))]),
            start_time: now + start_offset,
            end_time: now + end_offset,
            bandwidth: 100,
        }
    }

    fn test_backend() -> Arc<LocalBackend> {
        LocalBackend::new(
            "urn:ogf:network:aruba:nsa",
            Arc::new(DudConnectionManager::new()),
            ReservationCalendar::new_shared(),
            Arc::new(CallScheduler::new()),
            Arc::new(InMemoryStore::new()),
            Arc::new(RecordingRequester::default()),
            Duration::seconds(2),
        )
    }

    #[tokio::test]
    async fn reserve_persists_a_held_connection_and_notifies_confirmation() {
        let backend = test_backend();
        let header = Header::new("urn:ogf:network:requester:nsa", "urn:ogf:network:aruba:nsa", "http://requester/reply");
        let request = test_request(Duration::seconds(10), Duration::seconds(3600));

        let connection_id = backend.reserve(header, request).await.unwrap();
        let record = backend.store.get_service_connection(&connection_id).await.unwrap();
        assert_eq!(record.state.reservation, ReservationState::ReserveHeld);
        assert_eq!(record.state.lifecycle, LifecycleState::Initial);
    }

    #[tokio::test]
    async fn reserve_with_existing_connection_id_is_rejected() {
        let backend = test_backend();
        let header = Header::new("urn:ogf:network:requester:nsa", "urn:ogf:network:aruba:nsa", "http://requester/reply");
        let mut request = test_request(Duration::seconds(10), Duration::seconds(3600));
        request.connection_id = Some("urn:uuid:does-not-exist".to_string());

        let err = backend.reserve(header, request).await.unwrap_err();
        assert!(matches!(err, NsaError::Payload(_)));
    }

    #[tokio::test]
    async fn overlapping_reservation_on_the_same_port_is_refused() {
        let backend = test_backend();
        let header = Header::new("urn:ogf:network:requester:nsa", "urn:ogf:network:aruba:nsa", "http://requester/reply");

        let first = test_request(Duration::seconds(0), Duration::seconds(100));
        backend.reserve(header.clone(), first).await.unwrap();

        let overlapping = test_request(Duration::seconds(50), Duration::seconds(150));
        let err = backend.reserve(header, overlapping).await.unwrap_err();
        assert!(matches!(err, NsaError::ResourceUnavailable(_)));
    }

    #[tokio::test]
    async fn commit_then_provision_activates_when_window_already_open() {
        let backend = test_backend();
        let header = Header::new("urn:ogf:network:requester:nsa", "urn:ogf:network:aruba:nsa", "http://requester/reply");
        let request = test_request(Duration::seconds(-5), Duration::seconds(3600));

        let connection_id = backend.reserve(header.clone(), request).await.unwrap();
        backend.reserve_commit(header.clone(), &connection_id).await.unwrap();
        backend.provision(header, &connection_id).await.unwrap();

        let record = backend.store.get_service_connection(&connection_id).await.unwrap();
        assert!(record.state.dataplane.active);
        assert_eq!(record.state.provision, ProvisionState::Provisioned);
    }

    #[tokio::test]
    async fn terminate_releases_the_calendar_booking() {
        let backend = test_backend();
        let header = Header::new("urn:ogf:network:requester:nsa", "urn:ogf:network:aruba:nsa", "http://requester/reply");
        let request = test_request(Duration::seconds(10), Duration::seconds(3600));

        let connection_id = backend.reserve(header.clone(), request).await.unwrap();
        backend.terminate(header, &connection_id).await.unwrap();

        let record = backend.store.get_service_connection(&connection_id).await.unwrap();
        assert_eq!(record.state.lifecycle, LifecycleState::Terminated);
        let key = backend.connection_manager.resource_key("a-ps", "vlan", 1780);
        assert!(backend.calendar.is_empty_for(&key));
    }

    #[tokio::test]
    async fn terminate_is_idempotent() {
        let backend = test_backend();
        let header = Header::new("urn:ogf:network:requester:nsa", "urn:ogf:network:aruba:nsa", "http://requester/reply");
        let request = test_request(Duration::seconds(10), Duration::seconds(3600));

        let connection_id = backend.reserve(header.clone(), request).await.unwrap();
        backend.terminate(header.clone(), &connection_id).await.unwrap();
        backend.terminate(header, &connection_id).await.unwrap();
    }

    #[tokio::test]
    async fn recovery_reactivates_a_connection_whose_window_is_already_open() {
        let backend = test_backend();
        let header = Header::new("urn:ogf:network:requester:nsa", "urn:ogf:network:aruba:nsa", "http://requester/reply");
        let request = test_request(Duration::seconds(-30), Duration::seconds(3600));

        let connection_id = backend.reserve(header.clone(), request).await.unwrap();
        backend.reserve_commit(header, &connection_id).await.unwrap();

        // Simulate a restart: the process comes back up with the
        // connection already committed but never activated.
        backend.clone().recover().await.unwrap();

        let record = backend.store.get_service_connection(&connection_id).await.unwrap();
        assert!(record.state.dataplane.active);
    }

    #[tokio::test]
    async fn recovery_terminates_connections_past_their_end_time() {
        let backend = test_backend();
        let header = Header::new("urn:ogf:network:requester:nsa", "urn:ogf:network:aruba:nsa", "http://requester/reply");
        let request = test_request(Duration::seconds(-100), Duration::seconds(-10));

        let connection_id = backend.reserve(header, request).await.unwrap();
        backend.clone().recover().await.unwrap();

        let record = backend.store.get_service_connection(&connection_id).await.unwrap();
        assert_eq!(record.state.lifecycle, LifecycleState::Terminated);
    }

    #[tokio::test]
    async fn query_summary_sync_reflects_current_state() {
        let backend = test_backend();
        let header = Header::new("urn:ogf:network:requester:nsa", "urn:ogf:network:aruba:nsa", "http://requester/reply");
        let request = test_request(Duration::seconds(10), Duration::seconds(3600));

        let connection_id = backend.reserve(header.clone(), request).await.unwrap();
        let results = backend.query_summary_sync(header, vec![connection_id.clone()]).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].connection_id, connection_id);
        assert_eq!(results[0].state.reservation, ReservationState::ReserveHeld);
    }
}
