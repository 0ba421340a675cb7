//! The Aggregator (spec §4.7): computes a path across the topology,
//! fans a reservation out to one child provider per segment, and joins
//! their asynchronous confirmations back into a single notification to
//! whoever called it. Implements [`NsaProvider`] exactly like
//! `nsa_backend::LocalBackend` does, so the registry can resolve either
//! behind the same trait object (spec §9's recursive self-dispatch), and
//! [`NsaRequester`] to receive the confirmations its own fan-out calls
//! provoke.
//!
//! Grounded on `opennsa/aggregator.py` (fan-out/fan-in structure,
//! `_genericFailure` aggregation) and `opennsa/nsiaggregator.py`
//! (query/summary join). Unlike the Local Backend, whose children are
//! calendar bookings it owns outright, the Aggregator's children are
//! other providers reached only through their asynchronous interface —
//! so the join is not a synchronous return value but a counter that
//! advances as confirmations arrive (spec §9's Deferred Confirmation
//! Join design note).

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use nsa_persistence::{ConnectionStore, ServiceConnectionRecord, SubConnectionRecord};
use nsa_protocol::notification::{Notification, QuerySummaryResult, ReserveConfirmedCriteria};
use nsa_protocol::{Header, NsaProvider, NsaRequester, ReserveRequest};
use nsa_registry::ProviderRegistry;
use nsa_state::{aggregate_dataplane, aggregate_uniform, ConnectionState, DataPlaneStatus, LifecycleState, ProvisionState, ReservationState};
use nsa_topology::Topology;
use nsa_types::{ChildOutcome, NsaError};
use parking_lot::Mutex as SyncMutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinSet;

fn transition_err<T: std::fmt::Debug>(axis: &'static str) -> impl Fn((T, T)) -> NsaError {
    move |(from, to)| NsaError::StateTransition {
        axis,
        from: format!("{from:?}"),
        to: format!("{to:?}"),
    }
}

/// Same rule as `nsa_backend::backend::terminate_lifecycle`: `Terminated`
/// is reachable from any prior state, taking the `Terminating` hop only
/// when coming from `Created` (spec §4.2).
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

/// Which axis a fan-out operation (other than `reserve`, which has its
/// own bespoke join) advances once every child confirms.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum JoinOp {
    Reserve,
    Commit,
    Abort,
    Provision,
    Release,
    Terminate,
}

/// The five operations fanned out through [`Aggregator::fan_out_simple`].
/// `reserve` has its own method since it creates sub-connections rather
/// than replaying calls against ones that already exist.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum SimpleOp {
    Commit,
    Abort,
    Provision,
    Release,
    Terminate,
}

impl SimpleOp {
    fn label(self) -> &'static str {
        match self {
            SimpleOp::Commit => "reserve_commit",
            SimpleOp::Abort => "reserve_abort",
            SimpleOp::Provision => "provision",
            SimpleOp::Release => "release",
            SimpleOp::Terminate => "terminate",
        }
    }

    fn join_op(self) -> JoinOp {
        match self {
            SimpleOp::Commit => JoinOp::Commit,
            SimpleOp::Abort => JoinOp::Abort,
            SimpleOp::Provision => JoinOp::Provision,
            SimpleOp::Release => JoinOp::Release,
            SimpleOp::Terminate => JoinOp::Terminate,
        }
    }

    async fn call(self, handle: &Arc<dyn NsaProvider>, header: Header, connection_id: &str) -> Result<(), NsaError> {
        match self {
            SimpleOp::Commit => handle.reserve_commit(header, connection_id).await,
            SimpleOp::Abort => handle.reserve_abort(header, connection_id).await,
            SimpleOp::Provision => handle.provision(header, connection_id).await,
            SimpleOp::Release => handle.release(header, connection_id).await,
            SimpleOp::Terminate => handle.terminate(header, connection_id).await,
        }
    }
}

/// Tracks confirmations for one in-flight fan-out against one parent
/// connection. Keyed by `(provider_nsa, child_connection_id)` since a
/// child's own connection id is only unique within its provider.
struct PendingJoin {
    op: JoinOp,
    expected: HashSet<(String, String)>,
    confirmed: HashSet<(String, String)>,
}

pub struct Aggregator {
    local_nsa_urn: String,
    registry: Arc<ProviderRegistry>,
    topology: Arc<Topology>,
    store: Arc<dyn ConnectionStore>,
    requester: Arc<dyn NsaRequester>,
    downstream_timeout: Duration,
    /// Serializes operations per parent connection, same discipline as
    /// the Local Backend's `locks` (spec §4.2's note on
    /// `ReservationState::ReserveChecking`).
    locks: DashMap<String, Arc<AsyncMutex<()>>>,
    /// One entry per parent connection with a fan-out currently awaiting
    /// confirmation. Lives only in memory: a restart mid-join is left
    /// for operator-driven recovery (SPEC_FULL.md §D.4), not replayed
    /// automatically.
    joins: DashMap<String, SyncMutex<PendingJoin>>,
}

impl Aggregator {
    pub fn new(
        local_nsa_urn: impl Into<String>,
        registry: Arc<ProviderRegistry>,
        topology: Arc<Topology>,
        store: Arc<dyn ConnectionStore>,
        requester: Arc<dyn NsaRequester>,
        downstream_timeout: Duration,
    ) -> Self {
        Aggregator {
            local_nsa_urn: local_nsa_urn.into(),
            registry,
            topology,
            store,
            requester,
            downstream_timeout,
            locks: DashMap::new(),
            joins: DashMap::new(),
        }
    }

    /// Delivers a notification without making the caller wait for it,
    /// same reasoning as `LocalBackend::notify_async`: the ack a
    /// fan-out call returns and the confirmation that follows it are
    /// two distinct events (spec §4.7 step 7).
    fn notify_async(&self, header: Header, notification: Notification) {
        let requester = self.requester.clone();
        tokio::spawn(async move {
            requester.notify(header, notification).await;
        });
    }

    fn lock_for(&self, connection_id: &str) -> Arc<AsyncMutex<()>> {
        self.locks
            .entry(connection_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Records that one expected child has confirmed `op` for `parent_id`.
    /// Returns `true` exactly once per join, the moment the last expected
    /// child confirms.
    fn mark_confirmed(&self, parent_id: &str, provider_nsa: &str, child_connection_id: &str, op: JoinOp) -> bool {
        let Some(entry) = self.joins.get(parent_id) else {
            tracing::debug!(parent_id, provider_nsa, child_connection_id, ?op, "no pending join for this connection; ignoring confirmation");
            return false;
        };
        let mut join = entry.lock();
        if join.op != op {
            tracing::warn!(parent_id, expected = ?join.op, got = ?op, "join operation mismatch, ignoring confirmation");
            return false;
        }
        join.confirmed.insert((provider_nsa.to_string(), child_connection_id.to_string()));
        join.confirmed.is_superset(&join.expected)
    }

    /// Computes the path, resolves every segment's provider, persists the
    /// parent, and fans the reservation out one child per link (spec
    /// §4.7 steps 1-7).
    async fn do_reserve(&self, header: Header, request: ReserveRequest) -> Result<String, NsaError> {
        let connection_id = format!("urn:uuid:{}", uuid::Uuid::new_v4());
        let guard = self.lock_for(&connection_id);
        let _held = guard.lock().await;

        let mut paths = self.topology.find_paths(&request.source_stp, &request.dest_stp, Some(request.bandwidth))?;
        if paths.is_empty() {
            return Err(NsaError::Topology(format!(
                "no path from {} to {}",
                request.source_stp.urn(),
                request.dest_stp.urn()
            )));
        }
        let path = paths.remove(0);

        // Resolve every segment's provider up front so a missing
        // registration fails the whole reservation before any child has
        // been dialed, rather than requiring compensation for none.
        let mut providers = Vec::with_capacity(path.links.len());
        for link in &path.links {
            let network = self.topology.get_network(&link.network_id)?;
            let handle = self.registry.resolve(&network.managing_nsa).await?;
            providers.push((network.managing_nsa, handle));
        }

        let reservation = ReservationState::ReserveStart
            .transition(ReservationState::ReserveChecking)
            .map_err(transition_err("reservation"))?;
        let parent = ServiceConnectionRecord {
            connection_id: connection_id.clone(),
            global_reservation_id: request.global_reservation_id.clone(),
            description: request.description.clone(),
            requester_nsa: header.requester_nsa_urn.clone(),
            requester_reply_url: header.reply_to_url.clone(),
            source_stp: request.source_stp.clone(),
            dest_stp: request.dest_stp.clone(),
            start_time: request.start_time,
            end_time: request.end_time,
            bandwidth: request.bandwidth,
            state: ConnectionState {
                reservation,
                // Set at creation, not deferred to the commit join
                // (spec §4.6 step 3; `simplebackend.py` sets `SCHEDULED`
                // the same way, before any commit call exists).
                provision: ProvisionState::Scheduled,
                lifecycle: LifecycleState::Initial,
                dataplane: Default::default(),
            },
            created_at: Utc::now(),
            sub_connection_ids: vec![],
        };
        self.store.put_service_connection(parent).await?;

        let mut join_set = JoinSet::new();
        for (order_id, (link, (provider_nsa, handle))) in path.links.iter().cloned().zip(providers.into_iter()).enumerate() {
            let segment = ReserveRequest {
                connection_id: None,
                global_reservation_id: request.global_reservation_id.clone(),
                description: request.description.clone(),
                source_stp: link.source_stp(),
                dest_stp: link.dest_stp(),
                start_time: request.start_time,
                end_time: request.end_time,
                bandwidth: request.bandwidth,
            };
            let child_header = header.for_downstream(&provider_nsa, &header.reply_to_url);
            let timeout = self.downstream_timeout;
            join_set.spawn(async move {
                let outcome = tokio::time::timeout(timeout, handle.reserve(child_header, segment)).await;
                (order_id, provider_nsa, link, outcome)
            });
        }

        let mut results = Vec::with_capacity(path.links.len());
        while let Some(joined) = join_set.join_next().await {
            results.push(joined.expect("reserve fan-out task panicked"));
        }
        results.sort_by_key(|(order_id, ..)| *order_id);

        let mut outcomes = Vec::with_capacity(results.len());
        let mut successes = Vec::new();
        for (order_id, provider_nsa, link, outcome) in results {
            match outcome {
                Ok(Ok(child_id)) => {
                    outcomes.push(ChildOutcome {
                        provider_nsa: provider_nsa.clone(),
                        error: None,
                    });
                    successes.push((order_id, provider_nsa, link, child_id));
                }
                Ok(Err(e)) => outcomes.push(ChildOutcome {
                    provider_nsa,
                    error: Some(Box::new(e)),
                }),
                Err(_) => outcomes.push(ChildOutcome {
                    provider_nsa,
                    error: Some(Box::new(NsaError::CallbackTimeout(self.downstream_timeout))),
                }),
            }
        }

        if outcomes.iter().any(|c| c.error.is_some()) {
            for (_, provider_nsa, _, child_id) in &successes {
                if let Ok(handle) = self.registry.resolve(provider_nsa).await {
                    let term_header = header.for_downstream(provider_nsa, &header.reply_to_url);
                    if let Err(e) = handle.terminate(term_header, child_id).await {
                        tracing::warn!(provider_nsa, child_id, error = %e, "compensation terminate of a partially reserved segment failed");
                    }
                }
            }
            let mut parent = self.store.get_service_connection(&connection_id).await?;
            parent.state.lifecycle = terminate_lifecycle(parent.state.lifecycle)?;
            self.store.put_service_connection(parent).await?;
            return Err(NsaError::aggregate("reserve", outcomes));
        }

        let mut expected = HashSet::with_capacity(successes.len());
        let mut sub_ids = Vec::with_capacity(successes.len());
        for (order_id, provider_nsa, link, child_id) in &successes {
            let sub = SubConnectionRecord {
                connection_id: child_id.clone(),
                service_connection_id: connection_id.clone(),
                global_reservation_id: request.global_reservation_id.clone(),
                description: request.description.clone(),
                provider_nsa: provider_nsa.clone(),
                order_id: *order_id as u32,
                local_link: *provider_nsa == self.local_nsa_urn,
                source_stp: link.source_stp(),
                dest_stp: link.dest_stp(),
                start_time: request.start_time,
                end_time: request.end_time,
                bandwidth: request.bandwidth,
                state: ConnectionState {
                    reservation: ReservationState::ReserveChecking,
                    provision: ProvisionState::Released,
                    lifecycle: LifecycleState::Initial,
                    dataplane: Default::default(),
                },
                created_at: Utc::now(),
            };
            self.store.put_sub_connection(sub).await?;
            expected.insert((provider_nsa.clone(), child_id.clone()));
            sub_ids.push(child_id.clone());
        }

        let mut parent = self.store.get_service_connection(&connection_id).await?;
        parent.sub_connection_ids = sub_ids;
        self.store.put_service_connection(parent).await?;

        self.joins.insert(
            connection_id.clone(),
            SyncMutex::new(PendingJoin {
                op: JoinOp::Reserve,
                expected,
                confirmed: HashSet::new(),
            }),
        );

        Ok(connection_id)
    }

    /// Fans `op` out to every sub-connection of `connection_id`,
    /// returning once every child has acked receipt; the actual
    /// completion is joined later from each child's confirmation
    /// notification.
    async fn fan_out_simple(
        &self,
        header: Header,
        connection_id: &str,
        op: SimpleOp,
        pre: impl FnOnce(&mut ConnectionState) -> Result<(), NsaError>,
    ) -> Result<(), NsaError> {
        let guard = self.lock_for(connection_id);
        let _held = guard.lock().await;

        let mut parent = self.store.get_service_connection(connection_id).await?;
        pre(&mut parent.state)?;
        self.store.put_service_connection(parent).await?;

        let children = self.store.sub_connections_of(connection_id).await?;
        if children.is_empty() {
            return Err(NsaError::Internal(format!(
                "connection {connection_id} has no sub-connections to {}",
                op.label()
            )));
        }

        let mut expected = HashSet::with_capacity(children.len());
        let mut join_set = JoinSet::new();
        for child in &children {
            let handle = self.registry.resolve(&child.provider_nsa).await?;
            let child_header = header.for_downstream(&child.provider_nsa, &header.reply_to_url);
            let child_id = child.connection_id.clone();
            let provider_nsa = child.provider_nsa.clone();
            expected.insert((provider_nsa.clone(), child_id.clone()));
            let timeout = self.downstream_timeout;
            join_set.spawn(async move {
                let outcome = tokio::time::timeout(timeout, op.call(&handle, child_header, &child_id)).await;
                (provider_nsa, outcome)
            });
        }

        let mut outcomes = Vec::with_capacity(children.len());
        while let Some(res) = join_set.join_next().await {
            let (provider_nsa, outcome) = res.expect("fan-out task panicked");
            let error = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(Box::new(e)),
                Err(_) => Some(Box::new(NsaError::CallbackTimeout(self.downstream_timeout))),
            };
            outcomes.push(ChildOutcome { provider_nsa, error });
        }

        if outcomes.iter().any(|c| c.error.is_some()) {
            return Err(NsaError::aggregate(op.label(), outcomes));
        }

        self.joins.insert(
            connection_id.to_string(),
            SyncMutex::new(PendingJoin {
                op: op.join_op(),
                expected,
                confirmed: HashSet::new(),
            }),
        );
        Ok(())
    }

    async fn on_reserve_confirmed(&self, provider_nsa: &str, child_connection_id: &str, criteria: ReserveConfirmedCriteria) -> Result<(), NsaError> {
        let mut child = self.store.get_sub_connection(provider_nsa, child_connection_id).await?;
        child.state.reservation = ReservationState::ReserveHeld;
        child.source_stp = criteria.source_stp;
        child.dest_stp = criteria.dest_stp;
        let parent_id = child.service_connection_id.clone();
        self.store.put_sub_connection(child).await?;

        if !self.mark_confirmed(&parent_id, provider_nsa, child_connection_id, JoinOp::Reserve) {
            return Ok(());
        }
        self.joins.remove(&parent_id);

        let children = self.store.sub_connections_of(&parent_id).await?;
        let states: Vec<ReservationState> = children.iter().map(|c| c.state.reservation).collect();
        if aggregate_uniform(&states) != Some(ReservationState::ReserveHeld) {
            tracing::warn!(parent_id, "reserve join completed but children are not uniformly held");
            return Ok(());
        }

        let mut parent = self.store.get_service_connection(&parent_id).await?;
        if let Some(first) = children.iter().find(|c| c.order_id == 0) {
            parent.source_stp = first.source_stp.clone();
        }
        if let Some(last) = children.iter().max_by_key(|c| c.order_id) {
            parent.dest_stp = last.dest_stp.clone();
        }
        parent.state.reservation = parent
            .state
            .reservation
            .transition(ReservationState::ReserveHeld)
            .map_err(transition_err("reservation"))?;

        let header = Header::new(&self.local_nsa_urn, &parent.requester_nsa, &parent.requester_reply_url);
        let confirmed = Notification::ReserveConfirmed {
            connection_id: parent_id.clone(),
            criteria: ReserveConfirmedCriteria {
                source_stp: parent.source_stp.clone(),
                dest_stp: parent.dest_stp.clone(),
                start_time: parent.start_time,
                end_time: parent.end_time,
                bandwidth: parent.bandwidth,
            },
        };
        self.store.put_service_connection(parent).await?;
        self.notify_async(header, confirmed);
        Ok(())
    }

    /// Join completion for commit/abort/provision/release/terminate: the
    /// parent advances only once every child has confirmed (spec §3's
    /// parent/child aggregation rule).
    async fn on_uniform_confirmation(&self, provider_nsa: &str, child_connection_id: &str, op: JoinOp) -> Result<(), NsaError> {
        let child = self.store.get_sub_connection(provider_nsa, child_connection_id).await?;
        let parent_id = child.service_connection_id.clone();

        if !self.mark_confirmed(&parent_id, provider_nsa, child_connection_id, op) {
            return Ok(());
        }
        self.joins.remove(&parent_id);

        let mut parent = self.store.get_service_connection(&parent_id).await?;
        let notification = match op {
            JoinOp::Commit => {
                parent.state.reservation = parent
                    .state
                    .reservation
                    .transition(ReservationState::ReserveStart)
                    .map_err(transition_err("reservation"))?;
                parent.state.lifecycle = parent
                    .state
                    .lifecycle
                    .transition(LifecycleState::Created)
                    .map_err(transition_err("lifecycle"))?;
                Notification::ReserveCommitConfirmed {
                    connection_id: parent_id.clone(),
                }
            }
            JoinOp::Abort => {
                parent.state.reservation = parent
                    .state
                    .reservation
                    .transition(ReservationState::ReserveStart)
                    .map_err(transition_err("reservation"))?;
                parent.state.lifecycle = terminate_lifecycle(parent.state.lifecycle)?;
                Notification::ReserveAbortConfirmed {
                    connection_id: parent_id.clone(),
                }
            }
            JoinOp::Provision => Notification::ProvisionConfirmed {
                connection_id: parent_id.clone(),
            },
            JoinOp::Release => {
                parent.state.provision = ProvisionState::Released;
                Notification::ReleaseConfirmed {
                    connection_id: parent_id.clone(),
                }
            }
            JoinOp::Terminate => {
                parent.state.lifecycle = terminate_lifecycle(parent.state.lifecycle)?;
                Notification::TerminateConfirmed {
                    connection_id: parent_id.clone(),
                }
            }
            JoinOp::Reserve => unreachable!("reserve confirmations join through on_reserve_confirmed"),
        };

        let header = Header::new(&self.local_nsa_urn, &parent.requester_nsa, &parent.requester_reply_url);
        self.store.put_service_connection(parent).await?;
        self.notify_async(header, notification);
        Ok(())
    }

    /// A data-plane change at any child recomputes the parent's
    /// aggregated tuple immediately; unlike the other axes this one has
    /// no all-children barrier (spec §3).
    async fn on_dataplane_change(&self, provider_nsa: &str, child_connection_id: &str, status: DataPlaneStatus) -> Result<(), NsaError> {
        let mut child = self.store.get_sub_connection(provider_nsa, child_connection_id).await?;
        child.state.dataplane = status;
        let parent_id = child.service_connection_id.clone();
        self.store.put_sub_connection(child).await?;

        let children = self.store.sub_connections_of(&parent_id).await?;
        let statuses: Vec<DataPlaneStatus> = children.iter().map(|c| c.state.dataplane).collect();
        let aggregated = aggregate_dataplane(&statuses);

        let mut parent = self.store.get_service_connection(&parent_id).await?;
        parent.state.dataplane = aggregated;
        let header = Header::new(&self.local_nsa_urn, &parent.requester_nsa, &parent.requester_reply_url);
        self.store.put_service_connection(parent).await?;
        self.notify_async(
            header,
            Notification::DataPlaneStateChange {
                connection_id: parent_id,
                status: aggregated,
            },
        );
        Ok(())
    }

    /// `ReserveTimeout`/`ErrorEvent`/`ReserveCommitFailed` have no
    /// well-defined aggregation across several children (SPEC_FULL.md
    /// §D.1): propagate unchanged for a single-child connection, refuse
    /// and log for a multi-child one rather than guess.
    async fn on_single_child_notification(
        &self,
        provider_nsa: &str,
        child_connection_id: &str,
        build: impl FnOnce(String) -> Notification,
    ) -> Result<(), NsaError> {
        let child = self.store.get_sub_connection(provider_nsa, child_connection_id).await?;
        let parent_id = child.service_connection_id.clone();
        let siblings = self.store.sub_connections_of(&parent_id).await?;
        if siblings.len() != 1 {
            tracing::warn!(
                parent_id,
                provider_nsa,
                child_connection_id,
                "refusing to propagate a single-child notification across a multi-child connection (SPEC_FULL.md §D.1)"
            );
            return Ok(());
        }
        let parent = self.store.get_service_connection(&parent_id).await?;
        let header = Header::new(&self.local_nsa_urn, &parent.requester_nsa, &parent.requester_reply_url);
        self.notify_async(header, build(parent_id));
        Ok(())
    }
}

#[async_trait]
impl NsaProvider for Aggregator {
    async fn reserve(&self, header: Header, request: ReserveRequest) -> Result<String, NsaError> {
        if let Some(existing) = &request.connection_id {
            return match self.store.get_service_connection(existing).await {
                Ok(_) => Err(NsaError::ConnectionExists(existing.clone())),
                Err(_) => Err(NsaError::Payload("reservation modification is not supported".into())),
            };
        }
        self.do_reserve(header, request).await
    }

    async fn reserve_commit(&self, header: Header, connection_id: &str) -> Result<(), NsaError> {
        self.fan_out_simple(header, connection_id, SimpleOp::Commit, |state| {
            state.reservation = state
                .reservation
                .transition(ReservationState::ReserveCommitting)
                .map_err(transition_err("reservation"))?;
            Ok(())
        })
        .await
    }

    async fn reserve_abort(&self, header: Header, connection_id: &str) -> Result<(), NsaError> {
        self.fan_out_simple(header, connection_id, SimpleOp::Abort, |state| {
            state.reservation = state
                .reservation
                .transition(ReservationState::ReserveAborting)
                .map_err(transition_err("reservation"))?;
            Ok(())
        })
        .await
    }

    async fn provision(&self, header: Header, connection_id: &str) -> Result<(), NsaError> {
        // Checked here rather than left to the children alone: a child
        // provider enforces this against its own clock, but the parent
        // is the one holding `end_time` for the aggregated connection,
        // and should refuse before dialing out rather than after a
        // partial fan-out.
        let parent = self.store.get_service_connection(connection_id).await?;
        if parent.end_time <= Utc::now() {
            return Err(NsaError::ConnectionGone {
                connection_id: connection_id.to_string(),
                reason: "end time has passed".into(),
            });
        }
        self.fan_out_simple(header, connection_id, SimpleOp::Provision, |_state| Ok(())).await
    }

    async fn release(&self, header: Header, connection_id: &str) -> Result<(), NsaError> {
        self.fan_out_simple(header, connection_id, SimpleOp::Release, |_state| Ok(())).await
    }

    async fn terminate(&self, header: Header, connection_id: &str) -> Result<(), NsaError> {
        {
            let guard = self.lock_for(connection_id);
            let _held = guard.lock().await;
            let parent = self.store.get_service_connection(connection_id).await?;
            if parent.state.lifecycle.is_terminal() {
                return Ok(());
            }
        }
        self.fan_out_simple(header, connection_id, SimpleOp::Terminate, |_state| Ok(())).await
    }

    async fn query_summary(&self, header: Header, connection_ids: Vec<String>) -> Result<(), NsaError> {
        let results = self.query_summary_sync(header.clone(), connection_ids).await?;
        self.notify_async(header, Notification::QuerySummaryConfirmed { results });
        Ok(())
    }

    async fn query_summary_sync(&self, _header: Header, connection_ids: Vec<String>) -> Result<Vec<QuerySummaryResult>, NsaError> {
        let mut out = Vec::with_capacity(connection_ids.len());
        for connection_id in connection_ids {
            let parent = self.store.get_service_connection(&connection_id).await?;
            let children = self.store.sub_connections_of(&connection_id).await?;
            out.push(QuerySummaryResult {
                connection_id,
                state: parent.state,
                child_states: children.into_iter().map(|c| (c.connection_id, c.state)).collect(),
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl NsaRequester for Aggregator {
    async fn notify(&self, header: Header, notification: Notification) {
        let provider_nsa = header.provider_nsa_urn.clone();
        let result = match notification {
            Notification::ReserveConfirmed { connection_id, criteria } => self.on_reserve_confirmed(&provider_nsa, &connection_id, criteria).await,
            Notification::ReserveFailed { connection_id, error } => {
                self.on_single_child_notification(&provider_nsa, &connection_id, move |parent_id| Notification::ReserveFailed {
                    connection_id: parent_id,
                    error,
                })
                .await
            }
            Notification::ReserveCommitConfirmed { connection_id } => self.on_uniform_confirmation(&provider_nsa, &connection_id, JoinOp::Commit).await,
            Notification::ReserveAbortConfirmed { connection_id } => self.on_uniform_confirmation(&provider_nsa, &connection_id, JoinOp::Abort).await,
            Notification::ProvisionConfirmed { connection_id } => self.on_uniform_confirmation(&provider_nsa, &connection_id, JoinOp::Provision).await,
            Notification::ReleaseConfirmed { connection_id } => self.on_uniform_confirmation(&provider_nsa, &connection_id, JoinOp::Release).await,
            Notification::TerminateConfirmed { connection_id } => self.on_uniform_confirmation(&provider_nsa, &connection_id, JoinOp::Terminate).await,
            Notification::DataPlaneStateChange { connection_id, status } => self.on_dataplane_change(&provider_nsa, &connection_id, status).await,
            Notification::ReserveTimeout { connection_id, held_since, timeout } => {
                self.on_single_child_notification(&provider_nsa, &connection_id, move |parent_id| Notification::ReserveTimeout {
                    connection_id: parent_id,
                    held_since,
                    timeout,
                })
                .await
            }
            Notification::ErrorEvent { connection_id, error } => {
                self.on_single_child_notification(&provider_nsa, &connection_id, move |parent_id| Notification::ErrorEvent {
                    connection_id: parent_id,
                    error,
                })
                .await
            }
            Notification::ReserveCommitFailed { connection_id, error } => {
                self.on_single_child_notification(&provider_nsa, &connection_id, move |parent_id| Notification::ReserveCommitFailed {
                    connection_id: parent_id,
                    error,
                })
                .await
            }
            Notification::QuerySummaryConfirmed { .. } => Ok(()),
        };
        if let Err(e) = result {
            tracing::warn!(provider_nsa, error = %e, "failed to process child notification");
        }
    }
}
