// SPDX-License-Identifier: MIT OR Apache-2.0

//! The synchronization protocol and the public API built on top of the state machine.

use tracing::{debug, trace, warn};

use crate::codec::PayloadCodec;
use crate::connection::{Connection, ConnectionStatus};
use crate::error::SessionError;
use crate::user::UserProperties;
use crate::xml::XmlNode;

use super::events::SessionEvent;
use super::outbound::{OutboundSync, SynchronizationStatus};
use super::state::{RunningState, StatePayload};
use super::{Session, SessionStatus};

mod wire {
    pub const SYNC_BEGIN: &str = "sync-begin";
    pub const SYNC_END: &str = "sync-end";
    pub const SYNC_CANCEL: &str = "sync-cancel";
    pub const SYNC_ERROR: &str = "sync-error";
}

mod wire_attrs {
    pub const NUM_MESSAGES: &str = "num-messages";
    pub const DOMAIN: &str = "domain";
    pub const CODE: &str = "code";
}

impl<Conn: Connection, C: PayloadCodec<Conn>> Session<Conn, C> {
    pub(crate) async fn handle_received(&mut self, connection: &Conn, node: XmlNode) {
        match self.status {
            SessionStatus::Closed => {
                trace!(tag = node.tag(), "ignoring message on closed session");
            }
            SessionStatus::Synchronizing => {
                let is_sync_connection = self
                    .state
                    .synchronizing()
                    .is_some_and(|s| &s.connection == connection);
                if is_sync_connection {
                    self.handle_sync_message(connection, node).await;
                } else {
                    trace!("ignoring message from a connection other than the sync source");
                }
            }
            SessionStatus::Running => {
                self.handle_running_message(connection, node).await;
            }
        }
    }

    async fn handle_sync_message(&mut self, connection: &Conn, node: XmlNode) {
        match node.tag() {
            wire::SYNC_BEGIN => self.handle_sync_begin(connection, &node).await,
            wire::SYNC_CANCEL => {
                self.fail_synchronizing(connection, SessionError::SenderCancelled, false)
                    .await;
            }
            wire::SYNC_END => self.handle_sync_end(connection).await,
            _ => self.handle_sync_body(connection, node).await,
        }
    }

    async fn handle_sync_begin(&mut self, connection: &Conn, node: &XmlNode) {
        let already_begun = self
            .state
            .synchronizing()
            .is_some_and(|s| s.messages_total > 0);
        if already_begun {
            self.fail_synchronizing(connection, SessionError::UnexpectedBeginOfSync, true)
                .await;
            return;
        }

        let Some(num_messages) = node.attribute_u64(wire_attrs::NUM_MESSAGES) else {
            self.fail_synchronizing(connection, SessionError::NumMessagesMissing, true)
                .await;
            return;
        };

        if let Some(state) = self.state.synchronizing_mut() {
            state.messages_total = 2 + num_messages;
            state.messages_received = 1;
        }

        debug!(num_messages, "sync-begin accepted");
        let progress = self.sync_progress();
        self.emit(SessionEvent::SynchronizationProgress(
            connection.clone(),
            progress,
        ));
    }

    async fn handle_sync_end(&mut self, connection: &Conn) {
        let Some(state) = self.state.synchronizing() else {
            return;
        };

        if state.messages_total == 0 || state.messages_received != state.messages_total - 1 {
            self.fail_synchronizing(connection, SessionError::UnexpectedEndOfSync, true)
                .await;
            return;
        }

        self.complete_synchronizing(connection).await;
    }

    async fn handle_sync_body(&mut self, connection: &Conn, node: XmlNode) {
        let Some(state) = self.state.synchronizing() else {
            return;
        };
        let (total, received) = (state.messages_total, state.messages_received);

        if received == 0 {
            self.fail_synchronizing(connection, SessionError::ExpectedBeginOfSync, true)
                .await;
            return;
        }

        if received == total.saturating_sub(1) {
            self.fail_synchronizing(connection, SessionError::ExpectedEndOfSync, true)
                .await;
            return;
        }

        let codec = self.codec.clone();
        match codec.process_sync_message(self, connection, &node) {
            Ok(()) => {
                if let Some(state) = self.state.synchronizing_mut() {
                    state.messages_received += 1;
                }
                let progress = self.sync_progress();
                self.emit(SessionEvent::SynchronizationProgress(
                    connection.clone(),
                    progress,
                ));
            }
            Err(error) => {
                self.fail_synchronizing(connection, error, true).await;
            }
        }
    }

    fn sync_progress(&self) -> f64 {
        self.state
            .synchronizing()
            .map(|s| s.messages_received as f64 / s.messages_total as f64)
            .unwrap_or(0.0)
    }

    /// On any protocol error during Synchronizing: optionally send `sync-error` (skipped for a
    /// remote `sync-cancel`, which means the peer has already given up), emit sync-failed,
    /// release the connection, and transition to Closed.
    async fn fail_synchronizing(&mut self, connection: &Conn, error: SessionError, send_error: bool) {
        warn!(%error, "synchronization failed");

        if send_error {
            let node = XmlNode::new(wire::SYNC_ERROR)
                .with_attribute(wire_attrs::DOMAIN, SessionError::DOMAIN)
                .with_attribute(wire_attrs::CODE, error.code().to_string());
            if let Err(error) = self.connection_manager.send(connection, node).await {
                warn!(%error, "failed to send sync-error while failing synchronization");
            }
        }

        self.emit(SessionEvent::SynchronizationFailed(
            connection.clone(),
            error,
        ));

        if let Some(state) = self.state.synchronizing() {
            let identifier = state.identifier.clone();
            self.release_connection(connection, &identifier);
        }

        self.state = StatePayload::Closed;
        self.set_status(SessionStatus::Closed);
    }

    async fn complete_synchronizing(&mut self, connection: &Conn) {
        debug!("synchronization complete");
        self.emit(SessionEvent::SynchronizationComplete(connection.clone()));

        if let Some(state) = self.state.synchronizing() {
            let identifier = state.identifier.clone();
            self.release_connection(connection, &identifier);
        }

        self.state = StatePayload::Running(RunningState::default());
        self.set_status(SessionStatus::Running);
    }

    async fn handle_running_message(&mut self, connection: &Conn, node: XmlNode) {
        if node.tag() == wire::SYNC_ERROR && self.find_outbound_sync(connection).is_some() {
            self.handle_remote_sync_error(connection, &node);
            return;
        }

        let codec = self.codec.clone();
        codec.process_run_message(self, connection, &node);
    }

    fn handle_remote_sync_error(&mut self, connection: &Conn, node: &XmlNode) {
        if let Some(sync) = self.find_outbound_sync(connection) {
            self.connection_manager
                .cancel_outer(connection, sync.identifier());
        }

        let domain = node.attribute(wire_attrs::DOMAIN).unwrap_or_default();
        let error = match node.attribute_u64(wire_attrs::CODE) {
            Some(code) => SessionError::from_domain_and_code(domain, code as u32),
            None => SessionError::Failed("sync-error is missing its code attribute".to_string()),
        };

        self.fail_outbound_sync(connection, error);
    }

    fn fail_outbound_sync(&mut self, connection: &Conn, error: SessionError) {
        self.emit(SessionEvent::SynchronizationFailed(
            connection.clone(),
            error,
        ));

        let removed = self.state.running_mut().and_then(|state| {
            let pos = state.syncs.iter().position(|s| s.connection() == connection)?;
            Some(state.syncs.remove(pos))
        });

        if let Some(sync) = removed {
            let identifier = sync.identifier().to_string();
            self.release_connection(connection, &identifier);
        }
    }

    pub(crate) fn handle_sent(&mut self, connection: &Conn, _node: &XmlNode) {
        let Some(state) = self.state.running_mut() else {
            return;
        };
        let Some(pos) = state.syncs.iter().position(|s| s.connection() == connection) else {
            return;
        };

        state.syncs[pos].messages_sent += 1;
        let (sent, total) = (state.syncs[pos].messages_sent, state.syncs[pos].messages_total);

        if sent < total {
            self.emit(SessionEvent::SynchronizationProgress(
                connection.clone(),
                sent as f64 / total as f64,
            ));
        } else {
            let sync = state.syncs.remove(pos);
            self.emit(SessionEvent::SynchronizationComplete(connection.clone()));
            let identifier = sync.identifier().to_string();
            self.release_connection(connection, &identifier);
        }
    }

    pub(crate) fn handle_enqueued(&mut self, connection: &Conn, node: &XmlNode) {
        if node.tag() != wire::SYNC_END {
            return;
        }
        if let Some(state) = self.state.running_mut() {
            if let Some(sync) = state.syncs.iter_mut().find(|s| s.connection() == connection) {
                sync.end_enqueued = true;
            }
        }
    }

    fn find_outbound_sync(&self, connection: &Conn) -> Option<&OutboundSync<Conn>> {
        self.state
            .running()
            .and_then(|state| state.syncs.iter().find(|s| s.connection() == connection))
    }

    /// Begin an outbound synchronization to `connection`, registered as a NetObject under
    /// `identifier`. Sends `sync-begin`, the codec's snapshot body, then `sync-end`; a transport
    /// failure at any of the three steps abandons the attempt and emits sync-failed, the same
    /// path used for a failure discovered later via `sent`/`enqueued`/connection-status.
    pub async fn synchronize_to(&mut self, connection: Conn, identifier: impl Into<String>) {
        debug_assert_eq!(
            self.status,
            SessionStatus::Running,
            "synchronize_to requires a Running session"
        );
        let identifier = identifier.into();
        debug_assert!(
            self.find_outbound_sync(&connection).is_none(),
            "connection already has an outbound synchronization"
        );

        self.connection_manager
            .register(connection.clone(), identifier.clone());

        let codec = self.codec.clone();
        let body = codec.emit_snapshot(self);
        let messages_total = 2 + body.len() as u64;

        if let Some(state) = self.state.running_mut() {
            state.syncs.push(OutboundSync {
                connection: connection.clone(),
                identifier,
                messages_total,
                messages_sent: 0,
                end_enqueued: false,
            });
        }

        let begin = XmlNode::new(wire::SYNC_BEGIN)
            .with_attribute(wire_attrs::NUM_MESSAGES, (messages_total - 2).to_string());
        if let Err(error) = self.connection_manager.send(&connection, begin).await {
            warn!(%error, "failed to send sync-begin");
            self.fail_outbound_sync(&connection, SessionError::ConnectionClosed);
            return;
        }

        if !body.is_empty() {
            if let Err(error) = self.connection_manager.send_multiple(&connection, body).await {
                warn!(%error, "failed to send synchronization body");
                self.fail_outbound_sync(&connection, SessionError::ConnectionClosed);
                return;
            }
        }

        let end = XmlNode::new(wire::SYNC_END);
        if let Err(error) = self.connection_manager.send(&connection, end).await {
            warn!(%error, "failed to send sync-end");
            self.fail_outbound_sync(&connection, SessionError::ConnectionClosed);
        }
    }

    /// Tear down the session. Synchronizing sends `sync-error(ReceiverCancelled)` to the inbound
    /// connection; Running cancels and fails every OutboundSync whose `sync-end` hasn't already
    /// been enqueued, and just releases the rest. Double-close is a programming error.
    pub async fn close(&mut self) {
        debug_assert_ne!(self.status, SessionStatus::Closed, "session already closed");

        let codec = self.codec.clone();
        codec.close(self);

        match self.status {
            SessionStatus::Synchronizing => {
                if let Some(state) = self.state.synchronizing() {
                    let connection = state.connection.clone();
                    let identifier = state.identifier.clone();

                    let node = XmlNode::new(wire::SYNC_ERROR)
                        .with_attribute(wire_attrs::DOMAIN, SessionError::DOMAIN)
                        .with_attribute(
                            wire_attrs::CODE,
                            SessionError::ReceiverCancelled.code().to_string(),
                        );
                    if let Err(error) = self.connection_manager.send(&connection, node).await {
                        warn!(%error, "failed to send sync-error while closing");
                    }

                    self.emit(SessionEvent::SynchronizationFailed(
                        connection.clone(),
                        SessionError::ReceiverCancelled,
                    ));
                    self.release_connection(&connection, &identifier);
                }
            }
            SessionStatus::Running => {
                let syncs = self
                    .state
                    .running_mut()
                    .map(|state| std::mem::take(&mut state.syncs))
                    .unwrap_or_default();

                for sync in syncs {
                    if !sync.end_enqueued() {
                        self.connection_manager
                            .cancel_outer(sync.connection(), sync.identifier());
                        let node = XmlNode::new(wire::SYNC_CANCEL);
                        if let Err(error) = self.connection_manager.send(sync.connection(), node).await
                        {
                            warn!(%error, "failed to send sync-cancel while closing");
                        }
                        self.emit(SessionEvent::SynchronizationFailed(
                            sync.connection().clone(),
                            SessionError::ReceiverCancelled,
                        ));
                    }
                    self.release_connection(sync.connection(), sync.identifier());
                }
            }
            SessionStatus::Closed => unreachable!("double close guarded by debug_assert above"),
        }

        self.state = StatePayload::Closed;
        self.set_status(SessionStatus::Closed);
    }

    /// Invoked by the embedding application whenever a connection it owns reports a status
    /// transition. `Open` transitions are not actionable here.
    pub fn connection_status_changed(&mut self, connection: &Conn, status: ConnectionStatus) {
        if status == ConnectionStatus::Open {
            return;
        }

        match self.status {
            SessionStatus::Synchronizing => {
                let matches = self
                    .state
                    .synchronizing()
                    .is_some_and(|s| &s.connection == connection);
                if !matches {
                    return;
                }

                // Transition straight to Closed rather than delegating to `close`: by the time
                // this fires the link is already gone, so attempting `close`'s sync-error send
                // would just fail a second time.
                if let Some(state) = self.state.synchronizing() {
                    let identifier = state.identifier.clone();
                    self.emit(SessionEvent::SynchronizationFailed(
                        connection.clone(),
                        SessionError::ConnectionClosed,
                    ));
                    self.release_connection(connection, &identifier);
                }
                self.state = StatePayload::Closed;
                self.set_status(SessionStatus::Closed);
            }
            SessionStatus::Running => {
                let removed = self.state.running_mut().and_then(|state| {
                    let pos = state.syncs.iter().position(|s| s.connection() == connection)?;
                    Some(state.syncs.remove(pos))
                });
                if let Some(sync) = removed {
                    self.emit(SessionEvent::SynchronizationFailed(
                        connection.clone(),
                        SessionError::ConnectionClosed,
                    ));
                    let identifier = sync.identifier().to_string();
                    self.release_connection(connection, &identifier);
                }
            }
            SessionStatus::Closed => {}
        }
    }

    fn release_connection(&mut self, connection: &Conn, identifier: &str) {
        if self.connection_manager.is_registered(connection, identifier) {
            self.connection_manager.unregister(connection, identifier);
        }
    }

    /// Validate, construct and insert a user from externally-supplied properties (as opposed to
    /// one parsed off an inbound `sync-user` node, which goes through
    /// [`crate::codec::PayloadCodec::process_sync_message`] instead).
    pub fn add_user(&mut self, props: UserProperties) -> Result<C::User, SessionError> {
        let codec = self.codec.clone();
        codec.validate_user_properties(self, &props, None)?;
        let user = codec.construct_user(self, props)?;
        self.add_user_internal(user.clone());
        Ok(user)
    }

    pub(crate) fn add_user_internal(&mut self, user: C::User) {
        self.user_table.insert(user.clone());
        self.emit(SessionEvent::AddUser(user));
    }

    /// Remove the user stored under `id`, emitting `RemoveUser` with the owned record so
    /// observers can still read it as it leaves.
    pub fn remove_user(&mut self, id: u64) -> Option<C::User> {
        let user = self.user_table.remove(id)?;
        self.emit(SessionEvent::RemoveUser(user.clone()));
        Some(user)
    }

    pub fn lookup_user_by_id(&self, id: u64) -> Option<&C::User> {
        self.user_table.lookup_by_id(id)
    }

    pub fn lookup_user_by_name(&self, name: &str) -> Option<&C::User> {
        self.user_table.lookup_by_name(name)
    }

    pub fn foreach_user(&self, f: impl FnMut(&C::User)) {
        self.user_table.foreach(f);
    }

    pub fn get_synchronization_status(&self, connection: &Conn) -> SynchronizationStatus {
        match self.find_outbound_sync(connection) {
            None => SynchronizationStatus::None,
            Some(sync) if sync.end_enqueued() => SynchronizationStatus::EndEnqueued,
            Some(_) => SynchronizationStatus::InProgress,
        }
    }
}
