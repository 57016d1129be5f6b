// SPDX-License-Identifier: MIT OR Apache-2.0

//! The session entity: its state machine, its NetObject boundary, and the public API built on
//! top of them. The protocol logic itself lives in [`sync`]; this module only defines the type,
//! its constructor, and its accessors.

mod events;
mod outbound;
mod state;
mod sync;

pub use events::SessionEvent;
pub use outbound::{OutboundSync, SynchronizationStatus};
pub use state::SessionStatus;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::buffer::Buffer;
use crate::codec::PayloadCodec;
use crate::config::SessionConfig;
use crate::connection::{Connection, ConnectionManager};
use crate::user_table::UserTable;
use crate::xml::XmlNode;
use state::{StatePayload, SynchronizingState};

/// A collaborative session: state machine, user table, and the synchronization protocol that
/// transfers a snapshot of both between peers.
///
/// `Conn` is the caller-supplied connection handle type; `C` is the [`PayloadCodec`] adapting the
/// generic framing to a concrete document type.
#[derive(Debug)]
pub struct Session<Conn: Connection, C: PayloadCodec<Conn>> {
    pub(crate) connection_manager: Arc<dyn ConnectionManager<Conn>>,
    pub(crate) buffer: Arc<dyn Buffer>,
    pub(crate) codec: C,
    pub(crate) user_table: UserTable<C::User>,
    pub(crate) status: SessionStatus,
    pub(crate) state: StatePayload<Conn>,
    pub(crate) events: mpsc::UnboundedSender<SessionEvent<Conn, C::User>>,
}

impl<Conn: Connection, C: PayloadCodec<Conn>> Session<Conn, C> {
    /// Construct a session. If `config` carries a sync-peer identity the session starts
    /// Synchronizing and registers itself as a NetObject under that identity immediately;
    /// otherwise it starts Running with an empty OutboundSync list.
    pub fn new(
        connection_manager: Arc<dyn ConnectionManager<Conn>>,
        buffer: Arc<dyn Buffer>,
        codec: C,
        events: mpsc::UnboundedSender<SessionEvent<Conn, C::User>>,
        config: SessionConfig<Conn>,
    ) -> Self {
        let (status, state) = match config.sync {
            Some((connection, identifier)) => {
                connection_manager.register(connection.clone(), identifier.clone());
                (
                    SessionStatus::Synchronizing,
                    StatePayload::Synchronizing(SynchronizingState {
                        connection,
                        identifier,
                        messages_total: 0,
                        messages_received: 0,
                    }),
                )
            }
            None => (
                SessionStatus::Running,
                StatePayload::Running(state::RunningState::default()),
            ),
        };

        Self {
            connection_manager,
            buffer,
            codec,
            user_table: UserTable::new(),
            status,
            state,
            events,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn user_table(&self) -> &UserTable<C::User> {
        &self.user_table
    }

    pub fn buffer(&self) -> &Arc<dyn Buffer> {
        &self.buffer
    }

    pub fn connection_manager(&self) -> &Arc<dyn ConnectionManager<Conn>> {
        &self.connection_manager
    }

    /// The inbound connection being synchronized from, while Synchronizing.
    pub fn sync_connection(&self) -> Option<&Conn> {
        self.state.synchronizing().map(|s| &s.connection)
    }

    /// The NetObject identifier the session registered itself under, while Synchronizing.
    pub fn sync_identifier(&self) -> Option<&str> {
        self.state.synchronizing().map(|s| s.identifier.as_str())
    }

    pub(crate) fn emit(&self, event: SessionEvent<Conn, C::User>) {
        let _ = self.events.send(event);
    }

    pub(crate) fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
        self.emit(SessionEvent::StatusChanged(status));
    }
}

/// The session's role at the connection-manager interface: identified by (connection,
/// identifier) pairs registered via [`ConnectionManager::register`], this trait receives the
/// three callbacks the manager invokes as it moves data across the wire.
///
/// Only `received` is async: it's the only callback on a path that may itself need to call back
/// into the connection manager (sending `sync-error`/`sync-cancel`/`sync-begin`/... in reaction
/// to what arrived).
#[async_trait]
pub trait NetObject<Conn: Connection> {
    async fn received(&mut self, connection: &Conn, node: XmlNode);

    fn sent(&mut self, connection: &Conn, node: &XmlNode);

    fn enqueued(&mut self, connection: &Conn, node: &XmlNode);
}

#[async_trait]
impl<Conn, C> NetObject<Conn> for Session<Conn, C>
where
    Conn: Connection,
    C: PayloadCodec<Conn>,
{
    async fn received(&mut self, connection: &Conn, node: XmlNode) {
        self.handle_received(connection, node).await;
    }

    fn sent(&mut self, connection: &Conn, node: &XmlNode) {
        self.handle_sent(connection, node);
    }

    fn enqueued(&mut self, connection: &Conn, node: &XmlNode) {
        self.handle_enqueued(connection, node);
    }
}
