// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::connection::Connection;

/// Sender-side record of one in-flight synchronization to a peer.
#[derive(Debug)]
pub struct OutboundSync<Conn: Connection> {
    pub(crate) connection: Conn,
    pub(crate) identifier: String,
    pub(crate) messages_total: u64,
    pub(crate) messages_sent: u64,
    pub(crate) end_enqueued: bool,
}

impl<Conn: Connection> OutboundSync<Conn> {
    pub fn connection(&self) -> &Conn {
        &self.connection
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// `2 + body_count`.
    pub fn messages_total(&self) -> u64 {
        self.messages_total
    }

    /// Count acknowledged by the transport as sent; non-decreasing, `<= messages_total`.
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent
    }

    /// `true` once `sync-end` has been accepted by the transport for transmission. Past this
    /// point the stream can no longer be cancelled.
    pub fn end_enqueued(&self) -> bool {
        self.end_enqueued
    }

    pub fn progress(&self) -> f64 {
        self.messages_sent as f64 / self.messages_total as f64
    }
}

/// Outcome of [`super::Session::get_synchronization_status`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SynchronizationStatus {
    /// No OutboundSync exists for this connection.
    None,
    /// A sync is in flight and `sync-end` has not yet been enqueued.
    InProgress,
    /// `sync-end` has been enqueued; the sync can no longer be cancelled.
    EndEnqueued,
}
