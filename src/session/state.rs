// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::connection::Connection;

/// The three lifecycle states of a [`super::Session`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Synchronizing,
    Running,
    Closed,
}

/// State tagged by [`SessionStatus`]. A plain enum rather than a status field plus a loosely
/// related union: the invalid combination (e.g. reading sync counters while Running) simply
/// isn't expressible.
#[derive(Debug)]
pub(crate) enum StatePayload<Conn: Connection> {
    Synchronizing(SynchronizingState<Conn>),
    Running(RunningState<Conn>),
    Closed,
}

impl<Conn: Connection> StatePayload<Conn> {
    pub(crate) fn synchronizing(&self) -> Option<&SynchronizingState<Conn>> {
        match self {
            StatePayload::Synchronizing(state) => Some(state),
            _ => None,
        }
    }

    pub(crate) fn synchronizing_mut(&mut self) -> Option<&mut SynchronizingState<Conn>> {
        match self {
            StatePayload::Synchronizing(state) => Some(state),
            _ => None,
        }
    }

    pub(crate) fn running(&self) -> Option<&RunningState<Conn>> {
        match self {
            StatePayload::Running(state) => Some(state),
            _ => None,
        }
    }

    pub(crate) fn running_mut(&mut self) -> Option<&mut RunningState<Conn>> {
        match self {
            StatePayload::Running(state) => Some(state),
            _ => None,
        }
    }
}

/// Inbound synchronization bookkeeping: `messages_total == 0` until `sync-begin` arrives.
#[derive(Debug)]
pub(crate) struct SynchronizingState<Conn: Connection> {
    pub(crate) connection: Conn,
    pub(crate) identifier: String,
    pub(crate) messages_total: u64,
    pub(crate) messages_received: u64,
}

/// Outbound synchronizations currently in flight. Order is not observable.
#[derive(Debug, Default)]
pub(crate) struct RunningState<Conn: Connection> {
    pub(crate) syncs: Vec<super::outbound::OutboundSync<Conn>>,
}
