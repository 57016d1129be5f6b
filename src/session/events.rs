// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::connection::Connection;
use crate::error::SessionError;
use crate::session::state::SessionStatus;
use crate::user::SessionUser;

/// Every event a [`super::Session`] can emit, pushed onto the `tokio::sync::mpsc` channel
/// supplied at construction.
#[derive(Clone, Debug)]
pub enum SessionEvent<Conn: Connection, U: SessionUser> {
    AddUser(U),
    RemoveUser(U),
    SynchronizationProgress(Conn, f64),
    SynchronizationComplete(Conn),
    SynchronizationFailed(Conn, SessionError),
    StatusChanged(SessionStatus),
}
