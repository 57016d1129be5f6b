// SPDX-License-Identifier: MIT OR Apache-2.0

//! Construction-time configuration.

use crate::connection::Connection;

/// Selects a [`crate::session::Session`]'s initial state.
///
/// Carrying a `sync_connection`/`sync_identifier` pair selects the Synchronizing initial state;
/// leaving it unset selects Running. There is no partial state between the two: the source's
/// GObject properties can arrive in any order and defer registration until all three of
/// `connection_manager`/`sync_connection`/`sync_identifier` are present, but `SessionConfig` is
/// consumed in one shot by `Session::new`, so that deferral has nothing left to defer.
#[derive(Clone, Debug)]
pub struct SessionConfig<Conn: Connection> {
    pub(crate) sync: Option<(Conn, String)>,
}

impl<Conn: Connection> SessionConfig<Conn> {
    /// A config selecting the Running initial state (no inbound synchronization).
    pub fn new() -> Self {
        Self { sync: None }
    }

    /// Select the Synchronizing initial state: `connection` is the inbound connection data will
    /// be read from, `identifier` is the NetObject identifier the session registers itself
    /// under.
    pub fn sync_connection(mut self, connection: Conn, identifier: impl Into<String>) -> Self {
        self.sync = Some((connection, identifier.into()));
        self
    }
}

impl<Conn: Connection> Default for SessionConfig<Conn> {
    fn default() -> Self {
        Self::new()
    }
}
