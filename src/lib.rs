// SPDX-License-Identifier: MIT OR Apache-2.0

//! `session-sync` is a collaborative session synchronization engine: the state machine that
//! transfers a document session's full state (users and buffer contents) from one endpoint to
//! another over an XML-framed, message-oriented connection, and that drives a session's lifecycle
//! between three states — Synchronizing, Running, Closed — while hosting zero or more concurrent
//! outbound synchronizations to peers.
//!
//! ## Scope
//!
//! In scope: the [`Session`] entity and its synchronization protocol, the per-peer
//! [`OutboundSync`] record, the [`UserTable`] and the user-validation contract exposed to the
//! codec, and the [`NetObject`] boundary a session presents to its transport.
//!
//! Out of scope: the connection manager itself (delivers framed XML nodes, reports send
//! milestones, tracks registered objects — see [`ConnectionManager`]), the XML connection, the
//! document buffer's contents, and "run" messages specific to a concrete document type. All of
//! these are represented here only as the traits a concrete application implements; this crate
//! never performs real network I/O.
//!
//! ## Extending
//!
//! A concrete session type plugs into the generic framing by implementing [`PayloadCodec`], which
//! supplies snapshot serialization, user construction, and the handling of document-specific "run"
//! messages exchanged once a session is Running. [`DefaultCodec`] is a minimal codec that
//! understands only the user table, useful for tests and for sessions with no document payload of
//! their own.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use session_sync::buffer::NullBuffer;
//! use session_sync::codec::DefaultCodec;
//! use session_sync::config::SessionConfig;
//! use session_sync::session::Session;
//! use session_sync::test_utils::LoopbackConnectionManager;
//!
//! # async fn run() {
//! let manager = LoopbackConnectionManager::<u32>::new();
//! let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
//!
//! let mut session = Session::new(
//!     manager.clone(),
//!     Arc::new(NullBuffer),
//!     DefaultCodec,
//!     events_tx,
//!     SessionConfig::new(),
//! );
//!
//! session.add_user(session_sync::user::UserProperties::new(1, "alice")).unwrap();
//! # let _ = events_rx.try_recv();
//! # }
//! ```

pub mod buffer;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod session;
#[cfg(feature = "test_utils")]
pub mod test_utils;
pub mod user;
pub mod user_table;
pub mod xml;

pub use codec::{DefaultCodec, PayloadCodec};
pub use config::SessionConfig;
pub use connection::{Connection, ConnectionManager, ConnectionManagerError, ConnectionStatus};
pub use error::SessionError;
pub use session::{NetObject, OutboundSync, Session, SessionEvent, SessionStatus, SynchronizationStatus};
pub use user::{DefaultUser, SessionUser, UserProperties};
pub use user_table::UserTable;
