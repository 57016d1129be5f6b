// SPDX-License-Identifier: MIT OR Apache-2.0

//! The boundary to the external connection manager and the connections it multiplexes.
//!
//! Everything in this module is a trait: the actual transport, its framing, and its status
//! tracking are out of scope for this crate (see the spec's PURPOSE & SCOPE). What's in scope
//! is the shape of the boundary the session relies on.

use std::fmt;
use std::hash::Hash;

use async_trait::async_trait;
use thiserror::Error;

use crate::xml::XmlNode;

/// Lifecycle of a connection as tracked by the (external) XML connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Open,
    Closing,
    Closed,
}

/// A handle identifying one peer connection.
///
/// Concrete connection types are supplied by the embedding application; the core only needs to
/// compare, hash, clone and log them.
pub trait Connection: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T> Connection for T where T: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

/// Failures reported by the connection manager when asked to deliver a node.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConnectionManagerError {
    #[error("connection manager failed to send: {0}")]
    Send(String),
}

/// The external connection manager: delivers framed XML nodes, reports enqueue/send milestones,
/// and tracks which (connection, identifier) pairs are registered as NetObjects.
///
/// Out of scope per the spec; this trait only pins down the shape the session depends on.
#[async_trait]
pub trait ConnectionManager<Conn: Connection>: fmt::Debug + Send + Sync {
    /// Send a single node, resolving once the manager has accepted it.
    async fn send(&self, connection: &Conn, node: XmlNode) -> Result<(), ConnectionManagerError>;

    /// Send an ordered batch of nodes; the manager preserves their relative order on the wire.
    async fn send_multiple(
        &self,
        connection: &Conn,
        nodes: Vec<XmlNode>,
    ) -> Result<(), ConnectionManagerError>;

    /// Best-effort cancellation of any of this NetObject's messages still queued for send.
    fn cancel_outer(&self, connection: &Conn, identifier: &str);

    /// Register a NetObject under `identifier` on `connection`.
    fn register(&self, connection: Conn, identifier: String);

    fn is_registered(&self, connection: &Conn, identifier: &str) -> bool;

    /// Remove a NetObject registration. Idempotent: unregistering something already gone (e.g.
    /// because the transport tore it down) is not an error.
    fn unregister(&self, connection: &Conn, identifier: &str);
}
