// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process connection manager for exercising the synchronization protocol without sockets.
//!
//! Gated behind the `test_utils` feature, mirroring how the teacher crate separates its own
//! loopback test harness from the production build.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::codec::PayloadCodec;
use crate::connection::{Connection, ConnectionManager, ConnectionManagerError};
use crate::session::{NetObject, Session};
use crate::xml::XmlNode;

/// Install a `tracing` subscriber printing to stdout, honoring `RUST_LOG`. Safe to call from
/// every test: subsequent calls after the first are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A connection manager that queues outgoing nodes instead of sending them anywhere. A test
/// drains the queue and delivers each node to the peer session itself, which keeps the protocol
/// fully synchronous and single-threaded from the test's point of view.
#[derive(Debug)]
pub struct LoopbackConnectionManager<Conn: Connection> {
    outbound: Mutex<VecDeque<(Conn, XmlNode)>>,
    registered: Mutex<HashSet<(Conn, String)>>,
}

impl<Conn: Connection> LoopbackConnectionManager<Conn> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            outbound: Mutex::new(VecDeque::new()),
            registered: Mutex::new(HashSet::new()),
        })
    }

    /// Remove and return every node queued by `send`/`send_multiple` since the last drain, in
    /// the order they were sent.
    pub fn drain(&self) -> Vec<(Conn, XmlNode)> {
        self.outbound.lock().unwrap().drain(..).collect()
    }
}

#[async_trait]
impl<Conn: Connection> ConnectionManager<Conn> for LoopbackConnectionManager<Conn> {
    async fn send(&self, connection: &Conn, node: XmlNode) -> Result<(), ConnectionManagerError> {
        self.outbound.lock().unwrap().push_back((connection.clone(), node));
        Ok(())
    }

    async fn send_multiple(
        &self,
        connection: &Conn,
        nodes: Vec<XmlNode>,
    ) -> Result<(), ConnectionManagerError> {
        let mut queue = self.outbound.lock().unwrap();
        for node in nodes {
            queue.push_back((connection.clone(), node));
        }
        Ok(())
    }

    fn cancel_outer(&self, _connection: &Conn, _identifier: &str) {}

    fn register(&self, connection: Conn, identifier: String) {
        self.registered.lock().unwrap().insert((connection, identifier));
    }

    fn is_registered(&self, connection: &Conn, identifier: &str) -> bool {
        self.registered
            .lock()
            .unwrap()
            .contains(&(connection.clone(), identifier.to_string()))
    }

    fn unregister(&self, connection: &Conn, identifier: &str) {
        self.registered
            .lock()
            .unwrap()
            .remove(&(connection.clone(), identifier.to_string()));
    }
}

/// Deliver every node `from_manager` has queued to `to_session`, synthesizing the `enqueued` and
/// `sent` acknowledgements on `from_session` that a real transport would report back.
pub async fn pump<Conn, CFrom, CTo>(
    from_manager: &LoopbackConnectionManager<Conn>,
    from_session: &mut Session<Conn, CFrom>,
    to_session: &mut Session<Conn, CTo>,
) where
    Conn: Connection,
    CFrom: PayloadCodec<Conn>,
    CTo: PayloadCodec<Conn>,
{
    for (connection, node) in from_manager.drain() {
        from_session.enqueued(&connection, &node);
        from_session.sent(&connection, &node);
        to_session.received(&connection, node).await;
    }
}

/// Repeatedly pump both directions of a session pair until neither manager has anything queued.
/// Bounded so a protocol bug that never quiesces fails the test instead of hanging it.
pub async fn run_to_quiescence<Conn, CA, CB>(
    manager_a: &LoopbackConnectionManager<Conn>,
    session_a: &mut Session<Conn, CA>,
    manager_b: &LoopbackConnectionManager<Conn>,
    session_b: &mut Session<Conn, CB>,
) where
    Conn: Connection,
    CA: PayloadCodec<Conn>,
    CB: PayloadCodec<Conn>,
{
    const MAX_ROUNDS: usize = 1_000;

    for _ in 0..MAX_ROUNDS {
        let a_to_b = manager_a.drain();
        let b_to_a = manager_b.drain();
        if a_to_b.is_empty() && b_to_a.is_empty() {
            return;
        }

        for (connection, node) in a_to_b {
            session_a.enqueued(&connection, &node);
            session_a.sent(&connection, &node);
            session_b.received(&connection, node).await;
        }
        for (connection, node) in b_to_a {
            session_b.enqueued(&connection, &node);
            session_b.sent(&connection, &node);
            session_a.received(&connection, node).await;
        }
    }

    panic!("run_to_quiescence did not settle within {MAX_ROUNDS} rounds");
}
