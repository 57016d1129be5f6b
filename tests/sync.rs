// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use assert_matches::assert_matches;
use tokio::sync::mpsc::unbounded_channel;

use session_sync::buffer::NullBuffer;
use session_sync::codec::DefaultCodec;
use session_sync::config::SessionConfig;
use session_sync::connection::ConnectionStatus;
use session_sync::error::SessionError;
use session_sync::session::{NetObject, Session, SessionEvent, SessionStatus};
use session_sync::test_utils::{init_tracing, run_to_quiescence, LoopbackConnectionManager};
use session_sync::user::UserProperties;

type TestSession = Session<u32, DefaultCodec>;

fn new_running() -> (
    Arc<LoopbackConnectionManager<u32>>,
    TestSession,
    tokio::sync::mpsc::UnboundedReceiver<SessionEvent<u32, session_sync::user::DefaultUser>>,
) {
    let manager = LoopbackConnectionManager::<u32>::new();
    let (tx, rx) = unbounded_channel();
    let session = Session::new(
        manager.clone(),
        Arc::new(NullBuffer),
        DefaultCodec,
        tx,
        SessionConfig::new(),
    );
    (manager, session, rx)
}

fn new_synchronizing(
    peer: u32,
    identifier: &str,
) -> (
    Arc<LoopbackConnectionManager<u32>>,
    TestSession,
    tokio::sync::mpsc::UnboundedReceiver<SessionEvent<u32, session_sync::user::DefaultUser>>,
) {
    let manager = LoopbackConnectionManager::<u32>::new();
    let (tx, rx) = unbounded_channel();
    let session = Session::new(
        manager.clone(),
        Arc::new(NullBuffer),
        DefaultCodec,
        tx,
        SessionConfig::new().sync_connection(peer, identifier),
    );
    (manager, session, rx)
}

#[tokio::test]
async fn empty_snapshot_synchronizes_with_no_users() {
    init_tracing();
    let (manager_a, mut session_a, _events_a) = new_running();
    let (manager_b, mut session_b, mut events_b) = new_synchronizing(1, "doc-1");

    session_a.synchronize_to(1, "doc-1").await;
    run_to_quiescence(&manager_a, &mut session_a, &manager_b, &mut session_b).await;

    assert_eq!(session_b.status(), SessionStatus::Running);
    assert!(session_b.user_table().is_empty());

    let mut progress = Vec::new();
    while let Ok(event) = events_b.try_recv() {
        if let SessionEvent::SynchronizationProgress(_, ratio) = event {
            progress.push(ratio);
        }
    }
    assert_eq!(progress, vec![0.5]);
}

#[tokio::test]
async fn two_users_synchronize_with_monotone_progress() {
    init_tracing();
    let (manager_a, mut session_a, _events_a) = new_running();
    let (manager_b, mut session_b, mut events_b) = new_synchronizing(1, "doc-1");

    session_a
        .add_user(UserProperties::new(1, "alice"))
        .unwrap();
    session_a.add_user(UserProperties::new(2, "bob")).unwrap();

    session_a.synchronize_to(1, "doc-1").await;
    run_to_quiescence(&manager_a, &mut session_a, &manager_b, &mut session_b).await;

    assert_eq!(session_b.status(), SessionStatus::Running);
    assert_eq!(session_b.user_table().len(), 2);
    assert_eq!(session_b.lookup_user_by_id(1).unwrap().name(), "alice");
    assert_eq!(session_b.lookup_user_by_id(2).unwrap().name(), "bob");

    let mut progress = Vec::new();
    let mut completed = false;
    while let Ok(event) = events_b.try_recv() {
        match event {
            SessionEvent::SynchronizationProgress(_, ratio) => progress.push(ratio),
            SessionEvent::SynchronizationComplete(_) => completed = true,
            _ => {}
        }
    }
    assert_eq!(progress, vec![0.25, 0.5, 0.75]);
    assert!(completed);
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn duplicate_id_during_sync_fails_and_closes() {
    init_tracing();
    let (manager_b, mut session_b, mut events_b) = new_synchronizing(1, "doc-1");

    session_b.received(&1, sync_begin(2)).await;
    session_b.received(&1, sync_user(1, "a")).await;
    session_b.received(&1, sync_user(1, "a")).await;

    assert_eq!(session_b.status(), SessionStatus::Closed);

    let failed = collect_failures(&mut events_b);
    assert_eq!(failed.len(), 1);
    assert_matches!(&failed[0], SessionError::IdInUse(1));

    let sent = manager_b.drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.tag(), "sync-error");
    assert_eq!(
        sent[0].1.attribute_u64("code"),
        Some(SessionError::IdInUse(1).code() as u64)
    );
}

#[tokio::test]
async fn missing_num_messages_fails_and_closes() {
    init_tracing();
    let (manager_b, mut session_b, mut events_b) = new_synchronizing(1, "doc-1");

    session_b.received(&1, session_sync::xml::XmlNode::new("sync-begin")).await;

    assert_eq!(session_b.status(), SessionStatus::Closed);
    let failed = collect_failures(&mut events_b);
    assert_matches!(&failed[..], [SessionError::NumMessagesMissing]);
    assert_eq!(manager_b.drain().len(), 1);
}

#[tokio::test]
async fn remote_cancel_mid_stream_closes_without_reply() {
    init_tracing();
    let (manager_b, mut session_b, mut events_b) = new_synchronizing(1, "doc-1");

    session_b.received(&1, sync_begin(4)).await;
    session_b.received(&1, sync_user(1, "a")).await;
    session_b
        .received(&1, session_sync::xml::XmlNode::new("sync-cancel"))
        .await;

    assert_eq!(session_b.status(), SessionStatus::Closed);
    let failed = collect_failures(&mut events_b);
    assert_matches!(&failed[..], [SessionError::SenderCancelled]);
    assert!(
        manager_b.drain().is_empty(),
        "a remote sync-cancel must not be answered with sync-error"
    );
}

#[tokio::test]
async fn local_close_mid_outbound_cancels_before_end_is_enqueued() {
    init_tracing();
    let (manager_a, mut session_a, mut events_a) = new_running();

    session_a.synchronize_to(1, "doc-1").await;
    assert_eq!(
        session_a.get_synchronization_status(&1),
        session_sync::session::SynchronizationStatus::InProgress
    );

    session_a.close().await;

    assert_eq!(session_a.status(), SessionStatus::Closed);
    let failed = collect_failures(&mut events_a);
    assert_matches!(&failed[..], [SessionError::ReceiverCancelled]);

    let queued = manager_a.drain();
    assert!(queued.iter().any(|(_, node)| node.tag() == "sync-cancel"));
}

#[tokio::test]
async fn local_close_after_end_enqueued_skips_cancel() {
    init_tracing();
    let (manager_a, mut session_a, mut events_a) = new_running();

    session_a.synchronize_to(1, "doc-1").await;
    session_a.enqueued(&1, &session_sync::xml::XmlNode::new("sync-end"));
    assert_eq!(
        session_a.get_synchronization_status(&1),
        session_sync::session::SynchronizationStatus::EndEnqueued
    );

    session_a.close().await;

    assert_eq!(session_a.status(), SessionStatus::Closed);
    let failed = collect_failures(&mut events_a);
    assert!(
        failed.is_empty(),
        "close must not fail a sync whose sync-end was already enqueued"
    );

    let queued = manager_a.drain();
    assert!(
        !queued.iter().any(|(_, node)| node.tag() == "sync-cancel"),
        "close must not send sync-cancel once sync-end was enqueued"
    );
}

#[tokio::test]
async fn connection_status_change_during_synchronizing_closes_without_reply() {
    init_tracing();
    let (manager_b, mut session_b, mut events_b) = new_synchronizing(1, "doc-1");

    session_b.received(&1, sync_begin(4)).await;
    session_b.received(&1, sync_user(1, "a")).await;

    session_b.connection_status_changed(&1, ConnectionStatus::Closed);

    assert_eq!(session_b.status(), SessionStatus::Closed);
    let failed = collect_failures(&mut events_b);
    assert_matches!(&failed[..], [SessionError::ConnectionClosed]);
    assert!(
        manager_b.drain().is_empty(),
        "a dead connection must not be answered with sync-error"
    );
}

#[tokio::test]
async fn connection_status_change_during_synchronizing_ignores_open() {
    init_tracing();
    let (_manager_b, mut session_b, mut events_b) = new_synchronizing(1, "doc-1");

    session_b.connection_status_changed(&1, ConnectionStatus::Open);

    assert_eq!(session_b.status(), SessionStatus::Synchronizing);
    assert!(collect_failures(&mut events_b).is_empty());
}

#[tokio::test]
async fn connection_status_change_during_running_fails_outbound_sync() {
    init_tracing();
    let (_manager_a, mut session_a, mut events_a) = new_running();

    session_a.synchronize_to(1, "doc-1").await;
    assert_eq!(
        session_a.get_synchronization_status(&1),
        session_sync::session::SynchronizationStatus::InProgress
    );

    session_a.connection_status_changed(&1, ConnectionStatus::Closed);

    assert_eq!(session_a.status(), SessionStatus::Running);
    assert_eq!(
        session_a.get_synchronization_status(&1),
        session_sync::session::SynchronizationStatus::None
    );
    let failed = collect_failures(&mut events_a);
    assert_matches!(&failed[..], [SessionError::ConnectionClosed]);
}

fn sync_begin(num_messages: u64) -> session_sync::xml::XmlNode {
    session_sync::xml::XmlNode::new("sync-begin")
        .with_attribute("num-messages", num_messages.to_string())
}

fn sync_user(id: u64, name: &str) -> session_sync::xml::XmlNode {
    session_sync::xml::XmlNode::new("sync-user")
        .with_attribute("id", id.to_string())
        .with_attribute("name", name)
}

fn collect_failures(
    events: &mut tokio::sync::mpsc::UnboundedReceiver<
        SessionEvent<u32, session_sync::user::DefaultUser>,
    >,
) -> Vec<SessionError> {
    let mut failures = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::SynchronizationFailed(_, error) = event {
            failures.push(error);
        }
    }
    failures
}
