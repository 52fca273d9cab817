// SPDX-FileCopyrightText: 2026 Parlio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests: a real HTTP mock server streaming SSE frames through the
//! full Transport -> Decoder -> Processor -> Store path.

use std::time::Duration;

use parlio_config::{ParlioConfig, ServerConfig, TransportConfig};
use parlio_core::{BlockId, JobId, MessageId, ThreadId};
use parlio_store::{ChangeKind, ChangeScope};
use parlio_sync::{Draft, EngineSignal, SyncSession};
use parlio_test_utils::{frames, MockEventServer};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn config_for(server: &MockEventServer) -> ParlioConfig {
    ParlioConfig {
        server: ServerConfig {
            base_url: server.uri(),
        },
        transport: TransportConfig {
            max_reconnect_attempts: 2,
            base_delay_ms: 20,
            request_timeout_secs: 5,
        },
    }
}

/// Waits on a store subscription until the given change kind arrives.
async fn await_change(
    rx: &mut tokio::sync::broadcast::Receiver<parlio_store::StoreChange>,
    kind: ChangeKind,
) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let change = rx.recv().await.expect("store change stream ended");
            if change.kind == kind {
                return;
            }
        }
    })
    .await
    .expect("timed out waiting for store change");
}

#[tokio::test]
async fn streamed_generation_builds_the_thread_exactly_as_sent() {
    let mock = MockEventServer::start().await;
    mock.serve_job_events(
        "J1",
        &[
            frames::block_added("T1", "M1", frames::plain_block("B1")),
            frames::streaming_updated("B1", "Hel"),
            frames::streaming_updated("B1", "lo"),
            frames::message_fully_added("T1", "M1"),
        ],
    )
    .await;

    let mut session = SyncSession::new(&config_for(&mock)).unwrap();
    let mut signals = session.take_signals().unwrap();

    let thread = ThreadId("T1".into());
    let _ = session.store().create_thread(&thread);
    let mut changes = session.store().subscribe(ChangeScope::Thread(thread.clone()));

    session.launch(JobId("J1".into()), thread.clone());
    await_change(&mut changes, ChangeKind::MessageFinalized).await;

    let snapshot = session.store().thread(&thread).unwrap();
    let message = snapshot.message(&MessageId("M1".into())).unwrap();
    let block = message.block(&BlockId("B1".into())).unwrap();
    assert_eq!(block.content.as_deref(), Some("Hello"));
    assert!(!block.streaming);
    assert!(!message.streaming);

    // Exactly one new-message signal, fired when the first block landed.
    let mut new_messages = 0;
    while let Ok(signal) = signals.try_recv() {
        if let EngineSignal::NewMessage { message_id, .. } = signal {
            assert_eq!(message_id, MessageId("M1".into()));
            new_messages += 1;
        }
    }
    assert_eq!(new_messages, 1);

    session.shutdown();
}

#[tokio::test]
async fn exhausted_reconnects_surface_transport_down() {
    let mock = MockEventServer::start().await;
    // Every attempt fails; no success mock mounted.
    mock.fail_job_events("J1", 500, u64::MAX).await;

    let mut session = SyncSession::new(&config_for(&mock)).unwrap();
    let mut signals = session.take_signals().unwrap();

    session.launch(JobId("J1".into()), ThreadId("T1".into()));

    let signal = tokio::time::timeout(Duration::from_secs(5), signals.recv())
        .await
        .expect("timed out waiting for signal")
        .expect("signal channel closed");
    match signal {
        EngineSignal::TransportDown { job, attempts } => {
            assert_eq!(job, JobId("J1".into()));
            assert_eq!(attempts, 2);
        }
        other => panic!("expected TransportDown, got {other:?}"),
    }
}

#[tokio::test]
async fn server_error_events_signal_but_leave_state_untouched() {
    let mock = MockEventServer::start().await;
    mock.serve_job_events(
        "J1",
        &[frames::error_event("T1", "model overloaded", Some("overloaded"))],
    )
    .await;

    let mut session = SyncSession::new(&config_for(&mock)).unwrap();
    let mut signals = session.take_signals().unwrap();
    let thread = ThreadId("T1".into());

    session.launch(JobId("J1".into()), thread.clone());

    let signal = tokio::time::timeout(Duration::from_secs(5), signals.recv())
        .await
        .expect("timed out waiting for signal")
        .expect("signal channel closed");
    match signal {
        EngineSignal::ServerError {
            error_message,
            error_type,
            ..
        } => {
            assert_eq!(error_message, "model overloaded");
            assert_eq!(error_type.as_deref(), Some("overloaded"));
        }
        other => panic!("expected ServerError, got {other:?}"),
    }

    assert!(
        session.store().thread(&thread).unwrap().messages.is_empty(),
        "server errors never materialize as conversation content"
    );
}

/// Responds to a message send by echoing the request's client token inside
/// the authoritative MessageAdded, followed by a streamed assistant reply.
struct EchoingSendResponder;

impl wiremock::Respond for EchoingSendResponder {
    fn respond(&self, request: &wiremock::Request) -> wiremock::ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap_or_default();
        let token = body["client_token"].as_str().unwrap_or_default();
        let content = body["content"].as_str().unwrap_or_default();

        let sse = [
            frames::message_added(
                "T1",
                json!({
                    "id": "M-user",
                    "ai": false,
                    "author_id": "u-1",
                    "author_name": "Ada",
                    "timestamp": "2026-02-01T09:00:00Z",
                    "streaming": false,
                    "blocks": [{
                        "id": "B-user",
                        "type": "plain",
                        "content": content,
                        "streaming": false
                    }],
                    "client_token": token
                }),
            ),
            frames::block_added("T1", "M-resp", frames::plain_block("B-resp")),
            frames::streaming_updated("B-resp", "Hi Ada!"),
            frames::message_fully_added("T1", "M-resp"),
        ]
        .concat();

        wiremock::ResponseTemplate::new(200)
            .insert_header("content-type", "text/event-stream")
            .set_body_string(sse)
    }
}

#[tokio::test]
async fn send_reconciles_the_echo_and_streams_the_reply() {
    let mock = MockEventServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path("/threads/T1/messages"))
        .respond_with(EchoingSendResponder)
        .mount(mock.inner())
        .await;

    let session = SyncSession::new(&config_for(&mock)).unwrap();
    let thread = ThreadId("T1".into());

    let receipt = session
        .send(
            &thread,
            Draft {
                content: "hello assistant".into(),
                author_id: Some("u-1".into()),
                author_name: Some("Ada".into()),
                ..Draft::default()
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let snapshot = session.store().thread(&thread).unwrap();

    // The provisional user message was replaced by the authoritative one.
    assert!(snapshot.message(&receipt.message_id).is_none());
    let user = snapshot.message(&MessageId("M-user".into())).unwrap();
    assert_eq!(user.client_token.as_deref(), Some(receipt.client_token.as_str()));
    assert_eq!(user.blocks[0].content.as_deref(), Some("hello assistant"));

    // The assistant placeholder gave way to the real streamed reply.
    let reply = snapshot.message(&MessageId("M-resp".into())).unwrap();
    assert_eq!(
        reply.block(&BlockId("B-resp".into())).unwrap().content.as_deref(),
        Some("Hi Ada!")
    );
    assert!(!reply.streaming);

    // No provisional entries survive.
    assert_eq!(snapshot.messages.len(), 2);
    assert!(snapshot.messages.iter().all(|m| !m.id.0.starts_with("local-")));
}
