// SPDX-FileCopyrightText: 2026 Parlio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound message delivery.
//!
//! Sending a message is a single bounded request whose response body is itself
//! an SSE-framed stream, consumed incrementally through the same decoder as
//! the push connection. The connect/response phase is bounded by the
//! configured request timeout; the streamed body is not.

use std::pin::Pin;

use futures::stream::{Stream, StreamExt};
use parlio_config::TransportConfig;
use parlio_core::{Attachment, ParlioError, ThreadId};
use parlio_wire::{decoded_stream, SyncEvent};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Request body for a message send.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    pub content: String,

    /// Client-generated idempotency token, echoed back by the server inside
    /// the authoritative `MessageAdded` so optimistic copies can be reconciled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_token: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// The stream of sync events produced by a message send.
pub type ResponseEventStream = Pin<Box<dyn Stream<Item = Result<SyncEvent, ParlioError>> + Send>>;

/// Sends messages and exposes their streamed responses.
#[derive(Debug, Clone)]
pub struct MessageSender {
    client: reqwest::Client,
    base_url: String,
    config: TransportConfig,
}

impl MessageSender {
    pub fn new(base_url: &str, config: TransportConfig) -> Result<Self, ParlioError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout())
            .build()
            .map_err(|e| ParlioError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
        })
    }

    /// Posts a message to the thread and returns the response event stream.
    ///
    /// Cancellation is cooperative: once `cancel` fires the stream ends, and
    /// any buffered partial frame -- one not yet terminated by its blank-line
    /// delimiter -- is discarded rather than applied. Frames are only ever
    /// surfaced whole.
    pub async fn send_message(
        &self,
        thread_id: &ThreadId,
        message: OutboundMessage,
        cancel: CancellationToken,
    ) -> Result<ResponseEventStream, ParlioError> {
        let url = format!("{}/threads/{}/messages", self.base_url, thread_id.0);
        debug!(thread_id = %thread_id, url = %url, "sending message");

        let request = self.client.post(&url).json(&message).send();
        let response = match tokio::time::timeout(self.config.request_timeout(), request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return Err(ParlioError::Transport {
                    message: format!("message send failed: {e}"),
                    source: Some(Box::new(e)),
                });
            }
            Err(_) => {
                return Err(ParlioError::Timeout {
                    duration: self.config.request_timeout(),
                });
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ParlioError::Transport {
                message: format!("message send returned {status}: {body}"),
                source: None,
            });
        }

        // take_until ends the stream at cancellation; the SSE assembler's
        // internal buffer (holding at most one unterminated frame) is dropped
        // with it, which is exactly the discard the contract requires.
        let events = decoded_stream(response).take_until(cancel.cancelled_owned());
        Ok(Box::pin(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sender(base_url: &str) -> MessageSender {
        MessageSender::new(
            base_url,
            TransportConfig {
                max_reconnect_attempts: 3,
                base_delay_ms: 10,
                request_timeout_secs: 2,
            },
        )
        .unwrap()
    }

    fn outbound(content: &str, token: Option<&str>) -> OutboundMessage {
        OutboundMessage {
            content: content.into(),
            client_token: token.map(String::from),
            attachments: Vec::new(),
        }
    }

    #[test]
    fn outbound_body_omits_empty_optionals() {
        let json = serde_json::to_value(outbound("hi", None)).unwrap();
        assert_eq!(json["content"], "hi");
        assert!(json.get("client_token").is_none());
        assert!(json.get("attachments").is_none());
    }

    #[test]
    fn outbound_body_carries_attachment_references() {
        let mut msg = outbound("see attached", Some("tok-1"));
        msg.attachments.push(Attachment {
            file_id: "f-9".into(),
            mime_type: "image/png".into(),
            filename: "plot.png".into(),
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["client_token"], "tok-1");
        assert_eq!(json["attachments"][0]["file_id"], "f-9");
        assert_eq!(json["attachments"][0]["mime_type"], "image/png");
    }

    #[tokio::test]
    async fn send_message_streams_the_response_events() {
        let server = MockServer::start().await;
        let sse = concat!(
            "event: StreamingUpdated\n",
            "data: {\"event_type\":\"StreamingUpdated\",\"data\":{\"block_id\":\"B1\",\"content\":\"ok\"}}\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/threads/T1/messages"))
            .and(header("content-type", "application/json"))
            .and(body_partial_json(serde_json::json!({"content": "hello"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse),
            )
            .mount(&server)
            .await;

        let sender = sender(&server.uri());
        let mut stream = sender
            .send_message(
                &ThreadId("T1".into()),
                outbound("hello", Some("tok-1")),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        let event = stream.next().await.unwrap().unwrap();
        assert_eq!(event.event_type(), "StreamingUpdated");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn send_message_surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads/T1/messages"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad content"))
            .mount(&server)
            .await;

        let sender = sender(&server.uri());
        let result = sender
            .send_message(
                &ThreadId("T1".into()),
                outbound("hello", None),
                CancellationToken::new(),
            )
            .await;

        match result {
            Err(ParlioError::Transport { message, .. }) => {
                assert!(message.contains("422"), "got: {message}");
            }
            Ok(_) => panic!("expected Transport error, got Ok(stream)"),
            Err(other) => panic!("expected Transport error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_ends_the_stream_between_frames() {
        let server = MockServer::start().await;
        let sse = concat!(
            "event: StreamingUpdated\n",
            "data: {\"event_type\":\"StreamingUpdated\",\"data\":{\"block_id\":\"B1\",\"content\":\"first\"}}\n\n",
            "event: StreamingUpdated\n",
            "data: {\"event_type\":\"StreamingUpdated\",\"data\":{\"block_id\":\"B1\",\"content\":\"second\"}}\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/threads/T1/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse),
            )
            .mount(&server)
            .await;

        let sender = sender(&server.uri());
        let cancel = CancellationToken::new();
        let mut stream = sender
            .send_message(&ThreadId("T1".into()), outbound("hello", None), cancel.clone())
            .await
            .unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.event_type(), "StreamingUpdated");

        // Cancel mid-stream: the remaining buffered frame is discarded.
        cancel.cancel();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn already_cancelled_token_yields_an_empty_stream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads/T1/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string("event: X\ndata: {}\n\n"),
            )
            .mount(&server)
            .await;

        let sender = sender(&server.uri());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut stream = sender
            .send_message(&ThreadId("T1".into()), outbound("hi", None), cancel)
            .await
            .unwrap();
        assert!(stream.next().await.is_none());
    }
}
