// SPDX-FileCopyrightText: 2026 Parlio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tolerant frame decoder: raw SSE frames in, typed [`SyncEvent`]s out.
//!
//! The server and client evolve independently, so an unrecognized or malformed
//! frame must never terminate the stream. Every decode failure degrades to a
//! `warn!` diagnostic carrying the raw payload, and the frame is dropped.

use std::pin::Pin;

use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use parlio_core::ParlioError;
use tracing::warn;

use crate::types::{
    BlockAddedData, BlockFullyAddedData, ErrorData, EventEnvelope, MessageFullyAddedData,
    StreamingUpdatedData, SyncEvent, ToolResponseReceivedData,
};

/// Decodes one raw frame into a typed event, or `None` if the frame is
/// malformed, fails schema validation, or names an event type outside the
/// catalogue.
///
/// The SSE `event:` name is advisory; the payload's `event_type` tag is
/// authoritative. A mismatch between the two is logged and the payload tag
/// wins.
pub fn decode_frame(event_name: &str, payload: &str) -> Option<SyncEvent> {
    let envelope: EventEnvelope = match serde_json::from_str(payload) {
        Ok(env) => env,
        Err(e) => {
            warn!(
                event_name,
                payload,
                error = %e,
                "dropping frame with malformed JSON payload"
            );
            return None;
        }
    };

    if envelope.event_type != event_name {
        warn!(
            event_name,
            payload_tag = %envelope.event_type,
            "frame name and payload event_type disagree; trusting the payload"
        );
    }

    let EventEnvelope {
        event_type,
        thread_id,
        timestamp,
        data,
    } = envelope;

    let decoded = match event_type.as_str() {
        "StreamingUpdated" => serde_json::from_value::<StreamingUpdatedData>(data)
            .map(SyncEvent::StreamingUpdated),
        "BlockAdded" => serde_json::from_value::<BlockAddedData>(data)
            .map(|data| SyncEvent::BlockAdded { thread_id, data }),
        "BlockFullyAdded" => serde_json::from_value::<BlockFullyAddedData>(data)
            .map(|data| SyncEvent::BlockFullyAdded { thread_id, data }),
        "MessageAdded" => serde_json::from_value::<parlio_core::Message>(data)
            .map(|message| SyncEvent::MessageAdded { thread_id, message }),
        "MessageFullyAdded" => serde_json::from_value::<MessageFullyAddedData>(data)
            .map(|data| SyncEvent::MessageFullyAdded { thread_id, data }),
        "ToolResponseReceived" => serde_json::from_value::<ToolResponseReceivedData>(data)
            .map(SyncEvent::ToolResponseReceived),
        "Error" => serde_json::from_value::<ErrorData>(data).map(|data| SyncEvent::Error {
            thread_id,
            timestamp,
            data,
        }),
        // Outside the catalogue: tolerated for forward compatibility.
        other => {
            warn!(event_type = other, payload, "dropping frame with unknown event_type");
            return None;
        }
    };

    match decoded {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(
                event_type = %event_type,
                payload,
                error = %e,
                "dropping frame that failed schema validation"
            );
            None
        }
    }
}

/// Adapts a streaming SSE response body into a stream of typed events.
///
/// Frames that decode to nothing are skipped silently (already logged by
/// [`decode_frame`]); transport-level stream failures surface as
/// [`ParlioError::Transport`] items. The caller decides whether such a
/// failure is a graceful close or an abnormal drop.
pub fn decoded_stream(
    response: reqwest::Response,
) -> Pin<Box<dyn Stream<Item = Result<SyncEvent, ParlioError>> + Send>> {
    let frames = response.bytes_stream().eventsource();

    let mapped = frames.filter_map(|result| async move {
        match result {
            Ok(frame) => decode_frame(&frame.event, &frame.data).map(Ok),
            Err(e) => Some(Err(ParlioError::Transport {
                message: format!("SSE stream error: {e}"),
                source: Some(Box::new(e)),
            })),
        }
    });

    Box::pin(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use parlio_core::BlockKind;

    #[test]
    fn decode_streaming_updated() {
        let payload = r#"{
            "event_type": "StreamingUpdated",
            "data": {"block_id": "B1", "content": "Hel"}
        }"#;
        let event = decode_frame("StreamingUpdated", payload).unwrap();
        match event {
            SyncEvent::StreamingUpdated(d) => {
                assert_eq!(d.block_id.0, "B1");
                assert_eq!(d.content, "Hel");
            }
            other => panic!("expected StreamingUpdated, got {other:?}"),
        }
    }

    #[test]
    fn decode_block_added_with_thread_id() {
        let payload = r#"{
            "event_type": "BlockAdded",
            "thread_id": "T1",
            "data": {
                "message_id": "M1",
                "block": {"id": "B1", "type": "reasoning", "streaming": true}
            }
        }"#;
        let event = decode_frame("BlockAdded", payload).unwrap();
        match event {
            SyncEvent::BlockAdded { thread_id, data } => {
                assert_eq!(thread_id.unwrap().0, "T1");
                assert_eq!(data.block.kind, BlockKind::Reasoning);
            }
            other => panic!("expected BlockAdded, got {other:?}"),
        }
    }

    #[test]
    fn decode_message_added_as_full_message() {
        let payload = r#"{
            "event_type": "MessageAdded",
            "thread_id": "T1",
            "data": {
                "id": "M1",
                "ai": false,
                "author_id": "u-7",
                "author_name": "Ada",
                "timestamp": "2026-02-01T09:00:00Z",
                "streaming": false,
                "blocks": []
            }
        }"#;
        let event = decode_frame("MessageAdded", payload).unwrap();
        match event {
            SyncEvent::MessageAdded { message, .. } => {
                assert_eq!(message.id.0, "M1");
                assert_eq!(message.author_name.as_deref(), Some("Ada"));
                assert!(!message.ai);
            }
            other => panic!("expected MessageAdded, got {other:?}"),
        }
    }

    #[test]
    fn malformed_json_yields_no_event() {
        assert!(decode_frame("StreamingUpdated", "{not json").is_none());
    }

    #[test]
    fn missing_required_field_yields_no_event() {
        // StreamingUpdated without `content`.
        let payload = r#"{"event_type": "StreamingUpdated", "data": {"block_id": "B1"}}"#;
        assert!(decode_frame("StreamingUpdated", payload).is_none());
    }

    #[test]
    fn unknown_event_type_yields_no_event() {
        let payload = r#"{"event_type": "FutureShiny", "data": {"anything": 1}}"#;
        assert!(decode_frame("FutureShiny", payload).is_none());
    }

    #[test]
    fn null_data_yields_no_event_for_typed_events() {
        let payload = r#"{"event_type": "StreamingUpdated", "data": null}"#;
        assert!(decode_frame("StreamingUpdated", payload).is_none());
    }

    #[test]
    fn payload_tag_wins_over_frame_name() {
        let payload = r#"{
            "event_type": "MessageFullyAdded",
            "thread_id": "T1",
            "data": {"message_id": "M1"}
        }"#;
        // Declared frame name disagrees; the payload tag is authoritative.
        let event = decode_frame("StreamingUpdated", payload).unwrap();
        assert_eq!(event.event_type(), "MessageFullyAdded");
    }

    #[test]
    fn decode_error_event_with_top_level_fields() {
        let payload = r#"{
            "event_type": "Error",
            "thread_id": "T1",
            "timestamp": "2026-02-01T09:00:00Z",
            "data": {"error_message": "model overloaded", "error_type": "overloaded"}
        }"#;
        let event = decode_frame("Error", payload).unwrap();
        match event {
            SyncEvent::Error {
                thread_id,
                timestamp,
                data,
            } => {
                assert_eq!(thread_id.unwrap().0, "T1");
                assert!(timestamp.is_some());
                assert_eq!(data.error_message, "model overloaded");
                assert_eq!(data.error_type.as_deref(), Some("overloaded"));
            }
            other => panic!("expected Error, got {other:?}"),
        }
    }

    /// Helper: serve raw SSE text from a wiremock server and open it with reqwest.
    async fn mock_sse_response(sse_text: &str) -> reqwest::Response {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse_text.to_string()),
            )
            .mount(&server)
            .await;

        reqwest::get(&server.uri()).await.unwrap()
    }

    #[tokio::test]
    async fn decoded_stream_yields_typed_events_in_order() {
        let sse = concat!(
            "event: StreamingUpdated\n",
            "data: {\"event_type\":\"StreamingUpdated\",\"data\":{\"block_id\":\"B1\",\"content\":\"Hel\"}}\n\n",
            "event: StreamingUpdated\n",
            "data: {\"event_type\":\"StreamingUpdated\",\"data\":{\"block_id\":\"B1\",\"content\":\"lo\"}}\n\n",
        );
        let mut stream = decoded_stream(mock_sse_response(sse).await);

        let first = stream.next().await.unwrap().unwrap();
        let second = stream.next().await.unwrap().unwrap();
        match (first, second) {
            (SyncEvent::StreamingUpdated(a), SyncEvent::StreamingUpdated(b)) => {
                assert_eq!(a.content, "Hel");
                assert_eq!(b.content, "lo");
            }
            other => panic!("expected two StreamingUpdated, got {other:?}"),
        }
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn decoded_stream_skips_undecodable_frames() {
        let sse = concat!(
            "event: Mystery\n",
            "data: {\"event_type\":\"Mystery\",\"data\":{}}\n\n",
            "event: StreamingUpdated\n",
            "data: not json at all\n\n",
            "event: MessageFullyAdded\n",
            "data: {\"event_type\":\"MessageFullyAdded\",\"thread_id\":\"T1\",\"data\":{\"message_id\":\"M1\"}}\n\n",
        );
        let mut stream = decoded_stream(mock_sse_response(sse).await);

        // The unknown and malformed frames vanish; only the valid one remains.
        let event = stream.next().await.unwrap().unwrap();
        assert_eq!(event.event_type(), "MessageFullyAdded");
        assert!(stream.next().await.is_none());
    }
}
