// SPDX-FileCopyrightText: 2026 Parlio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE frame builders for the sync wire protocol.
//!
//! Each builder produces one complete `event:` / `data:` / blank-line frame
//! whose payload envelope matches what the server emits.

use serde_json::{json, Value};

/// Renders one complete SSE frame for the given envelope payload.
pub fn frame(event_type: &str, payload: &Value) -> String {
    format!("event: {event_type}\ndata: {payload}\n\n")
}

/// Envelope + frame in one step, with optional top-level thread id.
pub fn event_frame(event_type: &str, thread_id: Option<&str>, data: Value) -> String {
    let mut payload = json!({
        "event_type": event_type,
        "data": data,
    });
    if let Some(thread) = thread_id {
        payload["thread_id"] = json!(thread);
    }
    frame(event_type, &payload)
}

pub fn streaming_updated(block_id: &str, content: &str) -> String {
    event_frame(
        "StreamingUpdated",
        None,
        json!({"block_id": block_id, "content": content}),
    )
}

pub fn block_added(thread_id: &str, message_id: &str, block: Value) -> String {
    event_frame(
        "BlockAdded",
        Some(thread_id),
        json!({"message_id": message_id, "block": block}),
    )
}

pub fn block_fully_added(thread_id: &str, message_id: &str, block_id: &str) -> String {
    event_frame(
        "BlockFullyAdded",
        Some(thread_id),
        json!({"message_id": message_id, "block_id": block_id}),
    )
}

pub fn message_added(thread_id: &str, message: Value) -> String {
    event_frame("MessageAdded", Some(thread_id), message)
}

pub fn message_fully_added(thread_id: &str, message_id: &str) -> String {
    event_frame(
        "MessageFullyAdded",
        Some(thread_id),
        json!({"message_id": message_id}),
    )
}

pub fn tool_response_received(block_id: &str, tool_call_id: &str, response: Value) -> String {
    event_frame(
        "ToolResponseReceived",
        None,
        json!({"block_id": block_id, "tool_call_id": tool_call_id, "response": response}),
    )
}

pub fn error_event(thread_id: &str, error_message: &str, error_type: Option<&str>) -> String {
    let mut data = json!({"error_message": error_message});
    if let Some(kind) = error_type {
        data["error_type"] = json!(kind);
    }
    let payload = json!({
        "event_type": "Error",
        "thread_id": thread_id,
        "timestamp": "2026-01-01T00:00:00Z",
        "data": data,
    });
    frame("Error", &payload)
}

/// A minimal streaming plain-text block object.
pub fn plain_block(id: &str) -> Value {
    json!({"id": id, "type": "plain", "content": "", "streaming": true})
}
