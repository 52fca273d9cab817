// SPDX-FileCopyrightText: 2026 Parlio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire event catalogue for the conversation sync protocol.
//!
//! Every frame payload is an envelope `{ event_type, thread_id?, timestamp?,
//! data }` whose `data` shape depends on the `event_type` tag. The catalogue
//! is closed: [`SyncEvent`] enumerates every known event, and the processor
//! matches it exhaustively. Unknown wire values are tolerated at the decode
//! boundary instead (see [`crate::decode`]).

use chrono::{DateTime, Utc};
use parlio_core::{Block, BlockId, Message, MessageId, ThreadId, ToolCallId};
use serde::Deserialize;

/// Wire names of the known event types, in catalogue order.
pub const EVENT_CATALOGUE: &[&str] = &[
    "StreamingUpdated",
    "BlockAdded",
    "BlockFullyAdded",
    "MessageAdded",
    "MessageFullyAdded",
    "ToolResponseReceived",
    "Error",
];

/// Outer envelope common to every frame payload.
///
/// `data` defaults to `Value::Null` so that an absent `data` object and an
/// explicit `"data": null` are indistinguishable downstream.
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    pub event_type: String,

    #[serde(default)]
    pub thread_id: Option<ThreadId>,

    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub data: serde_json::Value,
}

/// `data` for `StreamingUpdated`: append `content` to the identified block.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamingUpdatedData {
    pub block_id: BlockId,
    pub content: String,
}

/// `data` for `BlockAdded`: a full new block for an existing (or shell) message.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockAddedData {
    pub message_id: MessageId,
    pub block: Block,
}

/// `data` for `BlockFullyAdded`: the named block stops streaming.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockFullyAddedData {
    pub message_id: MessageId,
    pub block_id: BlockId,
}

/// `data` for `MessageFullyAdded`: the message and all its blocks freeze.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageFullyAddedData {
    pub message_id: MessageId,
}

/// `data` for `ToolResponseReceived`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolResponseReceivedData {
    pub block_id: BlockId,
    pub tool_call_id: ToolCallId,
    pub response: serde_json::Value,
}

/// `data` for server `Error` events. These never mutate conversation state.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorData {
    pub error_message: String,
    #[serde(default)]
    pub error_type: Option<String>,
}

/// A decoded, schema-checked sync event.
///
/// Closed tagged union: the processor dispatches on this exhaustively, with no
/// default branch. Events are transient -- consumed exactly once, never
/// retained.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    StreamingUpdated(StreamingUpdatedData),
    BlockAdded {
        thread_id: Option<ThreadId>,
        data: BlockAddedData,
    },
    BlockFullyAdded {
        thread_id: Option<ThreadId>,
        data: BlockFullyAddedData,
    },
    MessageAdded {
        thread_id: Option<ThreadId>,
        message: Message,
    },
    MessageFullyAdded {
        thread_id: Option<ThreadId>,
        data: MessageFullyAddedData,
    },
    ToolResponseReceived(ToolResponseReceivedData),
    Error {
        thread_id: Option<ThreadId>,
        timestamp: Option<DateTime<Utc>>,
        data: ErrorData,
    },
}

impl SyncEvent {
    /// The wire name of this event's type.
    pub fn event_type(&self) -> &'static str {
        match self {
            SyncEvent::StreamingUpdated(_) => "StreamingUpdated",
            SyncEvent::BlockAdded { .. } => "BlockAdded",
            SyncEvent::BlockFullyAdded { .. } => "BlockFullyAdded",
            SyncEvent::MessageAdded { .. } => "MessageAdded",
            SyncEvent::MessageFullyAdded { .. } => "MessageFullyAdded",
            SyncEvent::ToolResponseReceived(_) => "ToolResponseReceived",
            SyncEvent::Error { .. } => "Error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_with_null_data_matches_absent_data() {
        let with_null: EventEnvelope =
            serde_json::from_str(r#"{"event_type": "Ping", "data": null}"#).unwrap();
        let absent: EventEnvelope = serde_json::from_str(r#"{"event_type": "Ping"}"#).unwrap();
        assert!(with_null.data.is_null());
        assert!(absent.data.is_null());
        assert!(with_null.thread_id.is_none());
    }

    #[test]
    fn streaming_updated_requires_content() {
        let missing = serde_json::from_str::<StreamingUpdatedData>(r#"{"block_id": "b1"}"#);
        assert!(missing.is_err());

        let ok: StreamingUpdatedData =
            serde_json::from_str(r#"{"block_id": "b1", "content": "Hel"}"#).unwrap();
        assert_eq!(ok.content, "Hel");
    }

    #[test]
    fn error_data_type_is_optional() {
        let e: ErrorData =
            serde_json::from_str(r#"{"error_message": "overloaded", "error_type": null}"#).unwrap();
        assert_eq!(e.error_message, "overloaded");
        assert!(e.error_type.is_none());
    }

    #[test]
    fn block_added_decodes_full_block() {
        let d: BlockAddedData = serde_json::from_str(
            r#"{
                "message_id": "m1",
                "block": {"id": "b1", "type": "plain", "content": "", "streaming": true}
            }"#,
        )
        .unwrap();
        assert_eq!(d.message_id.0, "m1");
        assert_eq!(d.block.id.0, "b1");
        assert!(d.block.streaming);
    }

    #[test]
    fn catalogue_covers_every_variant() {
        assert_eq!(EVENT_CATALOGUE.len(), 7);
        for name in EVENT_CATALOGUE {
            assert!(!name.is_empty());
        }
    }
}
