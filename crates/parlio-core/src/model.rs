// SPDX-FileCopyrightText: 2026 Parlio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation domain model: threads, messages, blocks, and their identifiers.
//!
//! The store exclusively owns canonical [`Thread`]/[`Message`]/[`Block`] values.
//! Messages within a thread hold their blocks inline; every optional wire field
//! uses `Option` + `#[serde(default)]` so that an explicit JSON `null` and an
//! absent field decode identically.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable identifier for a conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub String);

/// Identifier for a single message (one author's turn).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Identifier for an atomic, independently streamable content block.
///
/// Block ids are unique across an entire thread, which is what makes the
/// store's `block -> message` index possible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub String);

/// Ephemeral identifier for a server-side generation run.
///
/// Jobs exist only in the correlation registry; they are never stored on
/// threads or messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

/// Identifier correlating a tool invocation with its response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallId(pub String);

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The kind of content a block carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Plain assistant or user text.
    Plain,
    /// Model reasoning content.
    Reasoning,
    /// A tool invocation (name, args, eventual response).
    ToolUse,
    /// An error surfaced as conversation content.
    Error,
}

/// An atomic, independently streamable content unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,

    #[serde(rename = "type")]
    pub kind: BlockKind,

    /// Accumulated text. `None` until the first streaming update arrives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// `true` while more content may still arrive; once `false` the block is
    /// frozen and no further content mutation is permitted.
    pub streaming: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<ToolCallId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_args: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_response: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_error: Option<String>,
}

/// A file reference attached to a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub file_id: String,
    pub mime_type: String,
    pub filename: String,
}

/// One author's turn: an ordered, append-only sequence of blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,

    /// Whether this turn was produced by a generation run.
    pub ai: bool,

    /// Authorship is optional: a message shell created from its first block
    /// event carries no author until the authoritative `MessageAdded` fills it
    /// in. Authorship is never fabricated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,

    pub timestamp: DateTime<Utc>,

    /// `true` while more blocks or block content may still arrive.
    #[serde(default)]
    pub streaming: bool,

    #[serde(default)]
    pub blocks: Vec<Block>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,

    /// Client-generated idempotency token echoed by the server, used to
    /// reconcile an optimistic local message with its authoritative copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_token: Option<String>,
}

/// Lifecycle of a message as observed through the event stream.
///
/// `Uncreated` is represented by absence from the store; the remaining states
/// are derived from the stored message so they can never drift out of sync
/// with its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLifecycle {
    /// Created (explicitly or as a shell) but no blocks received yet.
    CreatedEmpty,
    /// At least one block received; more may arrive.
    ReceivingBlocks,
    /// Frozen: the message and all its blocks stopped streaming.
    Finalized,
}

impl Message {
    pub fn lifecycle(&self) -> MessageLifecycle {
        if !self.streaming {
            MessageLifecycle::Finalized
        } else if self.blocks.is_empty() {
            MessageLifecycle::CreatedEmpty
        } else {
            MessageLifecycle::ReceivingBlocks
        }
    }

    /// Looks up a block by id within this message.
    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| &b.id == id)
    }
}

/// A durable conversation: an ordered sequence of messages.
///
/// Messages are held behind `Arc` so that copy-on-write thread snapshots stay
/// cheap; the store uses `Arc::make_mut` on the single mutation path.
#[derive(Debug, Clone)]
pub struct Thread {
    pub id: ThreadId,
    pub messages: Vec<Arc<Message>>,
}

impl Thread {
    pub fn new(id: ThreadId) -> Self {
        Self {
            id,
            messages: Vec::new(),
        }
    }

    /// Looks up a message by id within this thread.
    pub fn message(&self, id: &MessageId) -> Option<&Arc<Message>> {
        self.messages.iter().find(|m| &m.id == id)
    }
}
