// SPDX-FileCopyrightText: 2026 Parlio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Optimistic local echo.
//!
//! The UI shows the user's message -- and a provisional "assistant responding"
//! placeholder -- immediately, before the server confirms anything. Both are
//! ordinary store messages under locally generated temporary ids.
//!
//! Reconciliation key: every echoed user message carries a client-generated
//! `client_token`, sent with the outbound request and echoed by the server
//! inside the authoritative `MessageAdded`. The processor swaps the
//! provisional message for the authoritative one in place when the tokens
//! match. Assistant placeholders are retired when the first authoritative
//! assistant message materializes in the same thread.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use parlio_core::{Attachment, Message, MessageId, ThreadId};
use parlio_store::ConversationStore;
use tracing::debug;
use uuid::Uuid;

/// Prefix marking locally generated, not-yet-confirmed ids.
const LOCAL_ID_PREFIX: &str = "local-";

/// What a user-message echo produced: the provisional id and the token the
/// server will echo back.
#[derive(Debug, Clone)]
pub struct EchoReceipt {
    pub message_id: MessageId,
    pub client_token: String,
}

/// A draft of an outbound user message.
#[derive(Debug, Clone, Default)]
pub struct Draft {
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub author_id: Option<String>,
    pub author_name: Option<String>,
}

/// Inserts provisional entries and tracks them until reconciliation.
#[derive(Debug)]
pub struct OptimisticEcho {
    store: Arc<ConversationStore>,
    /// client_token -> provisional user message id.
    pending: DashMap<String, MessageId>,
    /// thread -> provisional assistant placeholder id.
    placeholders: DashMap<ThreadId, MessageId>,
}

impl OptimisticEcho {
    pub fn new(store: Arc<ConversationStore>) -> Self {
        Self {
            store,
            pending: DashMap::new(),
            placeholders: DashMap::new(),
        }
    }

    fn local_id() -> MessageId {
        MessageId(format!("{LOCAL_ID_PREFIX}{}", Uuid::new_v4()))
    }

    /// Inserts the user's message provisionally and returns its receipt.
    pub fn echo_user_message(&self, thread_id: &ThreadId, draft: &Draft) -> EchoReceipt {
        let message_id = Self::local_id();
        let client_token = Uuid::new_v4().to_string();

        let message = Message {
            id: message_id.clone(),
            ai: false,
            author_id: draft.author_id.clone(),
            author_name: draft.author_name.clone(),
            timestamp: Utc::now(),
            streaming: false,
            blocks: vec![parlio_core::Block {
                id: parlio_core::BlockId(format!("{LOCAL_ID_PREFIX}{}", Uuid::new_v4())),
                kind: parlio_core::BlockKind::Plain,
                content: Some(draft.content.clone()),
                streaming: false,
                tool_name: None,
                tool_call_id: None,
                tool_call_args: None,
                tool_call_response: None,
                tool_call_error: None,
            }],
            attachments: draft.attachments.clone(),
            client_token: Some(client_token.clone()),
        };

        let _ = self.store.append_message(thread_id, message);
        self.pending.insert(client_token.clone(), message_id.clone());
        debug!(thread_id = %thread_id, message_id = %message_id, "echoed user message");

        EchoReceipt {
            message_id,
            client_token,
        }
    }

    /// Inserts an empty streaming assistant placeholder for the thread.
    ///
    /// At most one placeholder per thread; a second call replaces the
    /// tracking entry but leaves the earlier provisional message to be
    /// retired by reconciliation.
    pub fn echo_assistant_placeholder(&self, thread_id: &ThreadId) -> MessageId {
        let message_id = Self::local_id();

        let message = Message {
            id: message_id.clone(),
            ai: true,
            author_id: None,
            author_name: None,
            timestamp: Utc::now(),
            streaming: true,
            blocks: Vec::new(),
            attachments: Vec::new(),
            client_token: None,
        };

        let _ = self.store.append_message(thread_id, message);
        self.placeholders.insert(thread_id.clone(), message_id.clone());
        debug!(thread_id = %thread_id, message_id = %message_id, "echoed assistant placeholder");

        message_id
    }

    /// Claims the provisional user message for an echoed token, if any.
    pub fn take_pending(&self, client_token: &str) -> Option<MessageId> {
        self.pending.remove(client_token).map(|(_, id)| id)
    }

    /// Claims the assistant placeholder for a thread, if any.
    pub fn take_placeholder(&self, thread_id: &ThreadId) -> Option<MessageId> {
        self.placeholders.remove(thread_id).map(|(_, id)| id)
    }

    /// Drops all tracking state. Called at session teardown.
    pub fn clear(&self) {
        self.pending.clear();
        self.placeholders.clear();
    }
}
