// SPDX-FileCopyrightText: 2026 Parlio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The event processor: decoded events in, store mutations out.
//!
//! Each event is resolved to its owning thread through the correlation
//! registry, then applied as one mutation of canonical state. Events for
//! untracked jobs are dropped with a diagnostic. Mutations for a given thread
//! are applied strictly in arrival order because all of a session's events
//! flow through one processing task.
//!
//! The processor also owns the engine's two at-most-once guarantees: a
//! "new message" signal fires at most once per distinct message id for the
//! life of a processor instance, and provisional (optimistic) entries are
//! retired exactly once when their authoritative counterpart materializes.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use parlio_core::{JobId, MessageId, ThreadId};
use parlio_store::ConversationStore;
use parlio_wire::SyncEvent;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::correlation::JobRegistry;
use crate::optimistic::OptimisticEcho;

/// Out-of-band signals for the presentation layer.
///
/// These are pushed, never polled: the original fixed-interval re-reads of
/// streaming state are replaced by store-slice notifications plus this
/// channel for conditions that are not store mutations.
#[derive(Debug, Clone)]
pub enum EngineSignal {
    /// A message id was observed for the first time.
    NewMessage {
        thread_id: ThreadId,
        message_id: MessageId,
    },
    /// The server reported an error event. Conversation state is untouched;
    /// how to surface this is the presentation layer's decision.
    ServerError {
        thread_id: Option<ThreadId>,
        timestamp: Option<DateTime<Utc>>,
        error_message: String,
        error_type: Option<String>,
    },
    /// The push connection is terminally down (reconnects exhausted).
    TransportDown { job: JobId, attempts: u32 },
}

/// Applies decoded events to the store.
pub struct EventProcessor {
    store: Arc<ConversationStore>,
    registry: Arc<JobRegistry>,
    echo: Arc<OptimisticEcho>,
    seen: Mutex<HashSet<MessageId>>,
    signals: mpsc::UnboundedSender<EngineSignal>,
}

impl EventProcessor {
    pub fn new(
        store: Arc<ConversationStore>,
        registry: Arc<JobRegistry>,
        echo: Arc<OptimisticEcho>,
        signals: mpsc::UnboundedSender<EngineSignal>,
    ) -> Self {
        Self {
            store,
            registry,
            echo,
            seen: Mutex::new(HashSet::new()),
            signals,
        }
    }

    /// Applies one event arriving over a job's push connection.
    ///
    /// Correlation lookup is best-effort: an event for an untracked job is
    /// dropped -- no mutation, no fault.
    pub fn apply(&self, job: &JobId, event: SyncEvent) {
        let Some(thread_id) = self.registry.resolve(job) else {
            debug!(
                job_id = %job,
                event_type = event.event_type(),
                "dropping event for untracked job"
            );
            return;
        };
        self.apply_to_thread(&thread_id, event);
    }

    /// Applies one event already resolved to its thread (used for the
    /// outbound send's response stream, which is scoped to a thread by
    /// construction).
    pub fn apply_to_thread(&self, thread_id: &ThreadId, event: SyncEvent) {
        match event {
            SyncEvent::StreamingUpdated(data) => {
                let _ = self.store.append_block_content(&data.block_id, &data.content);
            }

            SyncEvent::BlockAdded { data, .. } => {
                let existed = self.message_exists(thread_id, &data.message_id);
                let message_id = data.message_id.clone();
                let outcome = self.store.append_block(thread_id, &data.message_id, data.block);
                if outcome.is_applied() && !existed {
                    // The block's shell message is the first authoritative
                    // assistant content: the provisional placeholder retires.
                    self.retire_placeholder(thread_id, &message_id);
                    self.note_new_message(thread_id, &message_id);
                }
            }

            SyncEvent::BlockFullyAdded { data, .. } => {
                let _ = self
                    .store
                    .freeze_block(thread_id, &data.message_id, &data.block_id);
            }

            SyncEvent::MessageAdded { message, .. } => {
                let message_id = message.id.clone();
                let is_ai = message.ai;

                let provisional = message
                    .client_token
                    .as_deref()
                    .and_then(|token| self.echo.take_pending(token));

                let outcome = match provisional {
                    Some(ref local) if self.message_exists(thread_id, local) => {
                        debug!(
                            provisional = %local,
                            authoritative = %message_id,
                            "reconciling optimistic message by client token"
                        );
                        self.store.replace_message(thread_id, local, message)
                    }
                    _ => self.store.append_message(thread_id, message),
                };

                if outcome.is_applied() {
                    if is_ai {
                        self.retire_placeholder(thread_id, &message_id);
                    }
                    self.note_new_message(thread_id, &message_id);
                }
            }

            SyncEvent::MessageFullyAdded { data, .. } => {
                let _ = self.store.freeze_message(thread_id, &data.message_id);
            }

            SyncEvent::ToolResponseReceived(data) => {
                let _ = self
                    .store
                    .set_tool_response(&data.block_id, &data.tool_call_id, data.response);
            }

            SyncEvent::Error {
                thread_id: event_thread,
                timestamp,
                data,
            } => {
                // Diagnostic only: server errors never become conversation
                // content. The presentation layer hears about it out of band.
                warn!(
                    thread_id = %thread_id,
                    error_type = data.error_type.as_deref().unwrap_or("unspecified"),
                    error = %data.error_message,
                    "server reported an error event"
                );
                let _ = self.signals.send(EngineSignal::ServerError {
                    thread_id: event_thread.or_else(|| Some(thread_id.clone())),
                    timestamp,
                    error_message: data.error_message,
                    error_type: data.error_type,
                });
            }
        }
    }

    /// Marks the locally seen set for a session bootstrap, so that messages
    /// already on screen after a bulk load do not re-announce themselves.
    pub fn note_loaded(&self, messages: impl IntoIterator<Item = MessageId>) {
        let mut seen = self.seen.lock().expect("seen set lock poisoned");
        seen.extend(messages);
    }

    fn message_exists(&self, thread_id: &ThreadId, message_id: &MessageId) -> bool {
        self.store
            .thread(thread_id)
            .is_some_and(|t| t.message(message_id).is_some())
    }

    fn retire_placeholder(&self, thread_id: &ThreadId, authoritative: &MessageId) {
        if let Some(placeholder) = self.echo.take_placeholder(thread_id)
            && &placeholder != authoritative
        {
            let _ = self.store.remove_message(thread_id, &placeholder);
        }
    }

    fn note_new_message(&self, thread_id: &ThreadId, message_id: &MessageId) {
        let mut seen = self.seen.lock().expect("seen set lock poisoned");
        if seen.insert(message_id.clone()) {
            let _ = self.signals.send(EngineSignal::NewMessage {
                thread_id: thread_id.clone(),
                message_id: message_id.clone(),
            });
        }
    }
}
