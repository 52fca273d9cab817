// SPDX-FileCopyrightText: 2026 Parlio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The authoritative in-memory conversation store.
//!
//! Mutations compute a new version of the touched thread and swap it into the
//! top-level map (copy-on-write for the touched entity only), so readers
//! always observe a consistent snapshot without coordinating with the writer.
//! All mutations for one thread happen on one cooperative execution path; the
//! interior locks exist for memory safety, not for ordering.
//!
//! A mutation targeting a thread, message, or block that does not exist is a
//! no-op with a diagnostic -- never a fault. One stale frame must not be able
//! to end a session.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use parlio_core::{Block, BlockId, Message, MessageId, Thread, ThreadId, ToolCallId};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::notify::{ChangeKind, ChangeScope, StoreChange, Subscriptions};

/// Where a block lives: the thread and message that hold it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLocation {
    pub thread_id: ThreadId,
    pub message_id: MessageId,
}

/// Whether a mutation actually changed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied,
    Skipped,
}

impl MutationOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, MutationOutcome::Applied)
    }
}

/// Authoritative, queryable conversation state.
///
/// The store exclusively owns canonical thread/message/block values. It keeps
/// an auxiliary `block_id -> (thread, message)` index, updated on every block
/// insertion, so "which message holds block X" never scans message lists.
#[derive(Debug, Default)]
pub struct ConversationStore {
    threads: RwLock<HashMap<ThreadId, Arc<Thread>>>,
    block_index: RwLock<HashMap<BlockId, BlockLocation>>,
    subscriptions: Subscriptions,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Reads ---

    /// Returns a snapshot of the thread. The snapshot never changes after it
    /// is returned; later mutations swap in a new version instead.
    pub fn thread(&self, id: &ThreadId) -> Option<Arc<Thread>> {
        self.threads.read().expect("threads lock poisoned").get(id).cloned()
    }

    /// Resolves which message holds the given block, without scanning.
    pub fn locate_block(&self, id: &BlockId) -> Option<BlockLocation> {
        self.block_index
            .read()
            .expect("block index lock poisoned")
            .get(id)
            .cloned()
    }

    pub fn thread_count(&self) -> usize {
        self.threads.read().expect("threads lock poisoned").len()
    }

    /// Subscribes to change notices for one exact slice.
    pub fn subscribe(&self, scope: ChangeScope) -> broadcast::Receiver<StoreChange> {
        self.subscriptions.subscribe(scope)
    }

    // --- Mutations ---

    /// Creates an empty thread. Skipped if the thread already exists.
    pub fn create_thread(&self, id: &ThreadId) -> MutationOutcome {
        {
            let mut threads = self.threads.write().expect("threads lock poisoned");
            if threads.contains_key(id) {
                debug!(thread_id = %id, "create_thread: thread already exists");
                return MutationOutcome::Skipped;
            }
            threads.insert(id.clone(), Arc::new(Thread::new(id.clone())));
        }
        self.subscriptions.publish(&StoreChange {
            kind: ChangeKind::ThreadCreated,
            thread_id: id.clone(),
            message_id: None,
            block_id: None,
        });
        MutationOutcome::Applied
    }

    /// Bulk-loads a thread's history, replacing any prior content.
    ///
    /// Messages are ordered by timestamp (live events are ordered by arrival
    /// instead) and the block index is rebuilt for the thread.
    pub fn load_thread(&self, id: &ThreadId, mut messages: Vec<Message>) -> MutationOutcome {
        messages.sort_by_key(|m| m.timestamp);

        let thread = Thread {
            id: id.clone(),
            messages: messages.into_iter().map(Arc::new).collect(),
        };

        {
            let mut threads = self.threads.write().expect("threads lock poisoned");
            let mut index = self.block_index.write().expect("block index lock poisoned");

            // Drop stale index entries from a previous load of this thread.
            index.retain(|_, loc| &loc.thread_id != id);
            for message in &thread.messages {
                for block in &message.blocks {
                    index.insert(
                        block.id.clone(),
                        BlockLocation {
                            thread_id: id.clone(),
                            message_id: message.id.clone(),
                        },
                    );
                }
            }
            threads.insert(id.clone(), Arc::new(thread));
        }

        self.subscriptions.publish(&StoreChange {
            kind: ChangeKind::ThreadLoaded,
            thread_id: id.clone(),
            message_id: None,
            block_id: None,
        });
        MutationOutcome::Applied
    }

    /// Appends a full message to the thread.
    ///
    /// If a message with the same id already exists (a shell created from its
    /// first block event), the authoritative identity -- authorship, ai flag,
    /// timestamp, attachments, client token -- is merged onto the shell and
    /// its blocks are kept.
    pub fn append_message(&self, thread_id: &ThreadId, message: Message) -> MutationOutcome {
        self.mutate(thread_id, "append_message", |thread, index| {
            if let Some(existing) = thread
                .messages
                .iter_mut()
                .find(|m| m.id == message.id)
            {
                let shell = Arc::make_mut(existing);
                shell.ai = message.ai;
                shell.author_id = message.author_id.clone();
                shell.author_name = message.author_name.clone();
                shell.timestamp = message.timestamp;
                shell.attachments = message.attachments.clone();
                shell.client_token = message.client_token.clone();
                return Some(vec![StoreChange {
                    kind: ChangeKind::MessageMerged,
                    thread_id: thread.id.clone(),
                    message_id: Some(message.id.clone()),
                    block_id: None,
                }]);
            }

            for block in &message.blocks {
                index.insert(
                    block.id.clone(),
                    BlockLocation {
                        thread_id: thread.id.clone(),
                        message_id: message.id.clone(),
                    },
                );
            }
            let message_id = message.id.clone();
            thread.messages.push(Arc::new(message));
            Some(vec![StoreChange {
                kind: ChangeKind::MessageAppended,
                thread_id: thread.id.clone(),
                message_id: Some(message_id),
                block_id: None,
            }])
        })
    }

    /// Replaces one message with another, preserving its position.
    ///
    /// Used by optimistic reconciliation to swap a provisional message for the
    /// authoritative one. The block index entries of the old message are
    /// dropped and the new message's blocks are indexed.
    pub fn replace_message(
        &self,
        thread_id: &ThreadId,
        old_id: &MessageId,
        message: Message,
    ) -> MutationOutcome {
        self.mutate(thread_id, "replace_message", |thread, index| {
            let position = thread.messages.iter().position(|m| &m.id == old_id)?;

            for block in &thread.messages[position].blocks {
                index.remove(&block.id);
            }
            for block in &message.blocks {
                index.insert(
                    block.id.clone(),
                    BlockLocation {
                        thread_id: thread.id.clone(),
                        message_id: message.id.clone(),
                    },
                );
            }

            let message_id = message.id.clone();
            thread.messages[position] = Arc::new(message);
            Some(vec![StoreChange {
                kind: ChangeKind::MessageReplaced,
                thread_id: thread.id.clone(),
                message_id: Some(message_id),
                block_id: None,
            }])
        })
    }

    /// Removes a message (used to retire optimistic placeholders).
    pub fn remove_message(&self, thread_id: &ThreadId, message_id: &MessageId) -> MutationOutcome {
        self.mutate(thread_id, "remove_message", |thread, index| {
            let position = thread.messages.iter().position(|m| &m.id == message_id)?;
            for block in &thread.messages[position].blocks {
                index.remove(&block.id);
            }
            thread.messages.remove(position);
            Some(vec![StoreChange {
                kind: ChangeKind::MessageRemoved,
                thread_id: thread.id.clone(),
                message_id: Some(message_id.clone()),
                block_id: None,
            }])
        })
    }

    /// Appends a block to the named message's block list.
    ///
    /// If the message does not exist yet, a shell message is created around
    /// the block: streaming, marked as AI output (block events only arrive
    /// over generation runs), with authorship left unset rather than invented.
    pub fn append_block(
        &self,
        thread_id: &ThreadId,
        message_id: &MessageId,
        block: Block,
    ) -> MutationOutcome {
        self.mutate(thread_id, "append_block", |thread, index| {
            let block_id = block.id.clone();

            match thread.messages.iter_mut().find(|m| &m.id == message_id) {
                Some(existing) => {
                    if !existing.streaming {
                        warn!(
                            message_id = %message_id,
                            block_id = %block.id,
                            "append_block: message is finalized; dropping block"
                        );
                        return None;
                    }
                    if existing.blocks.iter().any(|b| b.id == block.id) {
                        warn!(
                            message_id = %message_id,
                            block_id = %block.id,
                            "append_block: duplicate block id; dropping block"
                        );
                        return None;
                    }
                    index.insert(
                        block.id.clone(),
                        BlockLocation {
                            thread_id: thread.id.clone(),
                            message_id: message_id.clone(),
                        },
                    );
                    Arc::make_mut(existing).blocks.push(block);
                }
                None => {
                    debug!(
                        message_id = %message_id,
                        block_id = %block.id,
                        "append_block: creating shell message for first block"
                    );
                    index.insert(
                        block.id.clone(),
                        BlockLocation {
                            thread_id: thread.id.clone(),
                            message_id: message_id.clone(),
                        },
                    );
                    thread.messages.push(Arc::new(Message {
                        id: message_id.clone(),
                        ai: true,
                        author_id: None,
                        author_name: None,
                        timestamp: chrono::Utc::now(),
                        streaming: true,
                        blocks: vec![block],
                        attachments: Vec::new(),
                        client_token: None,
                    }));
                }
            }

            Some(vec![StoreChange {
                kind: ChangeKind::BlockAppended,
                thread_id: thread.id.clone(),
                message_id: Some(message_id.clone()),
                block_id: Some(block_id),
            }])
        })
    }

    /// Appends streaming content to a block, located through the index.
    ///
    /// A frozen block (`streaming == false`) is immutable: the update is
    /// skipped with a diagnostic.
    pub fn append_block_content(&self, block_id: &BlockId, content: &str) -> MutationOutcome {
        let Some(location) = self.locate_block(block_id) else {
            warn!(block_id = %block_id, "append_block_content: unknown block");
            return MutationOutcome::Skipped;
        };

        self.mutate(&location.thread_id, "append_block_content", |thread, _| {
            let message = thread
                .messages
                .iter_mut()
                .find(|m| m.id == location.message_id)?;
            let owner = Arc::make_mut(message);
            let block = owner.blocks.iter_mut().find(|b| &b.id == block_id)?;

            if !block.streaming {
                warn!(
                    block_id = %block_id,
                    "append_block_content: block is frozen; dropping update"
                );
                return None;
            }

            block.content.get_or_insert_with(String::new).push_str(content);
            Some(vec![StoreChange {
                kind: ChangeKind::ContentAppended,
                thread_id: thread.id.clone(),
                message_id: Some(location.message_id.clone()),
                block_id: Some(block_id.clone()),
            }])
        })
    }

    /// Freezes a block: no further content mutation is permitted.
    pub fn freeze_block(
        &self,
        thread_id: &ThreadId,
        message_id: &MessageId,
        block_id: &BlockId,
    ) -> MutationOutcome {
        self.mutate(thread_id, "freeze_block", |thread, _| {
            let message = thread.messages.iter_mut().find(|m| &m.id == message_id)?;
            let owner = Arc::make_mut(message);
            let block = owner.blocks.iter_mut().find(|b| &b.id == block_id)?;

            if !block.streaming {
                debug!(block_id = %block_id, "freeze_block: already frozen");
                return None;
            }
            block.streaming = false;
            Some(vec![StoreChange {
                kind: ChangeKind::BlockFinalized,
                thread_id: thread.id.clone(),
                message_id: Some(message_id.clone()),
                block_id: Some(block_id.clone()),
            }])
        })
    }

    /// Freezes a message and every block it contains.
    pub fn freeze_message(&self, thread_id: &ThreadId, message_id: &MessageId) -> MutationOutcome {
        self.mutate(thread_id, "freeze_message", |thread, _| {
            let message = thread.messages.iter_mut().find(|m| &m.id == message_id)?;
            let owner = Arc::make_mut(message);

            let mut changes = Vec::new();
            for block in owner.blocks.iter_mut().filter(|b| b.streaming) {
                block.streaming = false;
                changes.push(StoreChange {
                    kind: ChangeKind::BlockFinalized,
                    thread_id: thread.id.clone(),
                    message_id: Some(message_id.clone()),
                    block_id: Some(block.id.clone()),
                });
            }

            if owner.streaming {
                owner.streaming = false;
            } else if changes.is_empty() {
                debug!(message_id = %message_id, "freeze_message: already finalized");
                return None;
            }

            changes.push(StoreChange {
                kind: ChangeKind::MessageFinalized,
                thread_id: thread.id.clone(),
                message_id: Some(message_id.clone()),
                block_id: None,
            });
            Some(changes)
        })
    }

    /// Records a tool response on the block identified by `block_id`.
    pub fn set_tool_response(
        &self,
        block_id: &BlockId,
        tool_call_id: &ToolCallId,
        response: serde_json::Value,
    ) -> MutationOutcome {
        let Some(location) = self.locate_block(block_id) else {
            warn!(block_id = %block_id, "set_tool_response: unknown block");
            return MutationOutcome::Skipped;
        };

        self.mutate(&location.thread_id, "set_tool_response", |thread, _| {
            let message = thread
                .messages
                .iter_mut()
                .find(|m| m.id == location.message_id)?;
            let owner = Arc::make_mut(message);
            let block = owner.blocks.iter_mut().find(|b| &b.id == block_id)?;

            if let Some(existing) = &block.tool_call_id
                && existing != tool_call_id
            {
                warn!(
                    block_id = %block_id,
                    expected = %existing.0,
                    received = %tool_call_id.0,
                    "set_tool_response: tool_call_id mismatch; applying by block id"
                );
            }

            block.tool_call_response = Some(response);
            Some(vec![StoreChange {
                kind: ChangeKind::ToolResponseSet,
                thread_id: thread.id.clone(),
                message_id: Some(location.message_id.clone()),
                block_id: Some(block_id.clone()),
            }])
        })
    }

    /// Drops all conversation state. Called at session teardown.
    pub fn clear(&self) {
        self.threads.write().expect("threads lock poisoned").clear();
        self.block_index
            .write()
            .expect("block index lock poisoned")
            .clear();
    }

    /// Copy-on-write mutation of one thread.
    ///
    /// Clones the current version, applies `f`, and swaps the new version in
    /// only if `f` reports changes. Notifications go out after the locks are
    /// released.
    fn mutate<F>(&self, thread_id: &ThreadId, op: &'static str, f: F) -> MutationOutcome
    where
        F: FnOnce(&mut Thread, &mut HashMap<BlockId, BlockLocation>) -> Option<Vec<StoreChange>>,
    {
        let changes = {
            let mut threads = self.threads.write().expect("threads lock poisoned");
            let Some(current) = threads.get(thread_id) else {
                warn!(thread_id = %thread_id, op, "mutation targets unknown thread");
                return MutationOutcome::Skipped;
            };

            let mut next = Thread::clone(current);
            let mut index = self.block_index.write().expect("block index lock poisoned");
            match f(&mut next, &mut index) {
                Some(changes) => {
                    threads.insert(thread_id.clone(), Arc::new(next));
                    changes
                }
                None => {
                    debug!(thread_id = %thread_id, op, "mutation skipped");
                    return MutationOutcome::Skipped;
                }
            }
        };

        for change in &changes {
            self.subscriptions.publish(change);
        }
        MutationOutcome::Applied
    }
}
