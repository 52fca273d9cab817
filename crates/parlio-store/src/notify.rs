// SPDX-FileCopyrightText: 2026 Parlio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slice-scoped change notifications.
//!
//! Subscribers register for one exact slice -- a thread, a message, or a block
//! -- and are notified only when that slice changes. There is deliberately no
//! whole-store fan-out: a conversation with many concurrently streaming blocks
//! would otherwise wake every subscriber on every delta.

use dashmap::DashMap;
use parlio_core::{BlockId, MessageId, ThreadId};
use tokio::sync::broadcast;

/// Per-channel buffer. A subscriber that lags this far behind loses the
/// oldest notices (`broadcast::error::RecvError::Lagged`), not its slot.
const CHANNEL_CAPACITY: usize = 64;

/// The slice a subscriber watches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeScope {
    Thread(ThreadId),
    Message(MessageId),
    Block(BlockId),
}

/// What happened to the touched slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    ThreadCreated,
    ThreadLoaded,
    MessageAppended,
    MessageMerged,
    MessageReplaced,
    MessageRemoved,
    MessageFinalized,
    BlockAppended,
    ContentAppended,
    BlockFinalized,
    ToolResponseSet,
}

/// A change notice describing exactly which slice was touched.
#[derive(Debug, Clone)]
pub struct StoreChange {
    pub kind: ChangeKind,
    pub thread_id: ThreadId,
    pub message_id: Option<MessageId>,
    pub block_id: Option<BlockId>,
}

impl StoreChange {
    /// The scopes this change notifies: the block actually touched (if any),
    /// its message (if any), and its thread.
    fn scopes(&self) -> impl Iterator<Item = ChangeScope> {
        let block = self.block_id.clone().map(ChangeScope::Block);
        let message = self.message_id.clone().map(ChangeScope::Message);
        let thread = Some(ChangeScope::Thread(self.thread_id.clone()));
        block.into_iter().chain(message).chain(thread)
    }
}

/// Registry of per-slice broadcast channels.
///
/// Channels are created lazily on first subscription and pruned once their
/// last receiver is gone, so idle slices cost nothing.
#[derive(Debug, Default)]
pub struct Subscriptions {
    channels: DashMap<ChangeScope, broadcast::Sender<StoreChange>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to one exact slice.
    pub fn subscribe(&self, scope: ChangeScope) -> broadcast::Receiver<StoreChange> {
        self.channels
            .entry(scope)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Delivers a change to the subscribers of every scope it touches.
    pub fn publish(&self, change: &StoreChange) {
        for scope in change.scopes() {
            let Some(sender) = self.channels.get(&scope) else {
                continue;
            };
            if sender.send(change.clone()).is_err() {
                // Last receiver dropped; release the entry guard, then prune.
                drop(sender);
                self.channels
                    .remove_if(&scope, |_, tx| tx.receiver_count() == 0);
            }
        }
    }

    /// Number of live slice channels (test and diagnostics hook).
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
