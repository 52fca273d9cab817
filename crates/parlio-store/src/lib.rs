// SPDX-FileCopyrightText: 2026 Parlio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authoritative in-memory conversation state for the Parlio sync engine.
//!
//! [`ConversationStore`] owns the canonical threads, messages, and blocks.
//! Mutations are copy-on-write per thread, reads are lock-free snapshots, and
//! change notifications are scoped to the exact slice that was touched.

pub mod notify;
pub mod store;

pub use notify::{ChangeKind, ChangeScope, StoreChange, Subscriptions};
pub use store::{BlockLocation, ConversationStore, MutationOutcome};
