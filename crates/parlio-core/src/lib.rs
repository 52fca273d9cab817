// SPDX-FileCopyrightText: 2026 Parlio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Parlio conversation sync engine.
//!
//! This crate provides the conversation domain model (threads, messages,
//! blocks), the identifier newtypes, and the error type shared across the
//! Parlio workspace. It holds no behavior beyond the model itself; the store,
//! transport, and processor crates build on these types.

pub mod error;
pub mod model;

// Re-export key items at crate root for ergonomic imports.
pub use error::ParlioError;
pub use model::{
    Attachment, Block, BlockId, BlockKind, JobId, Message, MessageId, MessageLifecycle, Thread,
    ThreadId, ToolCallId,
};
