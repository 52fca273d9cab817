// SPDX-FileCopyrightText: 2026 Parlio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire protocol for the Parlio sync engine: the typed event catalogue and the
//! tolerant SSE frame decoder.
//!
//! Frames arrive as `event: <name>` / `data: <JSON>` pairs terminated by a
//! blank line. [`decode_frame`] turns one frame into a schema-checked
//! [`SyncEvent`], or nothing: malformed or unrecognized frames are logged and
//! dropped, never raised, because a single bad frame must not end the stream.

pub mod decode;
pub mod types;

pub use decode::{decode_frame, decoded_stream};
pub use types::{
    BlockAddedData, BlockFullyAddedData, ErrorData, EventEnvelope, MessageFullyAddedData,
    StreamingUpdatedData, SyncEvent, ToolResponseReceivedData, EVENT_CATALOGUE,
};
