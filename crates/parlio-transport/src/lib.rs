// SPDX-FileCopyrightText: 2026 Parlio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport layer for the Parlio sync engine.
//!
//! [`EventSocket`] maintains the long-lived push connection for a generation
//! job -- one live connection at most, frames in network order, linear-backoff
//! reconnects on abnormal drops. [`MessageSender`] performs the outbound
//! send-with-stream call whose SSE response feeds the same decode path.

pub mod send;
pub mod socket;

pub use send::{MessageSender, OutboundMessage, ResponseEventStream};
pub use socket::{ConnectionState, EventSocket, SocketItem};
