// SPDX-FileCopyrightText: 2026 Parlio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Parlio sync engine.

use thiserror::Error;

/// The primary error type used across the Parlio workspace.
///
/// Decode-time and apply-time failures never surface through this type at the
/// event-processing boundary; they degrade to logged diagnostics so that one
/// bad frame cannot end a session. Only transport-level conditions (and
/// configuration problems at construction time) are reported as errors.
#[derive(Debug, Error)]
pub enum ParlioError {
    /// Configuration errors (invalid TOML, bad base URL, invalid header values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport errors (connection failure, abnormal stream drop, bad response).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The reconnection budget was exhausted; the connection is terminally down.
    ///
    /// This is the only failure that must be visibly reported to the end user.
    #[error("connection lost after {attempts} reconnection attempts")]
    RetriesExhausted { attempts: u32 },

    /// Frame decode failure (malformed JSON or schema mismatch). Always
    /// non-fatal at the stream level; carried here only for diagnostics.
    #[error("decode error: {message}")]
    Decode {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A bounded request/response call exceeded its deadline.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
