// SPDX-FileCopyrightText: 2026 Parlio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The synchronization engine: job correlation, event processing, optimistic
//! reconciliation, and session assembly.
//!
//! Data flow: Transport -> Decoder -> [`EventProcessor`] -> Store, with the
//! [`JobRegistry`] resolving which thread each job's events belong to.
//! UI-facing consumers subscribe to store slices and to the session's
//! [`EngineSignal`] channel; nothing here is polled.

pub mod correlation;
pub mod optimistic;
pub mod processor;
pub mod session;

pub use correlation::JobRegistry;
pub use optimistic::{Draft, EchoReceipt, OptimisticEcho};
pub use processor::{EngineSignal, EventProcessor};
pub use session::SyncSession;
