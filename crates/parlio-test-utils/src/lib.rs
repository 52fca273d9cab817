// SPDX-FileCopyrightText: 2026 Parlio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for the Parlio workspace: SSE frame builders and a
//! wiremock-backed mock conversation server for integration tests.

pub mod frames;
pub mod server;

pub use server::MockEventServer;
