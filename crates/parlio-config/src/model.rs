// SPDX-FileCopyrightText: 2026 Parlio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model for the Parlio sync engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParlioConfig {
    pub server: ServerConfig,
    pub transport: TransportConfig,
}

/// Where the sync server lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the conversation server, without a trailing slash.
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
        }
    }
}

/// Knobs for the push connection and bounded requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Maximum consecutive reconnection attempts after abnormal drops.
    /// Exceeding this surfaces a terminal error and stops retrying.
    pub max_reconnect_attempts: u32,

    /// Base reconnect delay; attempt N waits `base_delay_ms * N`.
    pub base_delay_ms: u64,

    /// Connect/response timeout for bounded request/response calls. The
    /// long-lived push connection itself carries no wall-clock timeout.
    pub request_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 3,
            base_delay_ms: 1000,
            request_timeout_secs: 30,
        }
    }
}

impl TransportConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
