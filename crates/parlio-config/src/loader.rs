// SPDX-FileCopyrightText: 2026 Parlio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./parlio.toml` > `~/.config/parlio/parlio.toml` >
//! `/etc/parlio/parlio.toml` with environment variable overrides via the
//! `PARLIO_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::ParlioConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/parlio/parlio.toml` (system-wide)
/// 3. `~/.config/parlio/parlio.toml` (user XDG config)
/// 4. `./parlio.toml` (local directory)
/// 5. `PARLIO_*` environment variables
pub fn load_config() -> Result<ParlioConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ParlioConfig::default()))
        .merge(Toml::file("/etc/parlio/parlio.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("parlio/parlio.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("parlio.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and embedded configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<ParlioConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ParlioConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ParlioConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ParlioConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping. `Env::split("_")` would be ambiguous for keys that
/// themselves contain underscores (`PARLIO_TRANSPORT_BASE_DELAY_MS` must map
/// to `transport.base_delay_ms`, not `transport.base.delay.ms`).
fn env_provider() -> Env {
    Env::prefixed("PARLIO_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("transport_", "transport.", 1);
        mapped.into()
    })
}
