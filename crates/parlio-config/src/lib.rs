// SPDX-FileCopyrightText: 2026 Parlio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration for the Parlio sync engine: compiled defaults,
//! system/XDG/local TOML files, and `PARLIO_*` environment overrides.

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{ParlioConfig, ServerConfig, TransportConfig};
