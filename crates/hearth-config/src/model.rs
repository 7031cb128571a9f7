// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Hearth sync engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Hearth configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HearthConfig {
    /// Session-wide settings (logging).
    #[serde(default)]
    pub session: SessionConfig,

    /// Optimistic write and change-feed settings.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Typing indicator timing.
    #[serde(default)]
    pub typing: TypingConfig,

    /// Supported reaction symbols.
    #[serde(default)]
    pub reactions: ReactionConfig,
}

/// Session-wide configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Optimistic mutation and change-feed configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Upper bound for a single remote write. A write that takes longer is
    /// treated as failed and its optimistic entry is reverted.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Propose the temporary id as the row id on insert, so the reconciled
    /// row and its feed echo share the same key.
    #[serde(default)]
    pub client_assigned_ids: bool,

    /// Fetch missing display fields (sender names) for inserts arriving on
    /// the change feed before merging them.
    #[serde(default = "default_hydrate_inserts")]
    pub hydrate_inserts: bool,
}

impl SyncConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            write_timeout_ms: default_write_timeout_ms(),
            client_assigned_ids: false,
            hydrate_inserts: default_hydrate_inserts(),
        }
    }
}

fn default_write_timeout_ms() -> u64 {
    10_000
}

fn default_hydrate_inserts() -> bool {
    true
}

/// Typing indicator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TypingConfig {
    /// How long a received typing signal stays visible without a refresh.
    #[serde(default = "default_expiry_ms")]
    pub expiry_ms: u64,

    /// Minimum interval between two outbound typing signals from this client.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl TypingConfig {
    pub fn expiry(&self) -> Duration {
        Duration::from_millis(self.expiry_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            expiry_ms: default_expiry_ms(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_expiry_ms() -> u64 {
    3_000
}

fn default_debounce_ms() -> u64 {
    2_000
}

/// Reaction configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReactionConfig {
    /// Reaction symbols users may toggle.
    #[serde(default = "default_allowed_reactions")]
    pub allowed: Vec<String>,
}

impl Default for ReactionConfig {
    fn default() -> Self {
        Self {
            allowed: default_allowed_reactions(),
        }
    }
}

fn default_allowed_reactions() -> Vec<String> {
    vec!["\u{2764}\u{fe0f}".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let config = HearthConfig::default();
        assert_eq!(config.session.log_level, "info");
        assert_eq!(config.sync.write_timeout(), Duration::from_secs(10));
        assert!(!config.sync.client_assigned_ids);
        assert!(config.sync.hydrate_inserts);
        assert_eq!(config.typing.expiry(), Duration::from_secs(3));
        assert_eq!(config.typing.debounce(), Duration::from_secs(2));
        assert_eq!(config.reactions.allowed, vec!["\u{2764}\u{fe0f}"]);
    }
}
