// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-zero timeouts and the relation between typing debounce and expiry.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::HearthConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &HearthConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let level = config.session.log_level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "session.log_level `{}` is not one of {}",
                config.session.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if config.sync.write_timeout_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "sync.write_timeout_ms must be greater than zero".to_string(),
        });
    }

    if config.typing.expiry_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "typing.expiry_ms must be greater than zero".to_string(),
        });
    }

    if config.typing.debounce_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "typing.debounce_ms must be greater than zero".to_string(),
        });
    }

    // A client typing continuously refreshes every debounce interval; if that
    // is not shorter than the expiry, its indicator flickers off between signals.
    if config.typing.debounce_ms >= config.typing.expiry_ms {
        errors.push(ConfigError::Validation {
            message: format!(
                "typing.debounce_ms ({}) must be less than typing.expiry_ms ({})",
                config.typing.debounce_ms, config.typing.expiry_ms
            ),
        });
    }

    if config.reactions.allowed.is_empty() {
        errors.push(ConfigError::Validation {
            message: "reactions.allowed must list at least one reaction".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for (i, kind) in config.reactions.allowed.iter().enumerate() {
        if kind.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("reactions.allowed[{i}] must not be empty"),
            });
        } else if !seen.insert(kind) {
            errors.push(ConfigError::Validation {
                message: format!("duplicate reaction `{kind}` in reactions.allowed"),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
