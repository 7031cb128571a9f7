// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Hearth configuration system.

use hearth_config::diagnostic::ConfigError;
use hearth_config::{
    load_and_validate_path, load_and_validate_str, load_config, load_config_from_str,
};

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_hearth_config() {
    let toml = r#"
[session]
log_level = "debug"

[sync]
write_timeout_ms = 2500
client_assigned_ids = true
hydrate_inserts = false

[typing]
expiry_ms = 5000
debounce_ms = 1000

[reactions]
allowed = ["+1", "party"]
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.session.log_level, "debug");
    assert_eq!(config.sync.write_timeout_ms, 2500);
    assert!(config.sync.client_assigned_ids);
    assert!(!config.sync.hydrate_inserts);
    assert_eq!(config.typing.expiry_ms, 5000);
    assert_eq!(config.typing.debounce_ms, 1000);
    assert_eq!(config.reactions.allowed, vec!["+1", "party"]);
}

/// Sections left out of the file keep their defaults.
#[test]
fn partial_toml_keeps_defaults() {
    let config = load_config_from_str("[typing]\nexpiry_ms = 4000\n").unwrap();
    assert_eq!(config.typing.expiry_ms, 4000);
    assert_eq!(config.typing.debounce_ms, 2000);
    assert_eq!(config.sync.write_timeout_ms, 10_000);
}

/// Unknown key in a section produces an UnknownKey diagnostic with a suggestion.
#[test]
fn unknown_key_in_typing_suggests_correction() {
    let errors = load_and_validate_str("[typing]\nexpiry_sm = 10\n")
        .expect_err("should reject unknown field");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "expiry_sm");
            assert_eq!(suggestion.as_deref(), Some("expiry_ms"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

/// Unknown top-level section is rejected.
#[test]
fn unknown_section_is_rejected() {
    let errors = load_and_validate_str("[sycn]\nwrite_timeout_ms = 1\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::UnknownKey { .. }));
}

/// Wrong value type produces an InvalidType diagnostic naming the key path.
#[test]
fn wrong_type_is_reported_with_path() {
    let errors = load_and_validate_str("[sync]\nwrite_timeout_ms = \"soon\"\n").unwrap_err();
    match &errors[0] {
        ConfigError::InvalidType { key, .. } => assert_eq!(key, "sync.write_timeout_ms"),
        other => panic!("expected InvalidType, got {other:?}"),
    }
}

/// Semantic validation runs after successful deserialization.
#[test]
fn validation_errors_are_collected() {
    let errors = load_and_validate_str(
        r#"
[typing]
expiry_ms = 1000
debounce_ms = 1000

[reactions]
allowed = []
"#,
    )
    .unwrap_err();
    assert_eq!(errors.len(), 2);
    assert!(
        errors
            .iter()
            .all(|e| matches!(e, ConfigError::Validation { .. }))
    );
}

/// Environment variables override file values, including underscore-heavy keys.
#[test]
fn env_overrides_local_file() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "hearth.toml",
            r#"
[sync]
write_timeout_ms = 2500

[typing]
debounce_ms = 1500
"#,
        )?;
        jail.set_env("HEARTH_SYNC_WRITE_TIMEOUT_MS", "750");
        jail.set_env("HEARTH_SYNC_CLIENT_ASSIGNED_IDS", "true");

        let config = load_config()?;
        assert_eq!(config.sync.write_timeout_ms, 750);
        assert!(config.sync.client_assigned_ids);
        assert_eq!(config.typing.debounce_ms, 1500);
        Ok(())
    });
}

/// An explicit file path is loaded and validated.
#[test]
fn explicit_path_is_loaded_and_validated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    std::fs::write(&path, "[session]\nlog_level = \"warn\"\n").unwrap();

    let config = load_and_validate_path(&path).expect("valid file");
    assert_eq!(config.session.log_level, "warn");

    std::fs::write(&path, "[session]\nlog_levle = \"warn\"\n").unwrap();
    let errors = load_and_validate_path(&path).unwrap_err();
    match &errors[0] {
        ConfigError::UnknownKey { key, suggestion, .. } => {
            assert_eq!(key, "log_levle");
            assert_eq!(suggestion.as_deref(), Some("log_level"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}
