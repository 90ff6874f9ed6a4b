// tests/config_tests.rs

use std::io::Write;

use banded_report::{ConfigError, EngineConfig, MAX_EVAL_DEPTH};
use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

fn config_file(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_defaults() {
    let config = EngineConfig::default();
    assert!(!config.lenient_fields);
    assert!(config.case_sensitive_order);
    assert!(config.drop_trailing_empty_page);
    assert_eq!(config.max_eval_depth, 64);
    assert_eq!(config.lines_per_page, 40);
}

#[test]
fn test_load_from_file() {
    let file = config_file(
        "lenient_fields = true\n\
         lines_per_page = 12\n\
         case_sensitive_order = false\n",
    );
    let config = EngineConfig::load(file.path()).unwrap();
    assert_eq!(
        config,
        EngineConfig {
            lenient_fields: true,
            lines_per_page: 12,
            case_sensitive_order: false,
            ..EngineConfig::default()
        }
    );
}

#[test]
fn test_empty_file_is_the_default() {
    let file = config_file("");
    assert_eq!(EngineConfig::load(file.path()).unwrap(), EngineConfig::default());
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unknown_key_is_rejected() {
    let file = config_file("page_height = 10\n");
    assert!(matches!(EngineConfig::load(file.path()), Err(ConfigError::Parse(_))));
}

#[test]
fn test_wrong_type_is_rejected() {
    assert!(matches!(
        EngineConfig::from_toml_str("lines_per_page = \"many\""),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn test_zero_limits_are_invalid() {
    assert!(matches!(
        EngineConfig::from_toml_str("lines_per_page = 0"),
        Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
        EngineConfig::from_toml_str("max_eval_depth = 0"),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_eval_depth_is_capped() {
    let at_cap =
        EngineConfig::from_toml_str(&format!("max_eval_depth = {}", MAX_EVAL_DEPTH)).unwrap();
    assert_eq!(at_cap.max_eval_depth, MAX_EVAL_DEPTH);

    let err = EngineConfig::from_toml_str("max_eval_depth = 1000000").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(err.to_string().contains("at most"));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let err = EngineConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("absent.toml"));
}
