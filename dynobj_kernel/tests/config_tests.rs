//! Runtime configuration loaded from files

use std::fs;

use dynobj_kernel::config::ConfigError;
use dynobj_kernel::error::ErrorDetail;
use dynobj_kernel::prelude::*;
use tempfile::TempDir;

#[test]
fn test_runtime_from_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("runtime.toml");
    fs::write(&path, "[runtime]\nthrow_compat = \"name_error\"\n").unwrap();

    let config = RuntimeConfig::from_file(&path).unwrap();
    assert!(!config.debug);
    let runtime = Runtime::new(config);
    let mut ctx = runtime.main_context().unwrap();

    let err = ctx
        .perform_throw(&Value::sym("lost"), None)
        .unwrap_err()
        .into_error()
        .unwrap();
    assert_eq!(err.class(), &ErrorClass::NameError);
    assert!(matches!(err.detail(), ErrorDetail::UncaughtTag { .. }));
}

#[test]
fn test_written_config_reads_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("runtime.toml");
    let config = RuntimeConfig::default().with_debug(true);
    fs::write(&path, config.to_toml_string()).unwrap();
    assert_eq!(RuntimeConfig::from_file(&path).unwrap(), config);
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    let err = RuntimeConfig::from_file(&path).unwrap_err();
    match &err {
        ConfigError::Io { path: reported, .. } => assert_eq!(reported, &path),
        other => panic!("expected an I/O error, got {:?}", other),
    }
    assert!(err.to_string().starts_with("I/O error reading "));
}

#[test]
fn test_unknown_key_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("runtime.toml");
    fs::write(&path, "[runtime]\nverbose = true\n").unwrap();
    let err = RuntimeConfig::from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}
