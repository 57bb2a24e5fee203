//! Tests for configuration loading and root folder resolution
//!
//! Covers:
//! - Missing TOML files fall back to defaults without failing startup
//! - Root folder priority: CLI > environment > TOML > compiled default
//! - Root folder creation and database path derivation
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate T2K_ROOT_FOLDER are marked with #[serial].

use serial_test::serial;
use std::env;
use std::path::PathBuf;
use t2k_common::config::{
    load_toml_config, load_toml_config_or_default, write_toml_config, BroadcastOrder,
    CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig, ROOT_FOLDER_ENV,
};
use tempfile::TempDir;

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert_eq!(defaults.log_level, "info");
    assert!(defaults.log_file.is_none());
    assert!(defaults.root_folder.to_string_lossy().contains("t2k"));
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root_folder = RootFolderResolver::new("test-module").resolve();
    assert_eq!(root_folder, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
#[serial]
fn test_resolver_env_var_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/t2k-test-env-folder");

    let root_folder = RootFolderResolver::new("test-module")
        .with_toml_root(Some(PathBuf::from("/tmp/t2k-test-toml-folder")))
        .resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/t2k-test-env-folder"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_cli_arg_beats_env_var() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/t2k-test-env-folder");

    let root_folder = RootFolderResolver::new("test-module")
        .with_cli_arg(Some(PathBuf::from("/tmp/t2k-test-cli-folder")))
        .resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/t2k-test-cli-folder"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_toml_root_used_without_env() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root_folder = RootFolderResolver::new("test-module")
        .with_toml_root(Some(PathBuf::from("/srv/t2k")))
        .resolve();
    assert_eq!(root_folder, PathBuf::from("/srv/t2k"));
}

#[test]
#[serial]
fn test_resolver_ignores_blank_env_var() {
    env::set_var(ROOT_FOLDER_ENV, "   ");

    let root_folder = RootFolderResolver::new("test-module").resolve();
    assert_eq!(root_folder, CompiledDefaults::for_current_platform().root_folder);

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
fn test_initializer_database_path() {
    let initializer = RootFolderInitializer::new(PathBuf::from("/tmp/t2k-root"));
    assert_eq!(
        initializer.database_path(),
        PathBuf::from("/tmp/t2k-root/top2000.db")
    );
}

#[test]
fn test_initializer_creates_directory_idempotently() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("nested").join("t2k");
    let initializer = RootFolderInitializer::new(root.clone());

    initializer.ensure_directory_exists().unwrap();
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert!(!initializer.database_exists());
}

#[test]
fn test_missing_explicit_config_yields_defaults() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("absent.toml");

    let config = load_toml_config_or_default(Some(&missing)).unwrap();
    assert_eq!(config.tracker.update_interval_seconds, 30);
    assert_eq!(config.http.bind, "127.0.0.1:5730");
}

#[test]
fn test_invalid_toml_is_an_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[tracker\nupcoming_count = ").unwrap();

    assert!(load_toml_config(&path).is_err());
    assert!(load_toml_config_or_default(Some(&path)).is_err());
}

#[test]
fn test_write_then_load_preserves_overrides() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("conf").join("config.toml");

    let mut config = TomlConfig::default();
    config.root_folder = Some(PathBuf::from("/srv/t2k"));
    config.tracker.upcoming_count = 20;
    config.tracker.broadcast_order = BroadcastOrder::Countdown;

    write_toml_config(&config, &path).unwrap();
    assert!(!path.with_extension("toml.tmp").exists());

    let loaded = load_toml_config(&path).unwrap();
    assert_eq!(loaded.root_folder, Some(PathBuf::from("/srv/t2k")));
    assert_eq!(loaded.tracker.upcoming_count, 20);
    assert_eq!(loaded.tracker.broadcast_order, BroadcastOrder::Countdown);
}
