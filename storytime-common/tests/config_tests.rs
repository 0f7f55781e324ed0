//! Configuration resolution through the public API
//!
//! Tests that set STORYTIME_CONFIG are marked #[serial] so they never race
//! each other on the process environment.

use serial_test::serial;
use std::env;
use std::path::Path;
use storytime_common::config::{PlayerConfig, CONFIG_ENV_VAR};
use storytime_common::{Error, FadeCurve};
use tempfile::TempDir;

fn write_config(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
#[serial]
fn test_env_var_selects_config_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "env.toml",
        "[transport]\nskip_seconds = 30.0\nfade_curve = \"equal_power\"\n",
    );

    env::set_var(CONFIG_ENV_VAR, &path);
    let config = PlayerConfig::load(None);
    env::remove_var(CONFIG_ENV_VAR);

    let config = config.unwrap();
    assert_eq!(config.transport.skip_seconds, 30.0);
    assert_eq!(config.transport.fade_curve, FadeCurve::EqualPower);
}

#[test]
#[serial]
fn test_cli_file_overrides_env_file() {
    let dir = TempDir::new().unwrap();
    let env_path = write_config(&dir, "env.toml", "[audio]\nsample_rate = 16000\n");
    let cli_path = write_config(&dir, "cli.toml", "[audio]\nsample_rate = 48000\n");

    env::set_var(CONFIG_ENV_VAR, &env_path);
    let config = PlayerConfig::load(Some(&cli_path));
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.unwrap().audio.sample_rate, 48_000);
}

#[test]
#[serial]
fn test_empty_env_var_is_ignored() {
    env::set_var(CONFIG_ENV_VAR, "");
    let resolved = storytime_common::config::resolve_config_path(
        Some(Path::new("/explicit.toml")),
        CONFIG_ENV_VAR,
    );
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved.as_deref(), Some(Path::new("/explicit.toml")));
}

#[test]
fn test_invalid_values_fail_load() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "bad.toml", "[transport]\nend_tolerance_seconds = -1.0\n");

    let err = PlayerConfig::load(Some(&path)).unwrap_err();
    assert!(matches!(err, Error::Config(ref msg) if msg.contains("end_tolerance_seconds")));
}

#[test]
fn test_wake_lock_section() {
    let config = PlayerConfig::from_toml_str(
        "[wake_lock]\nenabled = true\ncommand = [\"caffeinate\", \"-d\"]\n",
    )
    .unwrap();
    assert_eq!(config.wake_lock.command, vec!["caffeinate", "-d"]);
}
