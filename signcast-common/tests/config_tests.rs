//! Unit tests for data folder resolution and graceful degradation
//!
//! The device boots unattended: a missing config file or environment
//! variable must fall through to the next source, never abort startup.
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate SIGNCAST_DATA_DIR are marked with #[serial]
//! to ensure they run sequentially, not in parallel.

use serial_test::serial;
use signcast_common::config::{default_data_folder, resolve_data_folder};
use std::env;
use std::path::PathBuf;

const ENV_VAR: &str = "SIGNCAST_DATA_DIR";

#[test]
fn test_compiled_default_for_current_platform() {
    let folder = default_data_folder();
    assert!(!folder.as_os_str().is_empty());

    #[cfg(target_os = "linux")]
    {
        let path_str = folder.to_string_lossy();
        assert!(
            path_str.contains("signcast"),
            "Linux default should be a signcast data directory"
        );
    }
}

#[test]
#[serial]
fn test_cli_arg_takes_precedence_over_env() {
    env::set_var(ENV_VAR, "/tmp/signcast-env-folder");

    let folder = resolve_data_folder(Some("/opt/kiosk"), ENV_VAR).unwrap();
    assert_eq!(folder, PathBuf::from("/opt/kiosk"));

    env::remove_var(ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_used_when_no_cli_arg() {
    let test_path = "/tmp/signcast-test-env-folder";
    env::set_var(ENV_VAR, test_path);

    let folder = resolve_data_folder(None, ENV_VAR).unwrap();
    assert_eq!(folder, PathBuf::from(test_path));

    env::remove_var(ENV_VAR);
}

#[test]
#[serial]
fn test_missing_sources_fall_back_to_compiled_default() {
    env::remove_var(ENV_VAR);

    // No CLI arg, no env var, and (on a bare test machine) no config file:
    // resolution must still produce a usable path.
    let folder = resolve_data_folder(None, ENV_VAR).unwrap();
    assert!(!folder.as_os_str().is_empty());
}
