//! These tests are for testing some invalid config-file-specific options.

use assert_cmd::prelude::*;
use predicates::prelude::*;

use crate::util::mim_command;

#[test]
fn test_missing_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope.toml");

    mim_command(&["-C", path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unable to read the config file"));
}

#[test]
fn test_toml_mismatch_type() {
    mim_command(&["-C", "./tests/invalid_configs/toml_mismatch_type.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid type"));
}

#[test]
fn test_bad_toml() {
    mim_command(&["-C", "./tests/invalid_configs/bad_toml.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unable to read or parse the config file"));
}

#[test]
fn test_small_rate() {
    mim_command(&["-C", "./tests/invalid_configs/small_rate.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("'update_rate' must be at least 250ms"));
}

#[test]
fn test_invalid_rate() {
    mim_command(&["-C", "./tests/invalid_configs/invalid_rate.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "'update_rate' was set with an invalid value",
        ));
}

#[test]
fn test_zero_lookup_timeout() {
    mim_command(&["-C", "./tests/invalid_configs/zero_lookup_timeout.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "'lookup_timeout' was set with an invalid value",
        ));
}

#[test]
fn test_empty_glyphs() {
    mim_command(&["-C", "./tests/invalid_configs/empty_glyphs.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least one glyph"));
}
