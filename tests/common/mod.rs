//! Common helpers for wiregen integration tests

// Not every helper is used by every test file
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::Path;

use wiregen_cli::constants::{LAZY_ENV, MAX_WORKERS_ENV, TAGS_ENV};

/// The `wiregen` binary running in `dir` with a clean wiregen environment.
pub fn wiregen(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("wiregen").expect("wiregen binary is built");
    cmd.current_dir(dir)
        .env_remove(MAX_WORKERS_ENV)
        .env_remove(LAZY_ENV)
        .env_remove(TAGS_ENV)
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

/// Read a generated file relative to the module root.
pub fn read_generated(root: &Path, relative: &str) -> String {
    std::fs::read_to_string(root.join(relative))
        .unwrap_or_else(|e| panic!("expected {relative} to be generated: {e}"))
}
