//! Integration test suite for wiregen
//!
//! End-to-end tests running the TOML loader, the generator and the binary
//! against temporary modules.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **cli**: `gen`, `check` and `show` through the binary
//! - **generation**: generator runs over on-disk modules
//! - **loader**: pattern expansion and tagged files

#[path = "../common/mod.rs"]
mod common;

mod cli;
mod generation;
mod loader;
