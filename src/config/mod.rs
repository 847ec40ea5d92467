//! Project configuration.
//!
//! Settings come from three layers, later layers winning:
//!
//! 1. built-in defaults (see [`constants`](crate::constants))
//! 2. `wiregen.toml` in the module root, or the file given with `--config`
//! 3. environment overrides: `WIREGEN_MAX_WORKERS`, `WIREGEN_LAZY`
//!
//! Command-line flags are applied on top by the CLI.
//!
//! # File format
//!
//! ```toml
//! # Upper bound on concurrently generated injectors; defaults to the CPU count
//! max_workers = 8
//!
//! # Load non-root packages only when an injector needs them
//! lazy = true
//!
//! [generate]
//! output_file = "wire_gen.rs"
//! tags = ["server"]
//! duplicate_policy = "first-match"
//! ```
//!
//! A missing file is not an error; unknown keys are.

pub mod parser;

pub use parser::parse_config;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{CONFIG_FILE, LAZY_ENV, MAX_WORKERS_ENV, MODULE_FILE, default_max_workers};
use crate::core::WireError;
use crate::generate::{GenerateOptions, Strategy};

/// Settings for a generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WireConfig {
    /// Options passed to every unit
    pub generate: GenerateOptions,

    /// Worker bound for parallel runs; `None` uses the CPU count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,

    /// Load non-root packages on first touch
    pub lazy: bool,
}

impl WireConfig {
    /// Load the configuration for a run started in `working_dir`.
    ///
    /// `explicit` must exist when given. Otherwise `wiregen.toml` is looked up
    /// in the module root and defaults are used when it is absent. Environment
    /// overrides are applied in both cases.
    pub fn load(working_dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => parse_config(path)?,
            None => match find_config(working_dir) {
                Some(path) => {
                    tracing::debug!(target: "wiregen::config", "using {}", path.display());
                    parse_config(&path)?
                }
                None => Self::default(),
            },
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides read through `lookup`.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup(MAX_WORKERS_ENV) {
            let workers: usize = value.trim().parse().map_err(|_| WireError::Config {
                message: format!("{MAX_WORKERS_ENV} must be a positive integer, got '{value}'"),
            })?;
            if workers == 0 {
                return Err(WireError::Config {
                    message: format!("{MAX_WORKERS_ENV} must be at least 1"),
                }
                .into());
            }
            self.max_workers = Some(workers);
        }

        if let Some(value) = lookup(LAZY_ENV) {
            self.lazy = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                _ => {
                    return Err(WireError::Config {
                        message: format!("{LAZY_ENV} must be true or false, got '{value}'"),
                    })
                    .context("Invalid environment override");
                }
            };
        }

        Ok(self)
    }

    /// Effective worker count.
    pub fn workers(&self) -> usize {
        self.max_workers.unwrap_or_else(default_max_workers).max(1)
    }

    /// Strategy implied by the worker count and loading mode.
    pub fn strategy(&self) -> Strategy {
        Strategy::from_settings(self.workers(), self.lazy)
    }
}

/// Nearest ancestor of `start` holding a `wire.mod`.
pub fn find_module_root(start: &Path) -> Option<PathBuf> {
    start.ancestors().find(|dir| dir.join(MODULE_FILE).is_file()).map(Path::to_path_buf)
}

fn find_config(working_dir: &Path) -> Option<PathBuf> {
    let root = find_module_root(working_dir)?;
    let path = root.join(CONFIG_FILE);
    path.is_file().then_some(path)
}
