//! Package loading.
//!
//! The [`PackageLoader`] trait is the seam between the generator and whatever
//! produces typed package descriptors. A loader may be slow (it can parse many
//! files or shell out to a toolchain), which is why its results are cached in
//! the [`ObjectCache`](crate::cache::ObjectCache) and, in lazy mode, only
//! requested on first touch of a package.
//!
//! Loading is allowed to partially succeed: the outcome carries every package
//! that loaded plus one [`LoadError`] per package that did not.
//!
//! [`ManifestLoader`] is the bundled implementation, reading `*.wire.toml`
//! declaration files from a module rooted at a `wire.mod` file.

pub mod manifest;

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::model::PackageDescriptor;

pub use manifest::ManifestLoader;

/// How far a load follows package imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Only the packages matched by the patterns
    #[default]
    Roots,
    /// Matched packages plus every package they import, transitively
    WithDeps,
}

/// Parameters of one loader invocation.
#[derive(Debug, Clone, Default)]
pub struct LoadRequest {
    /// Directory patterns are relative to
    pub working_dir: PathBuf,
    /// Environment visible to the loader, `None` entries are not inherited
    pub env: Vec<(String, String)>,
    /// Import-following behaviour
    pub mode: LoadMode,
    /// Package patterns
    pub patterns: Vec<String>,
}

impl LoadRequest {
    /// Create a request for `patterns` relative to `working_dir`.
    pub fn new(working_dir: impl Into<PathBuf>, patterns: Vec<String>) -> Self {
        Self {
            working_dir: working_dir.into(),
            patterns,
            ..Self::default()
        }
    }

    /// Set the environment.
    #[must_use]
    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    /// Set the load mode.
    #[must_use]
    pub fn with_mode(mut self, mode: LoadMode) -> Self {
        self.mode = mode;
        self
    }

    /// Look up an environment variable.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// A package (or pattern) the loader could not produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    /// Package path, or the pattern when no package could be determined
    pub pkg_path: String,
    /// Diagnostic
    pub message: String,
}

impl LoadError {
    /// Create a load error.
    pub fn new(pkg_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            pkg_path: pkg_path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pkg_path, self.message)
    }
}

impl std::error::Error for LoadError {}

/// Result of one loader invocation.
#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    /// Packages that loaded, roots first in pattern order
    pub packages: Vec<Arc<PackageDescriptor>>,
    /// Packages that did not
    pub errors: Vec<LoadError>,
}

impl LoadOutcome {
    /// Whether every package loaded.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Produces typed package descriptors.
///
/// Implementations must be safe to call concurrently and should stop early
/// once `cancel` fires, reporting the unfinished packages as errors.
#[async_trait]
pub trait PackageLoader: Send + Sync {
    /// Load the packages matching `request.patterns`.
    async fn load(&self, request: &LoadRequest, cancel: &CancellationToken) -> LoadOutcome;
}
