//! In-memory package loader.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::loader::{LoadError, LoadMode, LoadOutcome, LoadRequest, PackageLoader};
use crate::model::PackageDescriptor;

/// Serves prebuilt descriptors and records how often each path is loaded.
///
/// Patterns are exact package paths. Unknown paths and paths registered with
/// [`with_failure`](Self::with_failure) come back as [`LoadError`]s.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    packages: HashMap<String, Arc<PackageDescriptor>>,
    failures: HashMap<String, String>,
    delay: Option<Duration>,
    counts: DashMap<String, usize>,
    calls: AtomicUsize,
}

impl MemoryLoader {
    /// Create an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package.
    #[must_use]
    pub fn with_package(mut self, pkg: PackageDescriptor) -> Self {
        self.packages.insert(pkg.path.clone(), Arc::new(pkg));
        self
    }

    /// Register several packages.
    #[must_use]
    pub fn with_packages(self, packages: impl IntoIterator<Item = PackageDescriptor>) -> Self {
        packages.into_iter().fold(self, Self::with_package)
    }

    /// Make every load of `path` fail with `message`.
    #[must_use]
    pub fn with_failure(mut self, path: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.insert(path.into(), message.into());
        self
    }

    /// Sleep this long at the start of every `load` call.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `path` was loaded, successfully or not.
    pub fn load_count(&self, path: &str) -> usize {
        self.counts.get(path).map_or(0, |c| *c)
    }

    /// Number of `load` calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PackageLoader for MemoryLoader {
    async fn load(&self, request: &LoadRequest, cancel: &CancellationToken) -> LoadOutcome {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut outcome = LoadOutcome::default();
        let mut queue: VecDeque<String> = request.patterns.iter().cloned().collect();
        let mut seen = HashSet::new();

        while let Some(path) = queue.pop_front() {
            if !seen.insert(path.clone()) {
                continue;
            }
            if cancel.is_cancelled() {
                outcome.errors.push(LoadError::new(path, "load cancelled"));
                continue;
            }
            *self.counts.entry(path.clone()).or_default() += 1;

            if let Some(message) = self.failures.get(&path) {
                outcome.errors.push(LoadError::new(path, message.clone()));
                continue;
            }
            match self.packages.get(&path) {
                Some(pkg) => {
                    if request.mode == LoadMode::WithDeps {
                        queue.extend(pkg.imports.iter().cloned());
                    }
                    outcome.packages.push(Arc::clone(pkg));
                }
                None => outcome.errors.push(LoadError::new(path, "package not found")),
            }
        }
        outcome
    }
}
