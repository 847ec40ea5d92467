//! Package descriptors shared by every generation unit of a run.
//!
//! An [`ObjectCache`] is either **eager**, built from one up-front load of all
//! packages a run needs, or **lazy**, holding the loader and invoking it for a
//! single package the first time that package is asked for.
//!
//! # Lazy state machine
//!
//! - absent: nobody asked yet
//! - `Pending(notify)`: one task is running the loader for this path
//! - `Ready(descriptor)` / `Failed(error)`: settled for the rest of the run
//!
//! Concurrent misses for one path are single-flight: the first task installs
//! `Pending` and loads, the others wait on its [`Notify`]. Different paths load
//! independently. Failures are memoized, so a broken package is loaded at most
//! once per run however many injectors touch it.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::constants::PENDING_STATE_TIMEOUT;
use crate::core::WireError;
use crate::loader::{LoadMode, LoadOutcome, LoadRequest, PackageLoader};
use crate::model::PackageDescriptor;

#[derive(Debug, Clone)]
enum PackageState {
    Pending(Arc<Notify>),
    Ready(Arc<PackageDescriptor>),
    Failed(WireError),
}

/// Loader binding captured by a lazy cache.
struct LazySource {
    loader: Arc<dyn PackageLoader>,
    working_dir: PathBuf,
    env: Vec<(String, String)>,
    cancel: CancellationToken,
}

/// Clears a `Pending` slot if the loading task is dropped before settling it.
struct PendingGuard<'a> {
    slots: &'a DashMap<String, PackageState>,
    path: &'a str,
    notify: Arc<Notify>,
    settled: bool,
}

impl PendingGuard<'_> {
    fn settle(mut self, state: PackageState) {
        self.slots.insert(self.path.to_string(), state);
        self.notify.notify_waiters();
        self.settled = true;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.slots.remove_if(self.path, |_, state| {
                matches!(state, PackageState::Pending(n) if Arc::ptr_eq(n, &self.notify))
            });
            self.notify.notify_waiters();
        }
    }
}

/// Thread-safe map from package path to descriptor.
pub struct ObjectCache {
    slots: DashMap<String, PackageState>,
    lazy: Option<LazySource>,
    loads: AtomicUsize,
}

impl std::fmt::Debug for ObjectCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectCache")
            .field("lazy", &self.lazy.is_some())
            .field("packages", &self.slots.len())
            .field("loads", &self.loads.load(Ordering::Relaxed))
            .finish()
    }
}

impl ObjectCache {
    /// Build an eager cache from a completed load.
    ///
    /// Packages that failed to load are recorded and reported as
    /// [`WireError::LoadFailure`] on lookup.
    pub fn eager(outcome: LoadOutcome) -> Self {
        let cache = Self {
            slots: DashMap::new(),
            lazy: None,
            loads: AtomicUsize::new(0),
        };
        cache.seed(outcome);
        cache
    }

    /// Build a lazy cache that loads each package on first access.
    pub fn lazy(
        loader: Arc<dyn PackageLoader>,
        working_dir: impl Into<PathBuf>,
        env: Vec<(String, String)>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            slots: DashMap::new(),
            lazy: Some(LazySource {
                loader,
                working_dir: working_dir.into(),
                env,
                cancel,
            }),
            loads: AtomicUsize::new(0),
        }
    }

    /// Insert already-loaded packages and failures.
    ///
    /// Existing settled entries are kept; seeding never replaces a package a
    /// unit may already hold.
    pub fn seed(&self, outcome: LoadOutcome) {
        for pkg in outcome.packages {
            self.slots.entry(pkg.path.clone()).or_insert_with(|| PackageState::Ready(pkg));
        }
        for err in outcome.errors {
            let failure = PackageState::Failed(WireError::LoadFailure {
                pkg_path: err.pkg_path.clone(),
                reason: err.message,
            });
            self.slots.entry(err.pkg_path).or_insert(failure);
        }
    }

    /// Look up a package, loading it first in lazy mode.
    pub async fn get_package(&self, path: &str) -> Result<Arc<PackageDescriptor>, WireError> {
        let notify = Arc::new(Notify::new());

        loop {
            let existing = match self.slots.entry(path.to_string()) {
                Entry::Occupied(slot) => match slot.get() {
                    PackageState::Ready(pkg) => return Ok(Arc::clone(pkg)),
                    PackageState::Failed(err) => return Err(err.clone()),
                    PackageState::Pending(existing) => Arc::clone(existing),
                },
                Entry::Vacant(slot) => {
                    if self.lazy.is_none() {
                        return Err(WireError::PackageNotFound {
                            pkg_path: path.to_string(),
                        });
                    }
                    slot.insert(PackageState::Pending(Arc::clone(&notify)));
                    break;
                }
            };

            let notified = existing.notified();
            tokio::pin!(notified);
            while self.is_pending_on(path, &existing) {
                tokio::select! {
                    () = &mut notified => break,
                    () = tokio::time::sleep(PENDING_STATE_TIMEOUT) => {
                        tracing::warn!(target: "wiregen::cache", "still waiting for package {}", path);
                    }
                }
            }
        }

        let guard = PendingGuard {
            slots: &self.slots,
            path,
            notify,
            settled: false,
        };
        self.load_one(path, guard).await
    }

    async fn load_one(
        &self,
        path: &str,
        guard: PendingGuard<'_>,
    ) -> Result<Arc<PackageDescriptor>, WireError> {
        let Some(source) = &self.lazy else {
            return Err(WireError::PackageNotFound {
                pkg_path: path.to_string(),
            });
        };

        if source.cancel.is_cancelled() {
            return Err(WireError::Cancelled);
        }

        tracing::debug!(target: "wiregen::cache", "loading package {} on first touch", path);
        self.loads.fetch_add(1, Ordering::Relaxed);

        let request = LoadRequest::new(&source.working_dir, vec![path.to_string()])
            .with_env(source.env.clone())
            .with_mode(LoadMode::Roots);
        let outcome = source.loader.load(&request, &source.cancel).await;

        if let Some(pkg) = outcome.packages.into_iter().find(|p| p.path == path) {
            guard.settle(PackageState::Ready(Arc::clone(&pkg)));
            return Ok(pkg);
        }

        // A load cut short by cancellation is not a property of the package.
        if source.cancel.is_cancelled() {
            return Err(WireError::Cancelled);
        }

        let reason = outcome
            .errors
            .iter()
            .find(|e| e.pkg_path == path)
            .or_else(|| outcome.errors.first())
            .map_or_else(|| "loader returned no package".to_string(), |e| e.message.clone());
        let err = WireError::LoadFailure {
            pkg_path: path.to_string(),
            reason,
        };
        guard.settle(PackageState::Failed(err.clone()));
        Err(err)
    }

    fn is_pending_on(&self, path: &str, notify: &Arc<Notify>) -> bool {
        matches!(
            self.slots.get(path).as_deref(),
            Some(PackageState::Pending(current)) if Arc::ptr_eq(current, notify)
        )
    }

    /// Paths of every package loaded successfully so far, sorted.
    pub fn loaded_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .slots
            .iter()
            .filter(|e| matches!(e.value(), PackageState::Ready(_)))
            .map(|e| e.key().clone())
            .collect();
        paths.sort();
        paths
    }

    /// Number of loader invocations made by this cache.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::LoadError;
    use crate::test_utils::MemoryLoader;

    fn pkg(path: &str) -> Arc<PackageDescriptor> {
        Arc::new(PackageDescriptor::new(path))
    }

    #[tokio::test]
    async fn test_eager_lookup() {
        let cache = ObjectCache::eager(LoadOutcome {
            packages: vec![pkg("example.com/a")],
            errors: vec![LoadError::new("example.com/broken", "parse error")],
        });

        assert!(cache.get_package("example.com/a").await.is_ok());
        assert!(matches!(
            cache.get_package("example.com/missing").await,
            Err(WireError::PackageNotFound { .. })
        ));
        assert!(matches!(
            cache.get_package("example.com/broken").await,
            Err(WireError::LoadFailure { .. })
        ));
        assert_eq!(cache.load_count(), 0);
        assert_eq!(cache.loaded_paths(), vec!["example.com/a".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_lazy_single_flight() {
        let loader = Arc::new(
            MemoryLoader::new()
                .with_package(PackageDescriptor::new("example.com/a"))
                .with_delay(std::time::Duration::from_millis(30)),
        );
        let cache = Arc::new(ObjectCache::lazy(
            loader.clone(),
            "/work",
            Vec::new(),
            CancellationToken::new(),
        ));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get_package("example.com/a").await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        assert_eq!(cache.load_count(), 1);
        assert_eq!(loader.load_count("example.com/a"), 1);
    }

    #[tokio::test]
    async fn test_lazy_failure_is_memoized() {
        let loader = Arc::new(MemoryLoader::new().with_failure("example.com/bad", "no such package"));
        let cache = ObjectCache::lazy(loader.clone(), "/work", Vec::new(), CancellationToken::new());

        for _ in 0..3 {
            let err = cache.get_package("example.com/bad").await.unwrap_err();
            assert!(err.to_string().contains("no such package"));
        }
        assert_eq!(loader.load_count("example.com/bad"), 1);
        assert!(cache.loaded_paths().is_empty());
    }

    #[tokio::test]
    async fn test_seed_avoids_loading() {
        let loader = Arc::new(MemoryLoader::new().with_package(PackageDescriptor::new("example.com/a")));
        let cache = ObjectCache::lazy(loader.clone(), "/work", Vec::new(), CancellationToken::new());
        cache.seed(LoadOutcome {
            packages: vec![pkg("example.com/a")],
            errors: Vec::new(),
        });

        assert!(cache.get_package("example.com/a").await.is_ok());
        assert_eq!(cache.load_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_lazy_load() {
        let loader = Arc::new(MemoryLoader::new().with_package(PackageDescriptor::new("example.com/a")));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let cache = ObjectCache::lazy(loader, "/work", Vec::new(), cancel);

        assert_eq!(cache.get_package("example.com/a").await.unwrap_err(), WireError::Cancelled);
        assert!(cache.loaded_paths().is_empty());
    }
}
