//! Memoization of extracted provider sets.
//!
//! Entries are keyed by `(package path, set name)` and validated against a
//! fingerprint of the package's declaration files. A lookup whose fingerprint
//! no longer matches is a plain miss: the caller re-extracts and the entry is
//! overwritten.
//!
//! # Concurrency
//!
//! The map is a [`DashMap`], so lookups for different keys only contend when
//! they hash to the same shard. Each entry is replaced wholesale as an `Arc`,
//! which makes calls for the same key linearizable. [`ProviderSetCache::get_or_extract`]
//! is single-flight: while one caller extracts, others asking for the same key
//! wait on a [`Notify`] and then read the stored result.
//!
//! There is no eviction; a cache lives for one generation run (or as long as
//! its owner keeps it) and can be emptied with [`ProviderSetCache::clear`].

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;
use tokio::sync::futures::Notified;

use super::fingerprint::{FileSetFingerprint, MetadataFingerprint, content_fingerprint};
use crate::constants::PENDING_STATE_TIMEOUT;
use crate::core::WireError;
use crate::model::ProviderSet;

type SetKey = (String, String);

/// A stored set and the file state it was extracted from.
#[derive(Debug)]
struct CacheEntry {
    set: Arc<ProviderSet>,
    files: Vec<PathBuf>,
    fingerprint: FileSetFingerprint,
}

#[derive(Debug)]
enum EntryState {
    /// A caller is extracting this set
    Pending(Arc<Notify>),
    Ready(Arc<CacheEntry>),
}

/// Outcome of a validated lookup.
#[derive(Debug)]
pub(crate) enum CacheLookup {
    Hit(Arc<ProviderSet>),
    /// An entry exists but its files changed since it was stored
    Stale,
    Absent,
}

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
}

/// Concurrent cache of extracted provider sets.
#[derive(Debug, Default)]
pub struct ProviderSetCache {
    entries: DashMap<SetKey, EntryState>,
    hits: AtomicU64,
    misses: AtomicU64,
}

fn key(pkg_path: &str, set_name: &str) -> SetKey {
    (pkg_path.to_string(), set_name.to_string())
}

impl ProviderSetCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `set` for `(pkg_path, set_name)`, fingerprinting `files` now.
    ///
    /// Any existing entry is replaced. Callers waiting on an in-flight
    /// extraction for the same key are woken and see this entry.
    pub fn cache_set(
        &self,
        pkg_path: &str,
        set_name: &str,
        set: impl Into<Arc<ProviderSet>>,
        files: &[PathBuf],
    ) -> Arc<ProviderSet> {
        let entry = Arc::new(CacheEntry {
            set: set.into(),
            files: files.to_vec(),
            fingerprint: FileSetFingerprint::compute(files),
        });
        let set = Arc::clone(&entry.set);
        if let Some(EntryState::Pending(notify)) =
            self.entries.insert(key(pkg_path, set_name), EntryState::Ready(entry))
        {
            notify.notify_waiters();
        }
        tracing::trace!(target: "wiregen::cache", "cached set {}.{}", pkg_path, set_name);
        set
    }

    pub(crate) fn lookup(
        &self,
        pkg_path: &str,
        set_name: &str,
        files: &[PathBuf],
        fast: bool,
    ) -> CacheLookup {
        let entry = match self.entries.get(&key(pkg_path, set_name)).as_deref() {
            Some(EntryState::Ready(entry)) => Arc::clone(entry),
            Some(EntryState::Pending(_)) | None => return CacheLookup::Absent,
        };

        let valid = if fast {
            entry.fingerprint.metadata == MetadataFingerprint::compute(files)
        } else {
            entry.fingerprint.content == content_fingerprint(files)
        };

        if valid {
            CacheLookup::Hit(Arc::clone(&entry.set))
        } else {
            tracing::debug!(
                target: "wiregen::cache",
                "stale set {}.{} ({} files at store time)",
                pkg_path,
                set_name,
                entry.files.len()
            );
            CacheLookup::Stale
        }
    }

    fn record(&self, lookup: CacheLookup) -> Option<Arc<ProviderSet>> {
        match lookup {
            CacheLookup::Hit(set) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(set)
            }
            CacheLookup::Stale | CacheLookup::Absent => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Look up a set, validating by content hash of `files`.
    pub fn get_cached_set(
        &self,
        pkg_path: &str,
        set_name: &str,
        files: &[PathBuf],
    ) -> Option<Arc<ProviderSet>> {
        self.record(self.lookup(pkg_path, set_name, files, false))
    }

    /// Look up a set, validating only file sizes and modification times.
    ///
    /// Faster than [`get_cached_set`](Self::get_cached_set) but returns a stale
    /// set if a file was rewritten with the same size within the filesystem's
    /// timestamp resolution.
    pub fn get_cached_set_fast(
        &self,
        pkg_path: &str,
        set_name: &str,
        files: &[PathBuf],
    ) -> Option<Arc<ProviderSet>> {
        self.record(self.lookup(pkg_path, set_name, files, true))
    }

    /// Return the cached set or run `extract` exactly once per key to fill it.
    ///
    /// `fingerprint` must describe the content `extract` reads from, normally
    /// the one the loader took while parsing the package. An entry is reused
    /// only when its content fingerprint equals it, and a new entry is stored
    /// under it, so a file edited after loading never pairs old declarations
    /// with new content.
    ///
    /// Extraction errors are returned to the extracting caller and not stored;
    /// waiters retry and will extract again themselves.
    pub async fn get_or_extract<F>(
        &self,
        pkg_path: &str,
        set_name: &str,
        files: &[PathBuf],
        fingerprint: FileSetFingerprint,
        extract: F,
    ) -> Result<Arc<ProviderSet>, WireError>
    where
        F: FnOnce() -> Result<ProviderSet, WireError>,
    {
        let cache_key = key(pkg_path, set_name);
        let current = fingerprint;
        let notify = Arc::new(Notify::new());

        loop {
            let existing = match self.entries.entry(cache_key.clone()) {
                Entry::Occupied(mut slot) => {
                    let pending = match slot.get() {
                        EntryState::Ready(entry) if entry.fingerprint.content == current.content => {
                            self.hits.fetch_add(1, Ordering::Relaxed);
                            return Ok(Arc::clone(&entry.set));
                        }
                        EntryState::Ready(_) => None,
                        EntryState::Pending(existing) => Some(Arc::clone(existing)),
                    };
                    match pending {
                        Some(existing) => existing,
                        None => {
                            slot.insert(EntryState::Pending(Arc::clone(&notify)));
                            break;
                        }
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(EntryState::Pending(Arc::clone(&notify)));
                    break;
                }
            };

            // Registered before the re-check so a settle in between still wakes us.
            let notified = existing.notified();
            if self.is_pending_on(&cache_key, &existing) {
                wait_for(notified, pkg_path, set_name).await;
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(target: "wiregen::cache", "extracting set {}.{}", pkg_path, set_name);

        match extract() {
            Ok(set) => {
                let entry = Arc::new(CacheEntry {
                    set: Arc::new(set),
                    files: files.to_vec(),
                    fingerprint: current,
                });
                let set = Arc::clone(&entry.set);
                self.entries.insert(cache_key, EntryState::Ready(entry));
                notify.notify_waiters();
                Ok(set)
            }
            Err(err) => {
                self.entries.remove_if(&cache_key, |_, state| {
                    matches!(state, EntryState::Pending(n) if Arc::ptr_eq(n, &notify))
                });
                notify.notify_waiters();
                Err(err)
            }
        }
    }

    fn is_pending_on(&self, cache_key: &SetKey, notify: &Arc<Notify>) -> bool {
        matches!(
            self.entries.get(cache_key).as_deref(),
            Some(EntryState::Pending(current)) if Arc::ptr_eq(current, notify)
        )
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.retain(|_, state| matches!(state, EntryState::Pending(_)));
    }

    /// Number of stored sets.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| matches!(e.value(), EntryState::Ready(_))).count()
    }

    /// Whether no set is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hit and miss counts so far.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Wait until `notified` fires, logging each time the wait exceeds
/// [`PENDING_STATE_TIMEOUT`]. Never gives up: the extractor always settles
/// the entry.
async fn wait_for(notified: Notified<'_>, pkg_path: &str, set_name: &str) {
    tokio::pin!(notified);
    loop {
        tokio::select! {
            () = &mut notified => return,
            () = tokio::time::sleep(PENDING_STATE_TIMEOUT) => {
                tracing::warn!(
                    target: "wiregen::cache",
                    "still waiting for extraction of {}.{}",
                    pkg_path,
                    set_name
                );
            }
        }
    }
}
