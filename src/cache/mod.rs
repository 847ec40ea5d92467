//! In-process caches shared across generation units.
//!
//! # Architecture Overview
//!
//! - [`ObjectCache`]: package path → [`PackageDescriptor`](crate::model::PackageDescriptor),
//!   eager or lazy (load on first access, single-flight per path)
//! - [`ProviderSetCache`]: (package path, set name) → extracted
//!   [`ProviderSet`](crate::model::ProviderSet), validated by a fingerprint of
//!   the package's declaration files
//!
//! Both are constructed explicitly for a run and handed to the scheduler as
//! `Arc`s; nothing is global. Both use the same coordination pattern:
//!
//! - **DashMap access**: keys are sharded, so units working on different
//!   packages or sets do not contend
//! - **Notification-based coordination**: the first task to miss installs
//!   `Pending(notify)`, does the work and stores the result before calling
//!   `notify_waiters()`; other tasks wait on the notification instead of polling
//! - **Atomic state transitions**: `Pending(notify)` → `Ready`, or back to
//!   absent when the work fails and is not memoized
//!
//! A waiter that has been blocked for [`PENDING_STATE_TIMEOUT`](crate::constants::PENDING_STATE_TIMEOUT)
//! logs a warning and keeps waiting; it never starts a second population for
//! the same key.

pub mod fingerprint;
pub mod object_cache;
pub mod provider_set_cache;

pub use fingerprint::{FileSetFingerprint, FingerprintBuilder, MetadataFingerprint, content_fingerprint};
pub use object_cache::ObjectCache;
pub use provider_set_cache::{CacheStats, ProviderSetCache};
