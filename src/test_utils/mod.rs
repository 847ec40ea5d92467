//! Test utilities for wiregen
//!
//! Helpers shared by unit tests and the integration suite:
//!
//! - [`MemoryLoader`] - an in-memory [`PackageLoader`](crate::loader::PackageLoader)
//!   with per-package load counters, artificial latency and injected failures
//! - [`fixtures`] - ready-made package graphs and on-disk modules
//! - [`init_test_logging`] - opt-in tracing output for tests
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wiregen_cli::test_utils::{MemoryLoader, fixtures};
//!
//! let loader = Arc::new(MemoryLoader::new().with_packages(fixtures::app_packages()));
//! assert_eq!(loader.load_count("example.com/app"), 0);
//! ```

pub mod fixtures;
pub mod memory_loader;

pub use fixtures::ModuleFixture;
pub use memory_loader::MemoryLoader;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. With `level` set that level is used;
/// otherwise `RUST_LOG` is honoured, and without either nothing is logged.
///
/// ```bash
/// RUST_LOG=wiregen=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}
