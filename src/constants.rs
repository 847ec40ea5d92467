//! Global constants used throughout the wiregen codebase.
//!
//! File names, environment variable names, timeouts and parallelism defaults
//! that are shared across modules live here so they are discoverable in one
//! place.

use std::time::Duration;

/// File marking a module root; holds `module = "<path>"`.
pub const MODULE_FILE: &str = "wire.mod";

/// Plain declaration file name.
pub const DECLARATION_FILE: &str = "wire.toml";

/// Suffix of additional declaration files (`db.wire.toml`).
pub const DECLARATION_SUFFIX: &str = ".wire.toml";

/// Project configuration file looked up in the module root.
pub const CONFIG_FILE: &str = "wiregen.toml";

/// Default name of the generated file written into each package directory.
pub const DEFAULT_OUTPUT_FILE: &str = "wire_gen.rs";

/// Banner emitted at the top of generated files.
pub const GENERATED_BANNER: &str = "// Code generated by wiregen. DO NOT EDIT.";

/// Comma-separated build tags selecting tagged declaration files.
pub const TAGS_ENV: &str = "WIREGEN_TAGS";

/// Overrides the configured worker count.
pub const MAX_WORKERS_ENV: &str = "WIREGEN_MAX_WORKERS";

/// Enables lazy package loading when set to `1` or `true`.
pub const LAZY_ENV: &str = "WIREGEN_LAZY";

/// Interval after which a task waiting on an in-flight cache population logs
/// that it is still waiting (10 seconds).
///
/// Waiting continues afterwards; a second population for the same key is never
/// started.
pub const PENDING_STATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum number of close matches suggested for a missing provider.
pub const MAX_TYPE_SUGGESTIONS: usize = 3;

/// Maximum Levenshtein distance for a provided type to count as a close match.
pub const TYPE_SUGGESTION_DISTANCE: usize = 2;

/// Default worker count for parallel generation: the available CPU parallelism.
///
/// Resolution and rendering are CPU-bound, so there is no benefit in running
/// more units than cores.
pub fn default_max_workers() -> usize {
    std::thread::available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(1)
}
