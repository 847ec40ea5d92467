//! Generic configuration parsing.
//!
//! Reads a TOML file into any [`DeserializeOwned`](serde::de::DeserializeOwned)
//! type, attaching the file path to both read and parse failures:
//!
//! ```text
//! Failed to parse config file: /path/to/wiregen.toml
//! Caused by:
//!     unknown field `max_worker`, expected one of `generate`, `max_workers`, `lazy`
//! ```

use anyhow::{Context, Result};
use std::path::Path;

/// Parse a TOML configuration file into `T`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not deserialize into
/// `T`; the underlying I/O or TOML error is kept as the cause.
///
/// ```rust,no_run
/// use wiregen_cli::config::{WireConfig, parse_config};
/// use std::path::Path;
///
/// # fn example() -> anyhow::Result<()> {
/// let config: WireConfig = parse_config(Path::new("wiregen.toml"))?;
/// # Ok(())
/// # }
/// ```
pub fn parse_config<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: T = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}
