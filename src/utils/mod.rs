//! File system helpers used when writing generated files.
//!
//! - [`fs`] - atomic single and batched writes
//!
//! ```rust,no_run
//! use wiregen_cli::utils::atomic_write;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! atomic_write(Path::new("app/wire_gen.rs"), b"// generated\n")?;
//! # Ok(())
//! # }
//! ```

pub mod fs;

pub use fs::{WriteStatus, atomic_write, atomic_write_multiple, ensure_dir};
