//! Command-line interface for wiregen.
//!
//! # Commands
//!
//! - `gen` - resolve every injector and write one generated file per package
//! - `check` - resolve and report problems without writing anything
//! - `show` - print the construction plan of each injector
//!
//! All commands take package patterns (`.` by default, `./...` for every
//! package below the working directory) and share the run flags
//! `--max-parallel`, `--lazy` and `--tags`.
//!
//! # Global Options
//!
//! - `--verbose` - debug logging
//! - `--quiet` - errors only
//! - `--config` - use this file instead of `wiregen.toml` in the module root
//!
//! # Example
//!
//! ```bash
//! wiregen gen ./...
//! wiregen --verbose gen --max-parallel 8 --lazy ./...
//! wiregen check --tags server .
//! wiregen show --format json example.com/app/db
//! ```

mod check;
pub mod common;
mod generate;
mod show;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::WireConfig;

/// Top-level command line.
#[derive(Parser, Debug)]
#[command(
    name = "wiregen",
    about = "Compile-time dependency injection code generator",
    version,
    long_about = "wiregen reads provider and injector declarations from *.wire.toml files, \
                  resolves each injector's dependency graph and writes the construction code."
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    ///
    /// Equivalent to `RUST_LOG=wiregen=debug`. Mutually exclusive with `--quiet`.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file to use instead of `wiregen.toml` in the module root.
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate injector code and write it next to each package.
    ///
    /// See [`generate::GenCommand`].
    Gen(generate::GenCommand),

    /// Resolve every injector and report problems without writing files.
    Check(check::CheckCommand),

    /// Print construction plans.
    Show(show::ShowCommand),
}

impl Cli {
    /// Default log filter implied by `--verbose`/`--quiet`.
    ///
    /// `RUST_LOG`, when set, takes precedence; see `main`.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "wiregen=debug"
        } else if self.quiet {
            "error"
        } else {
            "wiregen=warn"
        }
    }

    /// Whether informational output should be suppressed.
    pub const fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Load configuration and run the selected command.
    pub async fn execute(self) -> Result<()> {
        let working_dir = std::env::current_dir().context("Failed to determine working directory")?;
        let config = WireConfig::load(&working_dir, self.config.as_deref())?;
        tracing::debug!(target: "wiregen::cli", "configuration: {:?}", config);

        let ctx = common::CommandContext {
            working_dir,
            config,
            quiet: self.quiet,
        };
        match self.command {
            Commands::Gen(cmd) => cmd.execute(&ctx).await,
            Commands::Check(cmd) => cmd.execute(&ctx).await,
            Commands::Show(cmd) => cmd.execute(&ctx).await,
        }
    }
}
