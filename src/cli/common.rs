//! Pieces shared by the subcommands: run flags, configuration merging and
//! report printing.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::WireConfig;
use crate::core::WireError;
use crate::generate::{GenerateOptions, GenerateReport, Generator, Strategy};
use crate::loader::ManifestLoader;
use crate::render::TemplateRenderer;

/// State every command starts from.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Directory patterns are relative to
    pub working_dir: PathBuf,
    /// Merged file and environment configuration
    pub config: WireConfig,
    /// Suppress informational output
    pub quiet: bool,
}

/// Flags selecting what to generate and how.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Package patterns: `.`, `./...`, `./sub` or a package path
    #[arg(value_name = "PATTERNS", default_value = ".")]
    pub patterns: Vec<String>,

    /// Maximum number of injectors processed concurrently
    ///
    /// Overrides `max_workers` from the configuration. `1` processes
    /// injectors one at a time.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub max_parallel: Option<u16>,

    /// Load imported packages only when an injector needs them
    #[arg(long)]
    pub lazy: bool,

    /// Only process injectors carrying one of these tags (comma separated)
    #[arg(long, value_delimiter = ',', value_name = "TAGS")]
    pub tags: Vec<String>,
}

impl RunArgs {
    /// Options and strategy after applying these flags over `config`.
    pub fn resolve(&self, config: &WireConfig) -> (GenerateOptions, Strategy) {
        let mut options = config.generate.clone();
        if !self.tags.is_empty() {
            options.tags.clone_from(&self.tags);
        }

        let workers = self.max_parallel.map_or_else(|| config.workers(), usize::from);
        let strategy = Strategy::from_settings(workers, self.lazy || config.lazy);
        (options, strategy)
    }
}

/// Run generation with the bundled loader and renderer.
///
/// Ctrl-C cancels the run; units that already finished are kept in the
/// report.
pub async fn run_generation(
    working_dir: &Path,
    patterns: &[String],
    options: &GenerateOptions,
    strategy: Strategy,
) -> Result<GenerateReport> {
    let renderer = TemplateRenderer::new().context("Failed to initialize templates")?;
    let generator = Generator::new(Arc::new(ManifestLoader::new()), Arc::new(renderer));
    let env: Vec<(String, String)> = std::env::vars().collect();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!(target: "wiregen::cli", "interrupted, finishing running injectors");
            on_interrupt.cancel();
        }
    });

    let report = generator.generate(&cancel, working_dir, &env, patterns, options, strategy).await;
    watcher.abort();
    Ok(report)
}

/// Print every error of `report` to stderr.
///
/// Injectors cut off by cancellation are listed as skipped; the run-level
/// cancellation itself is reported by [`report_result`].
pub fn print_errors(report: &GenerateReport) {
    for error in &report.errors {
        match (&error.injector, &error.error) {
            (None, WireError::Cancelled) => {}
            (Some(injector), WireError::Cancelled) => {
                eprintln!("{} {}.{} (cancelled)", "-".yellow(), error.pkg_path, injector);
            }
            _ => eprintln!("{} {}", "✗".red(), error),
        }
    }
}

/// Turn an unsuccessful report into the command's error.
pub fn report_result(report: &GenerateReport) -> Result<()> {
    if report.cancelled {
        return Err(WireError::Cancelled.into());
    }
    if !report.errors.is_empty() {
        anyhow::bail!(
            "{} error{} while processing injectors",
            report.errors.len(),
            if report.errors.len() == 1 { "" } else { "s" }
        );
    }
    Ok(())
}
