//! The `gen` command.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::common::{self, CommandContext, RunArgs};
use crate::generate::Strategy;
use crate::utils::{WriteStatus, atomic_write_multiple};

/// Generate injector code.
///
/// Writes the configured output file (`wire_gen.rs` by default) into each
/// package directory whose injectors all resolved. Packages with failing
/// injectors are left untouched and the command exits with an error.
#[derive(Args, Debug, Clone)]
pub struct GenCommand {
    #[command(flatten)]
    pub run: RunArgs,

    /// Re-extract provider sets for every injector instead of caching them
    ///
    /// Forces sequential processing; meant for comparing against the
    /// optimized path.
    #[arg(long, conflicts_with_all = ["max_parallel", "lazy"])]
    pub naive: bool,

    /// Print the files that would be written instead of writing them
    #[arg(long)]
    pub dry_run: bool,

    /// File whose content is placed at the top of every generated file
    #[arg(long, value_name = "FILE")]
    pub header_file: Option<PathBuf>,
}

impl GenCommand {
    /// Run the command.
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let (mut options, mut strategy) = self.run.resolve(&ctx.config);
        if self.naive {
            options.optimized = false;
            strategy = Strategy::Sequential;
        }
        if let Some(path) = &self.header_file {
            let header = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read header file: {}", path.display()))?;
            options.header = Some(header);
        }

        let report = common::run_generation(&ctx.working_dir, &self.run.patterns, &options, strategy).await?;

        if self.dry_run {
            for output in &report.outputs {
                println!("{} {}", "would write".cyan(), output.output_path.display());
                if !ctx.quiet {
                    println!("{}", output.content);
                }
            }
        } else {
            let files: Vec<(PathBuf, Vec<u8>)> = report
                .outputs
                .iter()
                .map(|o| (o.output_path.clone(), o.content.clone().into_bytes()))
                .collect();
            let statuses = atomic_write_multiple(&files).await?;

            if !ctx.quiet {
                for ((path, _), status) in files.iter().zip(statuses) {
                    match status {
                        WriteStatus::Written => println!("{} {}", "wrote".green(), path.display()),
                        WriteStatus::Unchanged => println!("{} {}", "unchanged".dimmed(), path.display()),
                    }
                }
            }
        }

        common::print_errors(&report);
        common::report_result(&report)
    }
}
