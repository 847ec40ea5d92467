//! The `check` command.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::{self, CommandContext, RunArgs};

/// Resolve every injector and report problems without writing files.
#[derive(Args, Debug, Clone)]
pub struct CheckCommand {
    #[command(flatten)]
    pub run: RunArgs,
}

impl CheckCommand {
    /// Run the command.
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let (options, strategy) = self.run.resolve(&ctx.config);
        let report = common::run_generation(&ctx.working_dir, &self.run.patterns, &options, strategy).await?;

        if !ctx.quiet {
            for output in &report.outputs {
                for injector in &output.injectors {
                    println!(
                        "{} {}.{} ({} steps)",
                        "✓".green(),
                        output.pkg_path,
                        injector.name,
                        injector.plan.steps.len()
                    );
                }
            }
        }

        common::print_errors(&report);
        common::report_result(&report)
    }
}
