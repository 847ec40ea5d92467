//! The `show` command.

use anyhow::Result;
use clap::{Args, ValueEnum};
use serde::Serialize;
use std::fmt::Write as _;

use super::common::{self, CommandContext, RunArgs};
use crate::model::{BindingSource, ConstructionPlan};

/// Output format of `show`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One block per injector
    #[default]
    Text,
    /// A JSON array of plans
    Json,
}

/// Print the construction plan of each injector.
#[derive(Args, Debug, Clone)]
pub struct ShowCommand {
    #[command(flatten)]
    pub run: RunArgs,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct PlanView<'a> {
    package: &'a str,
    injector: &'a str,
    plan: &'a ConstructionPlan,
}

impl ShowCommand {
    /// Run the command.
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let (options, strategy) = self.run.resolve(&ctx.config);
        let report = common::run_generation(&ctx.working_dir, &self.run.patterns, &options, strategy).await?;

        let views: Vec<PlanView<'_>> = report
            .outputs
            .iter()
            .flat_map(|output| {
                output.injectors.iter().map(|injector| PlanView {
                    package: &output.pkg_path,
                    injector: &injector.name,
                    plan: &injector.plan,
                })
            })
            .collect();

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&views)?),
            OutputFormat::Text => {
                for view in &views {
                    print!("{}", format_plan(view.package, view.injector, view.plan));
                }
            }
        }

        common::print_errors(&report);
        common::report_result(&report)
    }
}

/// Human-readable rendering of one plan.
pub(crate) fn format_plan(package: &str, injector: &str, plan: &ConstructionPlan) -> String {
    let mut out = format!("{package}.{injector}\n");
    for binding in &plan.inputs {
        if let BindingSource::Input {
            index,
        } = binding.source
        {
            let _ = writeln!(out, "  arg {index}: {}", binding.type_ref);
        }
    }
    for (i, binding) in plan.steps.iter().enumerate() {
        if let Some(provider) = binding.provider() {
            let inputs: Vec<&str> = provider.inputs.iter().map(|t| t.as_str()).collect();
            let _ = writeln!(
                out,
                "  {}. {} <- {}({})",
                i + 1,
                binding.type_ref,
                provider.qualified_name(),
                inputs.join(", ")
            );
        }
    }
    let outputs: Vec<&str> = plan.outputs.iter().map(|t| t.as_str()).collect();
    let _ = writeln!(out, "  returns {}", outputs.join(", "));
    out
}
