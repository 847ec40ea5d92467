use clap::Parser;

use super::common::RunArgs;
use super::*;
use crate::generate::Strategy;
use crate::model::{Binding, BindingSource, ConstructionPlan, Provider};
use std::sync::Arc;

#[test]
fn test_verbose_and_quiet_filters() {
    let cli = Cli::parse_from(["wiregen", "--verbose", "check"]);
    assert_eq!(cli.log_filter(), "wiregen=debug");

    let cli = Cli::parse_from(["wiregen", "check", "-q"]);
    assert_eq!(cli.log_filter(), "error");
    assert!(cli.is_quiet());

    let cli = Cli::parse_from(["wiregen", "gen"]);
    assert_eq!(cli.log_filter(), "wiregen=warn");
}

#[test]
fn test_verbose_conflicts_with_quiet() {
    assert!(Cli::try_parse_from(["wiregen", "-v", "-q", "gen"]).is_err());
}

#[test]
fn test_gen_flags() {
    let cli = Cli::parse_from([
        "wiregen",
        "gen",
        "--max-parallel",
        "4",
        "--lazy",
        "--tags",
        "server,cli",
        "--dry-run",
        "./...",
    ]);
    let Commands::Gen(cmd) = cli.command else {
        panic!("expected gen");
    };
    assert_eq!(cmd.run.patterns, vec!["./...".to_string()]);
    assert_eq!(cmd.run.tags, vec!["server".to_string(), "cli".to_string()]);
    assert!(cmd.dry_run);

    let (options, strategy) = cmd.run.resolve(&WireConfig::default());
    assert_eq!(options.tags.len(), 2);
    assert_eq!(
        strategy,
        Strategy::ParallelLazy {
            max_workers: 4
        }
    );
}

#[test]
fn test_naive_conflicts_with_parallel() {
    assert!(Cli::try_parse_from(["wiregen", "gen", "--naive", "--max-parallel", "2"]).is_err());
    assert!(Cli::try_parse_from(["wiregen", "gen", "--max-parallel", "0"]).is_err());
}

#[test]
fn test_flags_override_config() {
    let config = WireConfig {
        max_workers: Some(6),
        lazy: true,
        ..WireConfig::default()
    };

    let defaults = RunArgs::default();
    assert_eq!(
        defaults.resolve(&config).1,
        Strategy::ParallelLazy {
            max_workers: 6
        }
    );

    let sequential = RunArgs {
        max_parallel: Some(1),
        ..RunArgs::default()
    };
    assert_eq!(sequential.resolve(&config).1, Strategy::Lazy);
}

#[test]
fn test_format_plan() {
    let a = Arc::new(Provider::function("p", "NewDB", vec!["Config".into()], "*DB"));
    let plan = ConstructionPlan {
        inputs: vec![Binding {
            type_ref: "Config".into(),
            source: BindingSource::Input {
                index: 0,
            },
        }],
        steps: vec![Binding {
            type_ref: "*DB".into(),
            source: BindingSource::Provider(a),
        }],
        outputs: vec!["*DB".into()],
    };

    assert_eq!(
        show::format_plan("p", "InitDB", &plan),
        "p.InitDB\n  arg 0: Config\n  1. *DB <- p.NewDB(Config)\n  returns *DB\n"
    );
}
