use predicates::prelude::*;

use crate::common::{read_generated, wiregen};
use wiregen_cli::constants::GENERATED_BANNER;
use wiregen_cli::test_utils::ModuleFixture;

#[test]
fn test_gen_writes_file_per_package_with_injectors() {
    let module = ModuleFixture::app().unwrap();

    wiregen(module.path())
        .args(["gen", "./..."])
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote"));

    let generated = read_generated(module.path(), "wire_gen.rs");
    assert!(generated.starts_with(GENERATED_BANNER));
    assert!(generated.contains("pub fn init_server("));
    assert!(generated.contains("pub fn init_metrics("));
    // packages without injectors get no file
    assert!(!module.path().join("db/wire_gen.rs").exists());

    wiregen(module.path())
        .args(["gen", "./..."])
        .assert()
        .success()
        .stdout(predicate::str::contains("unchanged"));
}

#[test]
fn test_gen_dry_run_writes_nothing() {
    let module = ModuleFixture::app().unwrap();

    wiregen(module.path())
        .args(["gen", "--dry-run", "."])
        .assert()
        .success()
        .stdout(predicate::str::contains("would write").and(predicate::str::contains("pub fn init_server(")));

    assert!(!module.path().join("wire_gen.rs").exists());
}

#[test]
fn test_gen_header_file_and_tags() {
    let module = ModuleFixture::app().unwrap();
    let header = module.write("HEADER.txt", "// Copyright Example Corp.\n").unwrap();

    wiregen(module.path())
        .args(["--quiet", "gen", "--tags", "server", "--header-file"])
        .arg(&header)
        .arg(".")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let generated = read_generated(module.path(), "wire_gen.rs");
    assert!(generated.starts_with("// Copyright Example Corp."));
    assert!(generated.contains("pub fn init_server("));
    assert!(!generated.contains("init_metrics"));
}

#[test]
fn test_check_reports_missing_provider() {
    let module = ModuleFixture::app().unwrap();
    module
        .write(
            "cache/wire.toml",
            r#"
[[injector]]
name = "InitCache"
outputs = ["*Cache"]
sets = ["example.com/app/db.DBSet"]
"#,
        )
        .unwrap();

    wiregen(module.path())
        .args(["check", "./..."])
        .assert()
        .failure()
        .stdout(predicate::str::contains("example.com/app.InitServer"))
        .stderr(predicate::str::contains("no provider found for *Cache"))
        .stderr(predicate::str::contains("1 error while processing injectors"));
}

#[test]
fn test_show_json() {
    let module = ModuleFixture::app().unwrap();

    let output = wiregen(module.path())
        .args(["show", "--format", "json", "--tags", "server", "."])
        .output()
        .unwrap();
    assert!(output.status.success());

    let views: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let views = views.as_array().unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0]["package"], "example.com/app");
    assert_eq!(views[0]["injector"], "InitServer");
    assert_eq!(views[0]["plan"]["steps"].as_array().unwrap().len(), 3);
}

#[test]
fn test_show_text() {
    let module = ModuleFixture::app().unwrap();

    wiregen(module.path())
        .args(["show", "--tags", "server", "--max-parallel", "2", "--lazy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("example.com/app.InitServer"))
        .stdout(predicate::str::contains("1. Config <- example.com/app/db.DefaultConfig()"))
        .stdout(predicate::str::contains("returns *Server"));
}

#[test]
fn test_outside_module_fails() {
    let dir = tempfile::tempdir().unwrap();

    wiregen(dir.path())
        .args(["gen", "."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("wire.mod"));
}

#[test]
fn test_invalid_config_file() {
    let module = ModuleFixture::app().unwrap();
    module.write("wiregen.toml", "max_worker = 2\n").unwrap();

    wiregen(module.path())
        .args(["check", "."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("wiregen.toml"));
}

#[test]
fn test_invalid_env_override() {
    let module = ModuleFixture::app().unwrap();

    wiregen(module.path())
        .env("WIREGEN_MAX_WORKERS", "lots")
        .args(["check", "."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("WIREGEN_MAX_WORKERS"));
}
