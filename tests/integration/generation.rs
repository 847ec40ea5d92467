use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

use wiregen_cli::core::WireError;
use wiregen_cli::generate::{GenerateOptions, GenerateReport, Generator, Strategy, generate_lazy};
use wiregen_cli::loader::{LoadOutcome, LoadRequest, ManifestLoader, PackageLoader};
use wiregen_cli::render::TemplateRenderer;
use wiregen_cli::test_utils::fixtures::DB_DECLS;
use wiregen_cli::test_utils::{ModuleFixture, init_test_logging};

fn generator() -> Generator {
    Generator::new(Arc::new(ManifestLoader::new()), Arc::new(TemplateRenderer::new().unwrap()))
}

async fn run(generator: &Generator, module: &ModuleFixture, strategy: Strategy) -> GenerateReport {
    generator
        .generate(
            &CancellationToken::new(),
            module.path(),
            &[],
            &["./...".to_string()],
            &GenerateOptions::default(),
            strategy,
        )
        .await
}

#[tokio::test]
async fn test_strategies_agree_on_disk() {
    init_test_logging(None);
    let module = ModuleFixture::app().unwrap();

    let baseline = run(&generator(), &module, Strategy::Sequential).await;
    assert!(baseline.is_success(), "{:?}", baseline.errors);
    assert_eq!(baseline.outputs.len(), 1);

    for strategy in [
        Strategy::Parallel {
            max_workers: 4,
        },
        Strategy::Lazy,
        Strategy::ParallelLazy {
            max_workers: 4,
        },
    ] {
        let report = run(&generator(), &module, strategy).await;
        assert_eq!(report.outputs, baseline.outputs, "{strategy:?}");
        assert_eq!(report.loaded_packages, baseline.loaded_packages, "{strategy:?}");
    }
}

#[tokio::test]
async fn test_lazy_root_only_run_skips_unneeded_imports() {
    let module = ModuleFixture::app().unwrap();
    let options = GenerateOptions {
        tags: vec!["metrics".to_string()],
        ..GenerateOptions::default()
    };

    let report = generate_lazy(
        &generator(),
        &CancellationToken::new(),
        module.path(),
        &[],
        &[".".to_string()],
        &options,
    )
    .await;

    assert!(report.is_success(), "{:?}", report.errors);
    assert_eq!(
        report.loaded_packages,
        vec!["example.com/app".to_string(), "example.com/app/metrics".to_string()]
    );
}

#[tokio::test]
async fn test_set_cache_invalidated_by_file_change() {
    let module = ModuleFixture::app().unwrap();
    let generator = generator();
    let parallel = Strategy::Parallel {
        max_workers: 2,
    };

    run(&generator, &module, parallel).await;
    let after_first = generator.set_cache().stats();

    run(&generator, &module, parallel).await;
    let after_second = generator.set_cache().stats();
    assert!(after_second.hits > after_first.hits);
    assert_eq!(after_second.misses, after_first.misses);

    module
        .write(
            "db/wire.toml",
            &format!("{DB_DECLS}\n[[provider]]\nname = \"NewPool\"\noutput = \"*Pool\"\n"),
        )
        .unwrap();
    let report = run(&generator, &module, parallel).await;
    assert!(report.is_success());
    assert!(generator.set_cache().stats().misses > after_second.misses);
}

/// Rewrites the db declarations right after its first load returns.
struct EditAfterFirstLoad {
    inner: ManifestLoader,
    db_file: PathBuf,
    edited: AtomicBool,
}

#[async_trait]
impl PackageLoader for EditAfterFirstLoad {
    async fn load(&self, request: &LoadRequest, cancel: &CancellationToken) -> LoadOutcome {
        let outcome = self.inner.load(request, cancel).await;
        if !self.edited.swap(true, Ordering::SeqCst) {
            let content = std::fs::read_to_string(&self.db_file).unwrap();
            std::fs::write(&self.db_file, content.replace("Config::default()", "Config::edited()")).unwrap();
        }
        outcome
    }
}

#[tokio::test]
async fn test_edit_between_load_and_extraction_is_picked_up_next_run() {
    let module = ModuleFixture::app().unwrap();
    let loader = Arc::new(EditAfterFirstLoad {
        inner: ManifestLoader::new(),
        db_file: module.path().join("db/wire.toml"),
        edited: AtomicBool::new(false),
    });
    let editing = Generator::new(loader, Arc::new(TemplateRenderer::new().unwrap()));
    let parallel = Strategy::Parallel {
        max_workers: 2,
    };

    let first = run(&editing, &module, parallel).await;
    assert!(first.is_success(), "{:?}", first.errors);
    assert!(first.outputs[0].content.contains("Config::default()"));

    let second = run(&editing, &module, parallel).await;
    let fresh = run(&generator(), &module, parallel).await;
    assert!(second.outputs[0].content.contains("Config::edited()"));
    assert_eq!(second.outputs, fresh.outputs);
}

#[tokio::test]
async fn test_cycle_is_reported_per_injector() {
    let module = ModuleFixture::app().unwrap();
    module
        .write(
            "loop/wire.toml",
            r#"
[[provider]]
name = "NewA"
inputs = ["B"]
output = "A"

[[provider]]
name = "NewB"
inputs = ["A"]
output = "B"

[[set]]
name = "LoopSet"
providers = ["NewA", "NewB"]

[[injector]]
name = "InitA"
outputs = ["A"]
sets = ["LoopSet"]
"#,
        )
        .unwrap();

    let report = run(&generator(), &module, Strategy::Sequential).await;
    assert_eq!(report.outputs.len(), 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].pkg_path, "example.com/app/loop");
    assert_eq!(report.errors[0].error.to_string(), "cycle for A: A -> B -> A");
}

#[tokio::test]
async fn test_set_reference_cycle_across_packages() {
    let module = ModuleFixture::new("example.com/cyc").unwrap();
    module
        .write(
            "a/wire.toml",
            r#"
[[set]]
name = "A"
sets = ["example.com/cyc/b.B"]

[[injector]]
name = "InitX"
outputs = ["X"]
sets = ["A"]
"#,
        )
        .unwrap();
    module.write("b/wire.toml", "[[set]]\nname = \"B\"\nsets = [\"example.com/cyc/a.A\"]\n").unwrap();

    let report = run(&generator(), &module, Strategy::Lazy).await;
    assert!(report.outputs.is_empty());
    assert!(!report.errors.is_empty());
    assert!(report.errors.iter().all(|e| e.injector.as_deref() == Some("InitX")));
    assert!(matches!(report.errors[0].error, WireError::SetReferenceCycle { .. }));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let module = ModuleFixture::app().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = generator()
        .generate(&cancel, module.path(), &[], &["./...".to_string()], &GenerateOptions::default(), Strategy::Lazy)
        .await;
    assert!(report.cancelled);
    assert!(report.outputs.is_empty());
    assert!(report.loaded_packages.is_empty());
}
