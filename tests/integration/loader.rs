use tokio_util::sync::CancellationToken;

use wiregen_cli::constants::TAGS_ENV;
use wiregen_cli::loader::{LoadMode, LoadRequest, ManifestLoader, PackageLoader};
use wiregen_cli::test_utils::ModuleFixture;

fn paths(outcome: &wiregen_cli::loader::LoadOutcome) -> Vec<&str> {
    outcome.packages.iter().map(|p| p.path.as_str()).collect()
}

#[tokio::test]
async fn test_recursive_pattern_finds_every_package() {
    let module = ModuleFixture::app().unwrap();
    let request = LoadRequest::new(module.path(), vec!["./...".to_string()]);

    let outcome = ManifestLoader::new().load(&request, &CancellationToken::new()).await;
    assert!(outcome.is_complete(), "{:?}", outcome.errors);
    assert_eq!(paths(&outcome), vec!["example.com/app", "example.com/app/db", "example.com/app/metrics"]);
}

#[tokio::test]
async fn test_package_path_pattern_from_subdirectory() {
    let module = ModuleFixture::app().unwrap();
    let request = LoadRequest::new(module.path().join("db"), vec!["example.com/app/metrics".to_string()]);

    let outcome = ManifestLoader::new().load(&request, &CancellationToken::new()).await;
    assert_eq!(paths(&outcome), vec!["example.com/app/metrics"]);
}

#[tokio::test]
async fn test_with_deps_follows_set_references() {
    let module = ModuleFixture::app().unwrap();
    let request = LoadRequest::new(module.path(), vec![".".to_string()]).with_mode(LoadMode::WithDeps);

    let outcome = ManifestLoader::new().load(&request, &CancellationToken::new()).await;
    assert_eq!(outcome.packages.len(), 3);
    assert_eq!(outcome.packages[0].imports, vec!["example.com/app/db", "example.com/app/metrics"]);
}

#[tokio::test]
async fn test_tagged_files_need_matching_env() {
    let module = ModuleFixture::app().unwrap();
    module
        .write(
            "db/mock.wire.toml",
            "tags = [\"mock\"]\n[[provider]]\nname = \"NewMockDB\"\noutput = \"*MockDB\"\n",
        )
        .unwrap();
    let loader = ManifestLoader::new();
    let cancel = CancellationToken::new();

    let plain = LoadRequest::new(module.path(), vec!["./db".to_string()]);
    let outcome = loader.load(&plain, &cancel).await;
    assert!(outcome.packages[0].provider("NewMockDB").is_none());
    assert_eq!(outcome.packages[0].files.len(), 1);

    let tagged = plain.clone().with_env(vec![(TAGS_ENV.to_string(), "mock".to_string())]);
    let outcome = loader.load(&tagged, &cancel).await;
    assert!(outcome.packages[0].provider("NewMockDB").is_some());
    assert_eq!(outcome.packages[0].files.len(), 2);
}

#[tokio::test]
async fn test_missing_package_is_partial_failure() {
    let module = ModuleFixture::app().unwrap();
    let request =
        LoadRequest::new(module.path(), vec![".".to_string(), "example.com/app/nowhere".to_string()]);

    let outcome = ManifestLoader::new().load(&request, &CancellationToken::new()).await;
    assert_eq!(paths(&outcome), vec!["example.com/app"]);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].pkg_path, "example.com/app/nowhere");
}
