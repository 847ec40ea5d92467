//! Loader for TOML declaration files.
//!
//! # Layout
//!
//! ```text
//! app/
//! ├── wire.mod              # module = "example.com/app"
//! ├── wire.toml             # package example.com/app
//! └── db/
//!     ├── wire.toml         # package example.com/app/db
//!     └── mock.wire.toml    # tags = ["mock"], only with WIREGEN_TAGS=mock
//! ```
//!
//! A package is a directory holding `wire.toml` and/or `*.wire.toml` files.
//! Its path is the module path joined with the directory's path relative to the
//! module root.
//!
//! # Patterns
//!
//! - `.` - the package in the working directory
//! - `./...` - every package at or below the working directory
//! - `./sub`, `../sibling` - a package directory relative to the working directory
//! - `example.com/app/db` - a package path inside the module
//!
//! # File schema
//!
//! ```toml
//! tags = ["mock"]                      # optional build tags
//!
//! [types.Config]
//! kind = "struct"
//! fields = [{ name = "Port", type = "int" }]
//!
//! [[provider]]
//! name = "NewServer"
//! inputs = ["Config"]
//! output = "*Server"
//! returns_error = true
//!
//! [[set]]
//! name = "ServerSet"
//! providers = ["NewServer"]
//! sets = ["example.com/app/db.DBSet"]
//!
//! [[injector]]
//! name = "InitServer"
//! inputs = ["Config"]
//! outputs = ["*Server"]
//! sets = ["ServerSet"]
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use super::{LoadError, LoadMode, LoadOutcome, LoadRequest, PackageLoader};
use crate::cache::FingerprintBuilder;
use crate::constants::{DECLARATION_FILE, DECLARATION_SUFFIX, MODULE_FILE, TAGS_ENV};
use crate::model::{InjectorDecl, PackageDescriptor, ProviderDecl, SetDecl, SetId, TypeInfo};

#[derive(Debug, Deserialize)]
struct ModuleFile {
    module: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeclarationFile {
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    types: BTreeMap<String, TypeInfo>,
    #[serde(default, rename = "provider")]
    providers: Vec<ProviderDecl>,
    #[serde(default, rename = "set")]
    sets: Vec<SetDecl>,
    #[serde(default, rename = "injector")]
    injectors: Vec<InjectorDecl>,
}

/// A module: a root directory and the package path it maps to.
#[derive(Debug, Clone)]
struct Module {
    root: PathBuf,
    path: String,
}

impl Module {
    /// Find the module enclosing `start` by walking up to the nearest `wire.mod`.
    async fn discover(start: &Path) -> Result<Self, String> {
        let start = tokio::fs::canonicalize(start)
            .await
            .map_err(|e| format!("cannot access working directory {}: {e}", start.display()))?;

        for dir in start.ancestors() {
            let candidate = dir.join(MODULE_FILE);
            if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                let content = tokio::fs::read_to_string(&candidate)
                    .await
                    .map_err(|e| format!("cannot read {}: {e}", candidate.display()))?;
                let file: ModuleFile = toml::from_str(&content)
                    .map_err(|e| format!("invalid {}: {e}", candidate.display()))?;
                let path = file.module.trim_end_matches('/').to_string();
                if path.is_empty() {
                    return Err(format!("{} declares an empty module path", candidate.display()));
                }
                tracing::debug!(target: "wiregen::loader", "module {} rooted at {}", path, dir.display());
                return Ok(Self {
                    root: dir.to_path_buf(),
                    path,
                });
            }
        }

        Err(format!("no {MODULE_FILE} found in {} or any parent directory", start.display()))
    }

    fn package_path(&self, dir: &Path) -> Option<String> {
        let relative = dir.strip_prefix(&self.root).ok()?;
        let mut path = self.path.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    path.push('/');
                    path.push_str(&part.to_string_lossy());
                }
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(path)
    }

    fn package_dir(&self, pkg_path: &str) -> Option<PathBuf> {
        if pkg_path == self.path {
            return Some(self.root.clone());
        }
        let rest = pkg_path.strip_prefix(&self.path)?.strip_prefix('/')?;
        Some(rest.split('/').fold(self.root.clone(), |dir, part| dir.join(part)))
    }
}

fn is_declaration_file(name: &str) -> bool {
    name == DECLARATION_FILE || name.ends_with(DECLARATION_SUFFIX)
}

fn has_declaration_files(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .any(|e| e.path().is_file() && is_declaration_file(&e.file_name().to_string_lossy()))
        })
        .unwrap_or(false)
}

/// Loads packages from `*.wire.toml` declaration files.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestLoader;

impl ManifestLoader {
    /// Create a loader.
    pub const fn new() -> Self {
        Self
    }

    async fn expand_pattern(
        module: &Module,
        working_dir: &Path,
        pattern: &str,
    ) -> Result<Vec<(String, PathBuf)>, LoadError> {
        let (base, recursive) = match pattern.strip_suffix("/...") {
            Some(base) => (base, true),
            None if pattern == "..." => (".", true),
            None => (pattern, false),
        };

        let dir = if base == "." || base.starts_with("./") || base.starts_with("../") {
            working_dir.join(base)
        } else {
            module.package_dir(base).ok_or_else(|| {
                LoadError::new(pattern, format!("package is not inside module {}", module.path))
            })?
        };

        let dir = tokio::fs::canonicalize(&dir)
            .await
            .map_err(|e| LoadError::new(pattern, format!("cannot access {}: {e}", dir.display())))?;

        let dirs = if recursive {
            WalkDir::new(&dir)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_dir() && has_declaration_files(entry.path()))
                .map(|entry| entry.into_path())
                .collect()
        } else {
            vec![dir]
        };

        dirs.into_iter()
            .map(|dir| {
                module
                    .package_path(&dir)
                    .map(|pkg| (pkg, dir.clone()))
                    .ok_or_else(|| {
                        LoadError::new(pattern, format!("{} is outside module {}", dir.display(), module.path))
                    })
            })
            .collect()
    }

    async fn load_package(
        pkg_path: &str,
        dir: &Path,
        tags: &HashSet<String>,
    ) -> Result<PackageDescriptor, LoadError> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| LoadError::new(pkg_path, format!("cannot read {}: {e}", dir.display())))?;

        let mut candidates = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LoadError::new(pkg_path, format!("cannot read {}: {e}", dir.display())))?
        {
            if is_declaration_file(&entry.file_name().to_string_lossy()) {
                candidates.push(entry.path());
            }
        }
        candidates.sort();

        let mut pkg = PackageDescriptor::new(pkg_path);
        pkg.dir = dir.to_path_buf();

        let mut fingerprint = FingerprintBuilder::new();
        for file in candidates {
            let metadata = tokio::fs::metadata(&file).await.ok();
            let content = tokio::fs::read_to_string(&file)
                .await
                .map_err(|e| LoadError::new(pkg_path, format!("cannot read {}: {e}", file.display())))?;
            let decls: DeclarationFile = toml::from_str(&content)
                .map_err(|e| LoadError::new(pkg_path, format!("{}: {e}", file.display())))?;

            if !decls.tags.iter().all(|tag| tags.contains(tag)) {
                tracing::trace!(target: "wiregen::loader", "skipping {} (tags {:?})", file.display(), decls.tags);
                continue;
            }

            for (name, info) in decls.types {
                if pkg.types.insert(name.clone(), info).is_some() {
                    pkg.errors.push(format!("type {name} redeclared in {}", file.display()));
                }
            }
            pkg.providers.extend(decls.providers);
            pkg.sets.extend(decls.sets);
            pkg.injectors.extend(decls.injectors);
            fingerprint.add(&file, metadata.as_ref(), content.as_bytes());
            pkg.files.push(file);
        }

        if pkg.files.is_empty() {
            return Err(LoadError::new(pkg_path, format!("no declaration files in {}", dir.display())));
        }

        pkg.fingerprint = Some(fingerprint.finish());
        type_check(&mut pkg);
        Ok(pkg)
    }
}

/// Record redeclared names and compute the import list.
fn type_check(pkg: &mut PackageDescriptor) {
    let mut seen = HashSet::new();
    let names = pkg
        .providers
        .iter()
        .map(|p| &p.name)
        .chain(pkg.sets.iter().map(|s| &s.name))
        .chain(pkg.injectors.iter().map(|i| &i.name));
    let mut errors = Vec::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            errors.push(format!("{name} redeclared in this package"));
        }
    }
    pkg.errors.extend(errors);

    let imports: BTreeSet<String> = pkg
        .sets
        .iter()
        .flat_map(|s| s.sets.iter())
        .chain(pkg.injectors.iter().flat_map(|i| i.sets.iter()))
        .map(|reference| SetId::parse(reference, &pkg.path).pkg_path)
        .filter(|path| path != &pkg.path)
        .collect();
    pkg.imports = imports.into_iter().collect();
}

#[async_trait]
impl PackageLoader for ManifestLoader {
    async fn load(&self, request: &LoadRequest, cancel: &CancellationToken) -> LoadOutcome {
        let mut outcome = LoadOutcome::default();

        let module = match Module::discover(&request.working_dir).await {
            Ok(module) => module,
            Err(message) => {
                outcome.errors.extend(request.patterns.iter().map(|p| LoadError::new(p, message.clone())));
                return outcome;
            }
        };

        let working_dir = match tokio::fs::canonicalize(&request.working_dir).await {
            Ok(dir) => dir,
            Err(e) => {
                outcome.errors.push(LoadError::new(".", e.to_string()));
                return outcome;
            }
        };

        let tags: HashSet<String> = request
            .env_var(TAGS_ENV)
            .map(|v| v.split(',').map(str::trim).filter(|t| !t.is_empty()).map(String::from).collect())
            .unwrap_or_default();

        let mut queue = VecDeque::new();
        let mut seen = HashSet::new();
        for pattern in &request.patterns {
            match Self::expand_pattern(&module, &working_dir, pattern).await {
                Ok(packages) => {
                    for (pkg_path, dir) in packages {
                        if seen.insert(pkg_path.clone()) {
                            queue.push_back((pkg_path, dir));
                        }
                    }
                }
                Err(err) => outcome.errors.push(err),
            }
        }

        while let Some((pkg_path, dir)) = queue.pop_front() {
            if cancel.is_cancelled() {
                outcome.errors.push(LoadError::new(&pkg_path, "load cancelled"));
                outcome.errors.extend(queue.drain(..).map(|(p, _)| LoadError::new(p, "load cancelled")));
                break;
            }

            match Self::load_package(&pkg_path, &dir, &tags).await {
                Ok(pkg) => {
                    if request.mode == LoadMode::WithDeps {
                        for import in &pkg.imports {
                            if !seen.insert(import.clone()) {
                                continue;
                            }
                            match module.package_dir(import) {
                                Some(dir) => queue.push_back((import.clone(), dir)),
                                None => outcome.errors.push(LoadError::new(
                                    import,
                                    format!("imported package is not inside module {}", module.path),
                                )),
                            }
                        }
                    }
                    outcome.packages.push(Arc::new(pkg));
                }
                Err(err) => outcome.errors.push(err),
            }
        }

        tracing::debug!(
            target: "wiregen::loader",
            "loaded {} packages ({} errors) for {:?}",
            outcome.packages.len(),
            outcome.errors.len(),
            request.patterns
        );
        outcome
    }
}
