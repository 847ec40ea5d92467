//! Generation scheduling.
//!
//! A run loads the packages matching the patterns, discovers their injectors
//! and executes one **unit** per injector: collect the referenced provider
//! sets, resolve, render. Units of the same package are then assembled into
//! one file.
//!
//! # Strategies
//!
//! | Strategy | Packages | Sets | Units |
//! |----------|----------|------|-------|
//! | [`Strategy::Sequential`] | eager | cached if `options.optimized` | one at a time |
//! | [`Strategy::Parallel`] | eager | cached | up to `max_workers` at once |
//! | [`Strategy::Lazy`] | lazy | cached | one at a time |
//! | [`Strategy::ParallelLazy`] | lazy | cached | up to `max_workers` at once |
//!
//! Eager runs load the root packages and everything they import before any
//! unit starts. Lazy runs load only the roots up front; other packages are
//! loaded the first time a unit touches them, so packages no selected injector
//! needs are never loaded.
//!
//! All strategies produce the same report for the same inputs: outputs are
//! sorted by package path and errors by (package path, injector).
//!
//! # Failure semantics
//!
//! - A malformed set or an unresolvable injector fails that injector only.
//! - A root package that fails to load is a run-level error for that package.
//! - A root package with type-check errors reports each of its selected
//!   injectors as failed with those errors.
//! - A package with any failed injector produces no output file.
//!
//! # Cancellation
//!
//! When the [`CancellationToken`] fires, no further units are started, the
//! units already finished are kept, and the report carries
//! [`WireError::Cancelled`] with `cancelled` set. Every injector that did not
//! finish is listed with its own [`WireError::Cancelled`] error, and its
//! package gets no file.

pub mod options;
mod unit;


use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::cache::{ObjectCache, ProviderSetCache};
use crate::core::WireError;
use crate::loader::{LoadMode, LoadOutcome, LoadRequest, PackageLoader};
use crate::model::{InjectorDecl, PackageDescriptor};
use crate::render::{RenderedInjector, Renderer};
use crate::resolver::Resolver;

pub use options::GenerateOptions;
pub use unit::InjectorOutput;

use unit::UnitContext;

/// How a run schedules its units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Eager loading, units one at a time
    Sequential,
    /// Eager loading, bounded concurrent units
    Parallel {
        /// Upper bound on concurrently running units
        max_workers: usize,
    },
    /// Lazy loading, units one at a time
    Lazy,
    /// Lazy loading, bounded concurrent units
    ParallelLazy {
        /// Upper bound on concurrently running units
        max_workers: usize,
    },
}

impl Strategy {
    /// Pick a strategy from worker count and loading mode.
    pub fn from_settings(max_workers: usize, lazy: bool) -> Self {
        match (max_workers > 1, lazy) {
            (false, false) => Self::Sequential,
            (false, true) => Self::Lazy,
            (true, false) => Self::Parallel {
                max_workers,
            },
            (true, true) => Self::ParallelLazy {
                max_workers,
            },
        }
    }

    fn is_lazy(self) -> bool {
        matches!(self, Self::Lazy | Self::ParallelLazy { .. })
    }

    fn workers(self) -> usize {
        match self {
            Self::Sequential | Self::Lazy => 1,
            Self::Parallel {
                max_workers,
            }
            | Self::ParallelLazy {
                max_workers,
            } => max_workers.max(1),
        }
    }
}

/// Generated file content for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOutput {
    /// Package path
    pub pkg_path: String,
    /// Where the file belongs
    pub output_path: PathBuf,
    /// File content
    pub content: String,
    /// Injectors in declaration order
    pub injectors: Vec<InjectorOutput>,
}

/// A failure attributed to a package and, when known, an injector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateError {
    /// Package path
    pub pkg_path: String,
    /// Injector name, `None` for package-level and run-level failures
    pub injector: Option<String>,
    /// Cause
    pub error: WireError,
}

impl GenerateError {
    fn package(pkg_path: impl Into<String>, error: WireError) -> Self {
        Self {
            pkg_path: pkg_path.into(),
            injector: None,
            error,
        }
    }

    fn injector(pkg_path: impl Into<String>, injector: impl Into<String>, error: WireError) -> Self {
        Self {
            pkg_path: pkg_path.into(),
            injector: Some(injector.into()),
            error,
        }
    }
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.injector, self.pkg_path.is_empty()) {
            (Some(injector), _) => write!(f, "{}.{}: {}", self.pkg_path, injector, self.error),
            (None, false) => write!(f, "{}: {}", self.pkg_path, self.error),
            (None, true) => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for GenerateError {}

/// Everything a run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateReport {
    /// Files for packages whose injectors all succeeded, sorted by package path
    pub outputs: Vec<PackageOutput>,
    /// Failures sorted by (package path, injector)
    pub errors: Vec<GenerateError>,
    /// The run was cut short
    pub cancelled: bool,
    /// Packages loaded during the run, sorted
    pub loaded_packages: Vec<String>,
}

impl GenerateReport {
    /// Whether the run finished without any error.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && !self.cancelled
    }

    fn finish(mut self) -> Self {
        self.outputs.sort_by(|a, b| a.pkg_path.cmp(&b.pkg_path));
        self.errors.sort_by(|a, b| (&a.pkg_path, &a.injector).cmp(&(&b.pkg_path, &b.injector)));
        self
    }
}

/// One injector of one root package.
struct Unit {
    pkg: Arc<PackageDescriptor>,
    decl: InjectorDecl,
}

/// Runs generation over a loader and a renderer.
///
/// The provider set cache belongs to the generator, so repeated runs on one
/// generator skip extraction for sets whose files did not change.
pub struct Generator {
    loader: Arc<dyn PackageLoader>,
    renderer: Arc<dyn Renderer>,
    set_cache: Arc<ProviderSetCache>,
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator").field("cached_sets", &self.set_cache.len()).finish_non_exhaustive()
    }
}

impl Generator {
    /// Create a generator with a fresh provider set cache.
    pub fn new(loader: Arc<dyn PackageLoader>, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            loader,
            renderer,
            set_cache: Arc::new(ProviderSetCache::new()),
        }
    }

    /// Use an existing provider set cache.
    #[must_use]
    pub fn with_set_cache(mut self, cache: Arc<ProviderSetCache>) -> Self {
        self.set_cache = cache;
        self
    }

    /// The provider set cache.
    pub fn set_cache(&self) -> &Arc<ProviderSetCache> {
        &self.set_cache
    }

    /// Run generation for `patterns`.
    pub async fn generate(
        &self,
        cancel: &CancellationToken,
        working_dir: &Path,
        env: &[(String, String)],
        patterns: &[String],
        options: &GenerateOptions,
        strategy: Strategy,
    ) -> GenerateReport {
        let mut report = GenerateReport::default();
        tracing::info!(
            target: "wiregen::generate",
            "generating {:?} in {} ({:?})",
            patterns,
            working_dir.display(),
            strategy
        );

        if cancel.is_cancelled() {
            report.cancelled = true;
            report.errors.push(GenerateError::package("", WireError::Cancelled));
            return report.finish();
        }

        let request = LoadRequest::new(working_dir, patterns.to_vec()).with_env(env.to_vec());
        let roots = self.loader.load(&request, cancel).await;
        let root_packages = roots.packages.clone();

        if !roots.is_complete() {
            tracing::warn!(
                target: "wiregen::generate",
                "{} of {} root packages failed to load",
                roots.errors.len(),
                roots.errors.len() + roots.packages.len()
            );
        }
        for err in &roots.errors {
            report.errors.push(GenerateError::package(
                err.pkg_path.clone(),
                WireError::LoadFailure {
                    pkg_path: err.pkg_path.clone(),
                    reason: err.message.clone(),
                },
            ));
        }

        let objects = if strategy.is_lazy() {
            let cache = ObjectCache::lazy(
                Arc::clone(&self.loader),
                working_dir,
                env.to_vec(),
                cancel.clone(),
            );
            cache.seed(roots);
            cache
        } else {
            let deps = self.load_imports(&request, &roots.packages, cancel).await;
            let cache = ObjectCache::eager(roots);
            cache.seed(deps);
            cache
        };

        let ctx = UnitContext {
            objects: Arc::new(objects),
            sets: (options.optimized || !matches!(strategy, Strategy::Sequential))
                .then(|| Arc::clone(&self.set_cache)),
            resolver: Resolver::new(options.duplicate_policy),
            renderer: Arc::clone(&self.renderer),
        };

        let units = discover_units(&root_packages, options, &mut report);
        tracing::debug!(target: "wiregen::generate", "{} units in {} packages", units.len(), root_packages.len());

        let results = run_units(&ctx, &units, strategy.workers(), cancel).await;
        if results.cancelled {
            report.cancelled = true;
            report.errors.push(GenerateError::package("", WireError::Cancelled));
        }

        self.assemble(&units, results.finished, options, &mut report);
        report.loaded_packages = ctx.objects.loaded_paths();

        tracing::info!(
            target: "wiregen::generate",
            "{} files, {} errors, {} packages loaded",
            report.outputs.len(),
            report.errors.len(),
            report.loaded_packages.len()
        );
        report.finish()
    }

    /// Load every package imported, transitively, by `roots`.
    async fn load_imports(
        &self,
        request: &LoadRequest,
        roots: &[Arc<PackageDescriptor>],
        cancel: &CancellationToken,
    ) -> LoadOutcome {
        let loaded: HashSet<&str> = roots.iter().map(|p| p.path.as_str()).collect();
        let mut imports: Vec<String> = roots
            .iter()
            .flat_map(|p| p.imports.iter())
            .filter(|path| !loaded.contains(path.as_str()))
            .cloned()
            .collect();
        imports.sort();
        imports.dedup();
        if imports.is_empty() {
            return LoadOutcome::default();
        }

        let deps = LoadRequest {
            patterns: imports,
            mode: LoadMode::WithDeps,
            ..request.clone()
        };
        let mut outcome = self.loader.load(&deps, cancel).await;
        outcome.packages.retain(|p| !loaded.contains(p.path.as_str()));
        outcome
    }

    /// Group finished units by package and render one file per package
    /// whose injectors all succeeded.
    fn assemble(
        &self,
        units: &[Unit],
        finished: Vec<(usize, UnitResult)>,
        options: &GenerateOptions,
        report: &mut GenerateReport,
    ) {
        let mut expected: HashMap<&str, usize> = HashMap::new();
        for unit in units {
            *expected.entry(unit.pkg.path.as_str()).or_default() += 1;
        }

        let mut by_package: BTreeMap<&str, Vec<(usize, UnitResult)>> = BTreeMap::new();
        for (index, result) in finished {
            by_package.entry(units[index].pkg.path.as_str()).or_default().push((index, result));
        }

        for (pkg_path, mut results) in by_package {
            results.sort_by_key(|(index, _)| *index);
            let complete = expected.get(pkg_path) == Some(&results.len());
            let pkg = Arc::clone(&units[results[0].0].pkg);

            let mut injectors = Vec::with_capacity(results.len());
            let mut failed = false;
            for (index, result) in results {
                match result {
                    Ok(output) => injectors.push(output),
                    Err(errors) => {
                        failed = true;
                        let name = &units[index].decl.name;
                        report.errors.extend(
                            errors.into_iter().map(|e| GenerateError::injector(pkg_path, name.clone(), e)),
                        );
                    }
                }
            }
            if failed || !complete {
                continue;
            }

            let rendered: Vec<RenderedInjector> = injectors
                .iter()
                .map(|i| RenderedInjector {
                    name: i.name.clone(),
                    code: i.code.clone(),
                })
                .collect();
            match self.renderer.render_file(&pkg, &rendered, options) {
                Ok(content) => report.outputs.push(PackageOutput {
                    pkg_path: pkg_path.to_string(),
                    output_path: pkg.dir.join(&options.output_file),
                    content,
                    injectors,
                }),
                Err(err) => report.errors.push(GenerateError::package(pkg_path, err.into())),
            }
        }
    }
}

/// Sequential run that re-extracts every provider set for every injector.
pub async fn generate(
    generator: &Generator,
    cancel: &CancellationToken,
    working_dir: &Path,
    env: &[(String, String)],
    patterns: &[String],
    options: &GenerateOptions,
) -> GenerateReport {
    let options = GenerateOptions {
        optimized: false,
        ..options.clone()
    };
    generator.generate(cancel, working_dir, env, patterns, &options, Strategy::Sequential).await
}

/// Sequential run that reuses extracted provider sets.
pub async fn generate_optimized(
    generator: &Generator,
    cancel: &CancellationToken,
    working_dir: &Path,
    env: &[(String, String)],
    patterns: &[String],
    options: &GenerateOptions,
) -> GenerateReport {
    let options = GenerateOptions {
        optimized: true,
        ..options.clone()
    };
    generator.generate(cancel, working_dir, env, patterns, &options, Strategy::Sequential).await
}

/// Run up to `max_workers` injectors concurrently.
pub async fn generate_parallel(
    generator: &Generator,
    cancel: &CancellationToken,
    working_dir: &Path,
    env: &[(String, String)],
    patterns: &[String],
    options: &GenerateOptions,
    max_workers: usize,
) -> GenerateReport {
    let strategy = Strategy::Parallel {
        max_workers,
    };
    generator.generate(cancel, working_dir, env, patterns, options, strategy).await
}

/// Sequential run that loads non-root packages on first touch.
pub async fn generate_lazy(
    generator: &Generator,
    cancel: &CancellationToken,
    working_dir: &Path,
    env: &[(String, String)],
    patterns: &[String],
    options: &GenerateOptions,
) -> GenerateReport {
    generator.generate(cancel, working_dir, env, patterns, options, Strategy::Lazy).await
}

/// Concurrent run that loads non-root packages on first touch.
pub async fn generate_parallel_lazy(
    generator: &Generator,
    cancel: &CancellationToken,
    working_dir: &Path,
    env: &[(String, String)],
    patterns: &[String],
    options: &GenerateOptions,
    max_workers: usize,
) -> GenerateReport {
    let strategy = Strategy::ParallelLazy {
        max_workers,
    };
    generator.generate(cancel, working_dir, env, patterns, options, strategy).await
}

type UnitResult = Result<InjectorOutput, Vec<WireError>>;

/// Results of the unit phase, keyed by unit index.
struct UnitResults {
    finished: Vec<(usize, UnitResult)>,
    cancelled: bool,
}

fn discover_units(
    roots: &[Arc<PackageDescriptor>],
    options: &GenerateOptions,
    report: &mut GenerateReport,
) -> Vec<Unit> {
    let mut units = Vec::new();
    let mut seen = HashSet::new();
    for pkg in roots {
        if !seen.insert(pkg.path.as_str()) {
            continue;
        }
        let selected: Vec<&InjectorDecl> = pkg.injectors.iter().filter(|i| options.selects(i)).collect();

        if !pkg.is_valid() {
            let cause = WireError::LoadFailure {
                pkg_path: pkg.path.clone(),
                reason: pkg.errors.join("; "),
            };
            if selected.is_empty() {
                report.errors.push(GenerateError::package(pkg.path.clone(), cause));
            } else {
                report.errors.extend(
                    selected
                        .iter()
                        .map(|decl| GenerateError::injector(pkg.path.clone(), decl.name.clone(), cause.clone())),
                );
            }
            continue;
        }

        units.extend(selected.into_iter().map(|decl| Unit {
            pkg: Arc::clone(pkg),
            decl: decl.clone(),
        }));
    }
    units
}

async fn run_units(
    ctx: &UnitContext,
    units: &[Unit],
    workers: usize,
    cancel: &CancellationToken,
) -> UnitResults {
    let mut finished = Vec::with_capacity(units.len());
    let mut results = stream::iter(units.iter().enumerate())
        .map(|(index, unit)| async move { (index, ctx.run(&unit.pkg, &unit.decl).await) })
        .buffer_unordered(workers);

    let mut cancelled = false;
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                cancelled = true;
                break;
            }
            next = results.next() => match next {
                Some((index, Err(errors))) if errors.contains(&WireError::Cancelled) => {
                    cancelled = true;
                    finished.push((index, Err(vec![WireError::Cancelled])));
                }
                Some(result) => finished.push(result),
                None => break,
            }
        }
    }

    if cancelled {
        // Units that never completed are reported as cancelled under their own name.
        let done: HashSet<usize> = finished.iter().map(|(index, _)| *index).collect();
        let skipped: Vec<usize> = (0..units.len()).filter(|index| !done.contains(index)).collect();
        tracing::debug!(target: "wiregen::generate", "cancelled with {} units unfinished", skipped.len());
        finished.extend(skipped.into_iter().map(|index| (index, Err(vec![WireError::Cancelled]))));
    }

    UnitResults {
        finished,
        cancelled,
    }
}
