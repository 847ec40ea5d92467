//! wiregen - compile-time dependency injection code generator
//!
//! Packages declare **providers** (functions, values, struct literals, struct
//! fields, interface bindings), group them into named **provider sets** and
//! declare **injectors**: functions whose body wiregen writes. For every
//! injector the generator finds an order of provider calls that turns the
//! injector's inputs into its outputs and emits that code.
//!
//! # Architecture Overview
//!
//! ```text
//! patterns ─► PackageLoader ─► ObjectCache ─► units (one per injector)
//!                                               │ collect sets ◄─ ProviderSetCache
//!                                               │ SetGraph ─► Resolver ─► ConstructionPlan
//!                                               ▼
//!                                            Renderer ─► one file per package
//! ```
//!
//! # Core Modules
//!
//! - [`model`] - types, providers, sets, requests and plans
//! - [`loader`] - the package loader seam and the TOML declaration loader
//! - [`cache`] - the per-run package cache and the cross-run provider set cache
//! - [`resolver`] - set graph flattening and demand-driven resolution
//! - [`render`] - code emission with Tera templates
//! - [`generate`] - scheduling strategies and the run report
//!
//! ## Supporting Modules
//!
//! - [`cli`] - the `wiregen` command line
//! - [`config`] - `wiregen.toml` and environment overrides
//! - [`core`] - error types and user-facing error formatting
//! - [`constants`] - file names, environment variables and defaults
//! - [`utils`] - atomic file writes
//!
//! # Declaration Format
//!
//! ```toml
//! [[provider]]
//! name = "NewServer"
//! inputs = ["Config", "*DB"]
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
//! returns_error = true
//! ```
//!
//! # Programmatic Use
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use wiregen_cli::generate::{GenerateOptions, Generator, Strategy};
//! use wiregen_cli::loader::ManifestLoader;
//! use wiregen_cli::render::TemplateRenderer;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let generator = Generator::new(Arc::new(ManifestLoader::new()), Arc::new(TemplateRenderer::new()?));
//! let report = generator
//!     .generate(
//!         &CancellationToken::new(),
//!         Path::new("."),
//!         &[],
//!         &["./...".to_string()],
//!         &GenerateOptions::default(),
//!         Strategy::Parallel { max_workers: 8 },
//!     )
//!     .await;
//! for output in &report.outputs {
//!     println!("{}", output.output_path.display());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod generate;
pub mod loader;
pub mod model;
pub mod render;
pub mod resolver;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
