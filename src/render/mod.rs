//! Code emission for resolved injectors.
//!
//! The generator hands each successful [`ConstructionPlan`] to a [`Renderer`]
//! and then asks it to assemble one file per package. [`TemplateRenderer`] is
//! the bundled implementation; it produces Rust source with Tera templates.
//!
//! Render errors are attached to the injector (or the package, for file
//! assembly) that produced them and reported as [`WireError::Render`].

pub mod template;

use thiserror::Error;

use crate::core::WireError;
use crate::generate::GenerateOptions;
use crate::model::{ConstructionPlan, InjectorDecl, PackageDescriptor};

pub use template::TemplateRenderer;

/// Failures while emitting code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The injector's function name clashes with a provider of its package
    #[error("injector {injector} collides with provider {provider} in {pkg_path}")]
    NameCollision {
        /// Package path
        pkg_path: String,
        /// Injector name
        injector: String,
        /// Colliding provider name
        provider: String,
    },

    /// A step can fail but the injector cannot return an error
    #[error("injector {injector} must return an error: provider {provider} can fail")]
    UnhandledError {
        /// Injector name
        injector: String,
        /// Fallible provider
        provider: String,
    },

    /// A step returns a cleanup but the injector does not
    #[error("injector {injector} must return a cleanup: provider {provider} has one")]
    UnhandledCleanup {
        /// Injector name
        injector: String,
        /// Provider with cleanup
        provider: String,
    },

    /// The template engine failed
    #[error("template error: {message}")]
    Template {
        /// Engine diagnostic
        message: String,
    },
}

impl From<RenderError> for WireError {
    fn from(err: RenderError) -> Self {
        Self::Render {
            reason: err.to_string(),
        }
    }
}

impl From<tera::Error> for RenderError {
    fn from(err: tera::Error) -> Self {
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::Template {
            message,
        }
    }
}

/// Source emitted for one injector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedInjector {
    /// Injector name as declared
    pub name: String,
    /// Function source
    pub code: String,
}

/// Emits source for resolved injectors.
///
/// Implementations must be safe to share between concurrent generation units.
pub trait Renderer: Send + Sync {
    /// Emit one injector function.
    fn render_injector(
        &self,
        pkg: &PackageDescriptor,
        injector: &InjectorDecl,
        plan: &ConstructionPlan,
    ) -> Result<RenderedInjector, RenderError>;

    /// Assemble a package's injectors into a file.
    fn render_file(
        &self,
        pkg: &PackageDescriptor,
        injectors: &[RenderedInjector],
        options: &GenerateOptions,
    ) -> Result<String, RenderError>;
}
