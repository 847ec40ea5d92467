//! Error handling for wiregen
//!
//! This module provides the error taxonomy of the generator and the user-facing
//! presentation layer used by the CLI. The error system follows two principles:
//! 1. **Strongly-typed errors** so the scheduler can attach each failure to the
//!    injector or package it belongs to
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Architecture
//!
//! - [`WireError`] - Enumerated failure modes of loading, extraction, resolution,
//!   rendering and configuration
//! - [`ErrorContext`] - Wrapper that adds details and suggestions for display
//!
//! # Error Categories
//!
//! - **Resolution** (per injector): [`WireError::NoProvider`],
//!   [`WireError::DuplicateProvider`], [`WireError::Cycle`],
//!   [`WireError::SetReferenceCycle`], [`WireError::DuplicateInput`]
//! - **Declarations** (per injector): [`WireError::UnknownSet`],
//!   [`WireError::UnknownProvider`], [`WireError::InvalidDeclaration`]
//! - **Loading** (per package): [`WireError::LoadFailure`],
//!   [`WireError::PackageNotFound`]
//! - **Run level**: [`WireError::Cancelled`], [`WireError::Config`],
//!   [`WireError::Io`], [`WireError::Parse`]
//!
//! Per-injector errors never abort sibling injectors; the scheduler collects
//! them into the run report.
//!
//! # Examples
//!
//! ```rust,no_run
//! use wiregen_cli::core::{WireError, user_friendly_error};
//!
//! let error = WireError::Cycle {
//!     chain: vec!["Foo".into(), "Bar".into(), "Foo".into()],
//! };
//! let context = user_friendly_error(anyhow::Error::from(error));
//! context.display(); // Shows colored error with suggestions
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

use crate::model::TypeRef;

/// The main error type for wiregen operations.
///
/// Variants carry owned data only so errors can be cloned into every injector
/// that shares a root cause (for example a package that failed to load).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// A requested or intermediate type has no provider and is not an input.
    #[error("no provider found for {type_ref}{}{}", needed_by_suffix(.needed_by), suggestion_suffix(.suggestions))]
    NoProvider {
        /// The type nothing provides
        type_ref: TypeRef,
        /// Provider whose input required the type, `None` for requested outputs
        needed_by: Option<String>,
        /// Provided types with a similar name
        suggestions: Vec<TypeRef>,
    },

    /// More than one distinct provider produces the same type.
    #[error("multiple bindings for {type_ref}: {}", .providers.join(", "))]
    DuplicateProvider {
        /// The ambiguous type
        type_ref: TypeRef,
        /// Qualified names of the conflicting providers, in precedence order
        providers: Vec<String>,
    },

    /// Provider dependencies form a cycle.
    #[error("cycle for {}: {}", .chain.first().map(ToString::to_string).unwrap_or_default(), join_types(.chain))]
    Cycle {
        /// Full chain of types, first and last entries are equal
        chain: Vec<TypeRef>,
    },

    /// Provider sets reference each other in a cycle.
    #[error("provider set reference cycle: {}", .chain.join(" -> "))]
    SetReferenceCycle {
        /// Qualified set names, first and last entries are equal
        chain: Vec<String>,
    },

    /// The same type appears twice in an injector's inputs.
    #[error("multiple inputs of the same type {type_ref}")]
    DuplicateInput {
        /// The repeated input type
        type_ref: TypeRef,
    },

    /// The package loader could not produce type information for a package.
    #[error("failed to load package {pkg_path}: {reason}")]
    LoadFailure {
        /// Package path
        pkg_path: String,
        /// Loader diagnostic
        reason: String,
    },

    /// A package was requested from an eager cache that never loaded it.
    #[error("package {pkg_path} was not loaded")]
    PackageNotFound {
        /// Package path
        pkg_path: String,
    },

    /// A set reference names a set that does not exist.
    #[error("unknown provider set {set} referenced from {referenced_from}")]
    UnknownSet {
        /// Qualified name of the missing set
        set: String,
        /// Qualified name of the set or injector holding the reference
        referenced_from: String,
    },

    /// A set or injector names a provider that is not declared.
    #[error("unknown provider {name} in package {pkg_path}")]
    UnknownProvider {
        /// Provider identifier
        name: String,
        /// Package that was searched
        pkg_path: String,
    },

    /// A declaration is structurally invalid.
    #[error("invalid declaration {pkg_path}.{name}: {reason}")]
    InvalidDeclaration {
        /// Package path
        pkg_path: String,
        /// Declared name
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// The renderer rejected a construction plan.
    #[error("render failed: {reason}")]
    Render {
        /// Renderer diagnostic, forwarded verbatim
        reason: String,
    },

    /// The run was cancelled before every unit completed.
    #[error("generation cancelled")]
    Cancelled,

    /// Configuration file or option problem.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// File system operation failed.
    #[error("{operation} failed for {path}: {reason}")]
    Io {
        /// What was being done
        operation: String,
        /// Path involved
        path: String,
        /// Underlying I/O error message
        reason: String,
    },

    /// A declaration file could not be parsed.
    #[error("failed to parse {file}: {reason}")]
    Parse {
        /// File that failed to parse
        file: String,
        /// Parser diagnostic
        reason: String,
    },

    /// Any other failure, shown as is.
    #[error("{message}")]
    Other {
        /// Message including its cause chain
        message: String,
    },
}

fn needed_by_suffix(needed_by: &Option<String>) -> String {
    needed_by.as_ref().map(|p| format!(", needed by {p}")).unwrap_or_default()
}

fn suggestion_suffix(suggestions: &[TypeRef]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean {}?)", join_with(suggestions, ", "))
    }
}

fn join_types(chain: &[TypeRef]) -> String {
    join_with(chain, " -> ")
}

fn join_with(types: &[TypeRef], sep: &str) -> String {
    types.iter().map(ToString::to_string).collect::<Vec<_>>().join(sep)
}

/// Error wrapper with user-friendly details and suggestions.
///
/// ```rust,no_run
/// use wiregen_cli::core::{ErrorContext, WireError};
///
/// let context = ErrorContext::new(WireError::Cancelled)
///     .with_suggestion("Re-run without interrupting the command")
///     .with_details("Units that completed before cancellation were kept");
///
/// println!("{}", context);
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: WireError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: WireError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors.
    ///
    /// - Error message: red and bold
    /// - Details: yellow
    /// - Suggestion: green
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`].
///
/// Recognizes [`WireError`], [`std::io::Error`] and [`toml::de::Error`]; any
/// other error is shown with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(wire_error) = error.downcast_ref::<WireError>() {
        return create_error_context(wire_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        let context = ErrorContext::new(WireError::Io {
            operation: "file access".to_string(),
            path: "unknown".to_string(),
            reason: io_error.to_string(),
        });
        return match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => context
                .with_suggestion("Check file ownership and permissions of the package directories")
                .with_details("wiregen needs to read declaration files and write generated files"),
            std::io::ErrorKind::NotFound => context
                .with_suggestion("Check that the working directory and package patterns are correct"),
            _ => context,
        };
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(WireError::Parse {
            file: "configuration".to_string(),
            reason: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax. Verify quotes, brackets, and table headers")
        .with_details(error.to_string());
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(WireError::Other {
        message,
    })
}

fn create_error_context(error: WireError) -> ErrorContext {
    match &error {
        WireError::NoProvider {
            type_ref,
            ..
        } => {
            let suggestion = format!(
                "Add a provider for {type_ref} to one of the injector's sets, or accept it as an injector input"
            );
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        WireError::DuplicateProvider {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Remove all but one of the conflicting providers from the injector's sets")
            .with_details(
                "Each type must be provided exactly once per injector. Providers reached through several sets count once",
            ),
        WireError::Cycle {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Break the cycle by removing one of the dependencies or accepting a type as an input")
            .with_details("A provider cannot depend on its own output directly or indirectly"),
        WireError::SetReferenceCycle {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Remove one of the set references so composition forms a tree or DAG"),
        WireError::LoadFailure {
            pkg_path,
            ..
        } => {
            let details = format!("No injector in {pkg_path} can be analyzed until the package loads");
            ErrorContext::new(error)
                .with_suggestion("Fix the reported declaration errors and run again")
                .with_details(details)
        }
        WireError::PackageNotFound {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check the package pattern or the module path in wire.mod"),
        WireError::UnknownSet {
            ..
        }
        | WireError::UnknownProvider {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check the spelling and the package path of the referenced declaration"),
        WireError::Cancelled => ErrorContext::new(error)
            .with_details("Results of injectors that finished before cancellation were kept"),
        WireError::Config {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check wiregen.toml and the WIREGEN_* environment variables"),
        _ => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_provider_message_includes_context() {
        let error = WireError::NoProvider {
            type_ref: "Foo".into(),
            needed_by: Some("example.com/app.NewBar".to_string()),
            suggestions: vec!["*Foo".into()],
        };
        let msg = error.to_string();
        assert!(msg.contains("no provider found for Foo"));
        assert!(msg.contains("needed by example.com/app.NewBar"));
        assert!(msg.contains("did you mean *Foo?"));
    }

    #[test]
    fn test_cycle_message_lists_chain() {
        let error = WireError::Cycle {
            chain: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(error.to_string(), "cycle for A: A -> B -> A");
    }

    #[test]
    fn test_user_friendly_error_preserves_wire_error() {
        let context = user_friendly_error(anyhow::Error::from(WireError::Cancelled));
        assert_eq!(context.error, WireError::Cancelled);
        assert!(context.details.is_some());
    }

    #[test]
    fn test_user_friendly_error_generic_chain() {
        let error = anyhow::anyhow!("root").context("outer");
        let context = user_friendly_error(error);
        let rendered = context.to_string();
        assert!(rendered.contains("outer"));
        assert!(rendered.contains("Caused by"));
    }

    #[test]
    fn test_error_context_display() {
        let context = ErrorContext::new(WireError::Cancelled)
            .with_details("some details")
            .with_suggestion("some suggestion");
        let display = context.to_string();
        assert!(display.contains("generation cancelled"));
        assert!(display.contains("Details: some details"));
        assert!(display.contains("Suggestion: some suggestion"));
    }
}
