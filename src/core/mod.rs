//! Core types for wiregen
//!
//! This module holds the error taxonomy shared by every layer of the
//! generator:
//! - [`WireError`] - Enumerated failure modes of loading, resolution and rendering
//! - [`ErrorContext`] - User-friendly wrapper with suggestions and details
//! - [`user_friendly_error`] - Convert any error to the user-friendly format
//!
//! Operations that fail for a single injector return [`WireError`] values that
//! the scheduler attaches to that injector; application seams (CLI, config,
//! file writing) use [`anyhow::Result`] and convert at the edge.

pub mod error;

pub use error::{ErrorContext, WireError, user_friendly_error};
