//! Per-run generation options.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_OUTPUT_FILE;
use crate::model::InjectorDecl;
use crate::resolver::DuplicatePolicy;

/// Options shared by every unit of a run.
///
/// Every field has a default, so a `[generate]` table in `wiregen.toml` only
/// needs the keys it changes:
///
/// ```toml
/// [generate]
/// output_file = "di.rs"
/// tags = ["server"]
/// duplicate_policy = "first-match"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    /// File name written into each package directory
    pub output_file: String,

    /// Text placed before the generated banner, usually a license comment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,

    /// Emit the "DO NOT EDIT" banner
    pub emit_generated_header: bool,

    /// Only generate injectors carrying one of these tags; empty means all
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Treatment of distinct providers for one type
    pub duplicate_policy: DuplicatePolicy,

    /// Reuse extracted provider sets in sequential runs
    pub optimized: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
            header: None,
            emit_generated_header: true,
            tags: Vec::new(),
            duplicate_policy: DuplicatePolicy::default(),
            optimized: true,
        }
    }
}

impl GenerateOptions {
    /// Whether `injector` passes the tag filter.
    pub fn selects(&self, injector: &InjectorDecl) -> bool {
        self.tags.is_empty() || injector.tags.iter().any(|t| self.tags.contains(t))
    }
}
