//! Injector requests and the construction plans that satisfy them.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{Provider, SetItem, TypeRef};

/// What an injector asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectorRequest {
    /// Package declaring the injector
    pub pkg_path: String,
    /// Injector function name
    pub name: String,
    /// Types supplied by the caller
    pub inputs: Vec<TypeRef>,
    /// Types the injector must produce
    pub outputs: Vec<TypeRef>,
    /// Providers and set references to draw from, in precedence order
    pub items: Vec<SetItem>,
}

impl InjectorRequest {
    /// Create a request with no inputs or items.
    pub fn new(pkg_path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            pkg_path: pkg_path.into(),
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            items: Vec::new(),
        }
    }

    /// `pkg/path.Name`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.pkg_path, self.name)
    }
}

/// Where a bound type comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BindingSource {
    /// The injector argument at `index`
    Input {
        /// Argument position
        index: usize,
    },
    /// A provider invocation
    Provider(Arc<Provider>),
}

/// The resolved pairing of a type with what supplies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// The bound type
    pub type_ref: TypeRef,
    /// Its supplier
    pub source: BindingSource,
}

impl Binding {
    /// The provider behind this binding, if any.
    pub fn provider(&self) -> Option<&Arc<Provider>> {
        match &self.source {
            BindingSource::Provider(p) => Some(p),
            BindingSource::Input {
                ..
            } => None,
        }
    }
}

/// Ordered bindings satisfying one injector request.
///
/// `steps` only holds provider bindings, in an order where every provider's
/// inputs are bound by an earlier step or by `inputs`. Each provider appears
/// at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionPlan {
    /// Input bindings in argument order
    pub inputs: Vec<Binding>,
    /// Provider bindings in execution order
    pub steps: Vec<Binding>,
    /// Requested output types
    pub outputs: Vec<TypeRef>,
}

impl ConstructionPlan {
    /// Find the binding for a type among inputs and steps.
    pub fn binding_for(&self, type_ref: &TypeRef) -> Option<&Binding> {
        self.inputs.iter().chain(self.steps.iter()).find(|b| &b.type_ref == type_ref)
    }

    /// Names of the providers in execution order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().filter_map(Binding::provider).map(|p| p.name.as_str()).collect()
    }
}
