//! Provider set data model.
//!
//! The generator reasons about four kinds of objects:
//!
//! - [`TypeRef`] - an opaque type name; each distinct type is a node in the
//!   resolution graph
//! - [`Provider`] - one construction step producing exactly one type from an
//!   ordered list of input types
//! - [`ProviderSet`] - a named, ordered collection of providers and references
//!   to other sets, identified by [`SetId`]
//! - [`InjectorRequest`] / [`ConstructionPlan`] - what an injector asks for and
//!   the ordered bindings that satisfy it
//!
//! Providers are immutable once extracted and shared as `Arc<Provider>`, so the
//! same provider can appear in many plans and cache entries without copying.
//! Package-level declarations (the loader's output) live in [`package`] and are
//! converted into this model by [`extract`].

pub mod extract;
pub mod package;
pub mod plan;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use package::{
    DeclKind, FieldDecl, InjectorDecl, PackageDescriptor, ProviderDecl, SetDecl, TypeInfo,
    TypeKind,
};
pub use plan::{Binding, BindingSource, ConstructionPlan, InjectorRequest};

/// An opaque type name such as `int`, `*Foo` or `example.com/app/db.Conn`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeRef(String);

impl TypeRef {
    /// Create a type reference from a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The type name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for TypeRef {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Kind tag of a set entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// A function called with its inputs.
    Function,
    /// A pre-built value expression with no inputs.
    Value,
    /// A field read from a struct value.
    StructField,
    /// A struct literal whose fields are its inputs.
    Struct,
    /// An interface satisfied by a concrete provided type.
    InterfaceBinding,
    /// A reference to another provider set.
    SetReference,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Function => "function",
            Self::Value => "value",
            Self::StructField => "struct-field",
            Self::Struct => "struct",
            Self::InterfaceBinding => "interface-binding",
            Self::SetReference => "set-reference",
        };
        f.write_str(name)
    }
}

/// A named construction step.
///
/// `fields` holds the struct field names for [`ProviderKind::Struct`] (one per
/// input, same order) and the single field read by
/// [`ProviderKind::StructField`]; it is empty otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provider {
    /// Declaring package path
    pub pkg_path: String,
    /// Identifier inside the package
    pub name: String,
    /// Kind tag
    pub kind: ProviderKind,
    /// Ordered input types
    pub inputs: Vec<TypeRef>,
    /// Produced type
    pub output: TypeRef,
    /// Value expression for [`ProviderKind::Value`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,
    /// Struct field names, see type-level docs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    /// The provider can fail
    #[serde(default)]
    pub returns_error: bool,
    /// The provider returns a cleanup function
    #[serde(default)]
    pub has_cleanup: bool,
}

impl Provider {
    /// Create a function provider.
    pub fn function(
        pkg_path: impl Into<String>,
        name: impl Into<String>,
        inputs: Vec<TypeRef>,
        output: impl Into<TypeRef>,
    ) -> Self {
        Self {
            pkg_path: pkg_path.into(),
            name: name.into(),
            kind: ProviderKind::Function,
            inputs,
            output: output.into(),
            expr: None,
            fields: Vec::new(),
            returns_error: false,
            has_cleanup: false,
        }
    }

    /// Create a value provider.
    pub fn value(
        pkg_path: impl Into<String>,
        name: impl Into<String>,
        output: impl Into<TypeRef>,
        expr: impl Into<String>,
    ) -> Self {
        Self {
            kind: ProviderKind::Value,
            expr: Some(expr.into()),
            ..Self::function(pkg_path, name, Vec::new(), output)
        }
    }

    /// Mark the provider as fallible.
    #[must_use]
    pub fn with_error(mut self) -> Self {
        self.returns_error = true;
        self
    }

    /// Mark the provider as returning a cleanup function.
    #[must_use]
    pub fn with_cleanup(mut self) -> Self {
        self.has_cleanup = true;
        self
    }

    /// `pkg/path.Name`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.pkg_path, self.name)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.qualified_name(), self.kind)
    }
}

/// Identity of a provider set: package path plus variable name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SetId {
    /// Declaring package path
    pub pkg_path: String,
    /// Set name
    pub name: String,
}

impl SetId {
    /// Create a set identity.
    pub fn new(pkg_path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            pkg_path: pkg_path.into(),
            name: name.into(),
        }
    }

    /// Parse a set reference as written in declarations.
    ///
    /// `Name` refers to a set in `current_pkg`; `pkg/path.Name` splits at the
    /// last dot, so package paths may themselves contain dots.
    pub fn parse(reference: &str, current_pkg: &str) -> Self {
        match reference.rsplit_once('.') {
            Some((pkg, name)) if !pkg.is_empty() && !name.is_empty() => Self::new(pkg, name),
            _ => Self::new(current_pkg, reference),
        }
    }
}

impl fmt::Display for SetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.pkg_path, self.name)
    }
}

/// One entry of a provider set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SetItem {
    /// A provider declared in the set
    Provider(Arc<Provider>),
    /// A reference to another set
    Reference(SetId),
}

impl SetItem {
    /// Kind tag of the entry.
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Provider(p) => p.kind,
            Self::Reference(_) => ProviderKind::SetReference,
        }
    }
}

/// A named, ordered collection of providers and set references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSet {
    /// Set identity
    pub id: SetId,
    /// Entries in declaration order
    pub items: Vec<SetItem>,
}

impl ProviderSet {
    /// Create an empty set.
    pub fn new(id: SetId) -> Self {
        Self {
            id,
            items: Vec::new(),
        }
    }

    /// Append a provider.
    #[must_use]
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.items.push(SetItem::Provider(Arc::new(provider)));
        self
    }

    /// Append a set reference.
    #[must_use]
    pub fn with_reference(mut self, id: SetId) -> Self {
        self.items.push(SetItem::Reference(id));
        self
    }

    /// Providers declared directly in this set.
    pub fn providers(&self) -> impl Iterator<Item = &Arc<Provider>> {
        self.items.iter().filter_map(|item| match item {
            SetItem::Provider(p) => Some(p),
            SetItem::Reference(_) => None,
        })
    }

    /// Sets referenced directly by this set.
    pub fn references(&self) -> impl Iterator<Item = &SetId> {
        self.items.iter().filter_map(|item| match item {
            SetItem::Reference(id) => Some(id),
            SetItem::Provider(_) => None,
        })
    }
}
