//! Package descriptors produced by a [`PackageLoader`](crate::loader::PackageLoader).
//!
//! A descriptor is the typed view of one package: its source files, the
//! packages it imports, its type table and the raw provider, set and injector
//! declarations found in its files. Descriptors are owned by the
//! [`ObjectCache`](crate::cache::ObjectCache) for one generation run and never
//! mutated after insertion.
//!
//! The declaration structs double as the on-disk schema of `*.wire.toml`
//! files, which is why they derive [`Deserialize`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::TypeRef;
use crate::cache::FileSetFingerprint;

/// Coarse classification of a declared type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    /// A struct with named fields
    Struct,
    /// An interface that concrete types can be bound to
    Interface,
    /// Anything else
    #[default]
    Other,
}

/// A named struct field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    /// Field name
    pub name: String,
    /// Field type
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
}

/// Type information for one declared type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    /// Classification
    #[serde(default)]
    pub kind: TypeKind,
    /// Struct fields in declaration order
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
}

impl TypeInfo {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Declaration flavour of a provider entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    /// A constructor function
    #[default]
    Function,
    /// A value expression
    Value,
    /// A struct literal built from its fields
    Struct,
    /// Every listed field of a struct, one provider per field
    Fields,
    /// An interface bound to a concrete type
    Bind,
}

/// A provider declaration as written in a package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDecl {
    /// Identifier
    pub name: String,
    /// Flavour, defaults to function
    #[serde(default)]
    pub kind: DeclKind,
    /// Input types of a function
    #[serde(default)]
    pub inputs: Vec<TypeRef>,
    /// Output type of a function or value
    #[serde(default)]
    pub output: Option<TypeRef>,
    /// Expression of a value
    #[serde(default)]
    pub expr: Option<String>,
    /// Struct type of a struct or fields declaration
    #[serde(default, rename = "struct")]
    pub struct_type: Option<TypeRef>,
    /// Field names of a struct or fields declaration, `"*"` selects all
    #[serde(default)]
    pub fields: Vec<String>,
    /// Interface of a bind declaration
    #[serde(default)]
    pub interface: Option<TypeRef>,
    /// Concrete type of a bind declaration
    #[serde(default)]
    pub concrete: Option<TypeRef>,
    /// The function can fail
    #[serde(default)]
    pub returns_error: bool,
    /// The function returns a cleanup
    #[serde(default)]
    pub cleanup: bool,
}

/// A named provider set declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDecl {
    /// Set name
    pub name: String,
    /// Local provider names
    #[serde(default)]
    pub providers: Vec<String>,
    /// Referenced sets, `Name` or `pkg/path.Name`
    #[serde(default)]
    pub sets: Vec<String>,
}

/// An injector declaration: the function whose body is generated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectorDecl {
    /// Injector function name
    pub name: String,
    /// Types passed in by the caller
    #[serde(default)]
    pub inputs: Vec<TypeRef>,
    /// Types the injector returns
    #[serde(default)]
    pub outputs: Vec<TypeRef>,
    /// Local providers listed directly
    #[serde(default)]
    pub providers: Vec<String>,
    /// Sets to draw from, earlier sets take precedence
    #[serde(default)]
    pub sets: Vec<String>,
    /// Tags used by option-based filtering
    #[serde(default)]
    pub tags: Vec<String>,
    /// The injector returns a `Result`
    #[serde(default)]
    pub returns_error: bool,
    /// The injector returns a cleanup
    #[serde(default)]
    pub cleanup: bool,
}

/// A loaded package with its type information and declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    /// Package path, e.g. `example.com/app/db`
    pub path: String,
    /// Directory holding the package files
    pub dir: PathBuf,
    /// Source files the declarations were read from, sorted
    pub files: Vec<PathBuf>,
    /// Packages referenced by cross-package set references, sorted
    pub imports: Vec<String>,
    /// Declared types by name
    pub types: BTreeMap<String, TypeInfo>,
    /// Provider declarations in file order
    pub providers: Vec<ProviderDecl>,
    /// Set declarations in file order
    pub sets: Vec<SetDecl>,
    /// Injector declarations in file order
    pub injectors: Vec<InjectorDecl>,
    /// Type-check errors; a package with errors cannot be analyzed
    pub errors: Vec<String>,
    /// Fingerprint of `files` as they were read, `None` when the loader did
    /// not read files
    #[serde(skip)]
    pub fingerprint: Option<FileSetFingerprint>,
}

impl PackageDescriptor {
    /// Create an empty descriptor.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Last path segment, used for naming generated code.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Look up a provider declaration.
    pub fn provider(&self, name: &str) -> Option<&ProviderDecl> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Look up a set declaration.
    pub fn set(&self, name: &str) -> Option<&SetDecl> {
        self.sets.iter().find(|s| s.name == name)
    }

    /// Look up an injector declaration.
    pub fn injector(&self, name: &str) -> Option<&InjectorDecl> {
        self.injectors.iter().find(|i| i.name == name)
    }

    /// Fingerprint of the declaration files the package was built from.
    ///
    /// Falls back to reading `files` from disk when the loader recorded none.
    pub fn file_fingerprint(&self) -> FileSetFingerprint {
        self.fingerprint.clone().unwrap_or_else(|| FileSetFingerprint::compute(&self.files))
    }

    /// Whether the package type-checked cleanly.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}
