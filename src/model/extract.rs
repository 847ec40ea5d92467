//! Conversion of package declarations into the provider set model.
//!
//! Extraction validates each declaration against the package's type table and
//! produces immutable [`Provider`]s. It is the work the
//! [`ProviderSetCache`](crate::cache::ProviderSetCache) avoids repeating when a
//! package's files have not changed.

use std::sync::Arc;

use super::{
    DeclKind, InjectorDecl, InjectorRequest, PackageDescriptor, Provider, ProviderDecl,
    ProviderKind, ProviderSet, SetId, SetItem, TypeKind, TypeRef,
};
use crate::core::WireError;

/// Expand one provider declaration into providers.
///
/// Every declaration yields exactly one provider except
/// [`DeclKind::Fields`], which yields one provider per selected field.
pub fn extract_provider(
    pkg: &PackageDescriptor,
    decl: &ProviderDecl,
) -> Result<Vec<Provider>, WireError> {
    let invalid = |reason: &str| WireError::InvalidDeclaration {
        pkg_path: pkg.path.clone(),
        name: decl.name.clone(),
        reason: reason.to_string(),
    };

    match decl.kind {
        DeclKind::Function => {
            let output = decl.output.clone().ok_or_else(|| invalid("function has no output"))?;
            let mut provider = Provider::function(&pkg.path, &decl.name, decl.inputs.clone(), output);
            provider.returns_error = decl.returns_error;
            provider.has_cleanup = decl.cleanup;
            Ok(vec![provider])
        }
        DeclKind::Value => {
            let output = decl.output.clone().ok_or_else(|| invalid("value has no output"))?;
            let expr = decl.expr.clone().ok_or_else(|| invalid("value has no expression"))?;
            if !decl.inputs.is_empty() {
                return Err(invalid("value cannot have inputs"));
            }
            Ok(vec![Provider::value(&pkg.path, &decl.name, output, expr)])
        }
        DeclKind::Struct => {
            let struct_type = decl.struct_type.clone().ok_or_else(|| invalid("missing struct type"))?;
            let fields = select_fields(pkg, decl, &struct_type)?;
            let mut provider = Provider::function(
                &pkg.path,
                &decl.name,
                fields.iter().map(|(_, ty)| ty.clone()).collect(),
                struct_type,
            );
            provider.kind = ProviderKind::Struct;
            provider.fields = fields.into_iter().map(|(name, _)| name).collect();
            Ok(vec![provider])
        }
        DeclKind::Fields => {
            let struct_type = decl.struct_type.clone().ok_or_else(|| invalid("missing struct type"))?;
            let fields = select_fields(pkg, decl, &struct_type)?;
            Ok(fields
                .into_iter()
                .map(|(field, ty)| {
                    let mut provider = Provider::function(
                        &pkg.path,
                        format!("{}.{}", struct_type, field),
                        vec![struct_type.clone()],
                        ty,
                    );
                    provider.kind = ProviderKind::StructField;
                    provider.fields = vec![field];
                    provider
                })
                .collect())
        }
        DeclKind::Bind => {
            let interface = decl.interface.clone().ok_or_else(|| invalid("missing interface"))?;
            let concrete = decl.concrete.clone().ok_or_else(|| invalid("missing concrete type"))?;
            if let Some(info) = pkg.types.get(interface.as_str())
                && info.kind != TypeKind::Interface
            {
                return Err(invalid(&format!("{interface} is not an interface")));
            }
            let mut provider = Provider::function(&pkg.path, &decl.name, vec![concrete], interface);
            provider.kind = ProviderKind::InterfaceBinding;
            Ok(vec![provider])
        }
    }
}

fn select_fields(
    pkg: &PackageDescriptor,
    decl: &ProviderDecl,
    struct_type: &TypeRef,
) -> Result<Vec<(String, TypeRef)>, WireError> {
    let invalid = |reason: String| WireError::InvalidDeclaration {
        pkg_path: pkg.path.clone(),
        name: decl.name.clone(),
        reason,
    };

    let info = pkg
        .types
        .get(struct_type.as_str())
        .filter(|info| info.kind == TypeKind::Struct)
        .ok_or_else(|| invalid(format!("{struct_type} is not a declared struct")))?;

    if decl.fields.iter().any(|f| f == "*") {
        return Ok(info.fields.iter().map(|f| (f.name.clone(), f.type_ref.clone())).collect());
    }

    if decl.fields.is_empty() {
        return Err(invalid("no fields selected".to_string()));
    }

    decl.fields
        .iter()
        .map(|name| {
            info.field(name)
                .map(|f| (f.name.clone(), f.type_ref.clone()))
                .ok_or_else(|| invalid(format!("{struct_type} has no field {name}")))
        })
        .collect()
}

fn resolve_items(
    pkg: &PackageDescriptor,
    providers: &[String],
    sets: &[String],
) -> Result<Vec<SetItem>, WireError> {
    let mut items = Vec::with_capacity(providers.len() + sets.len());

    for name in providers {
        let decl = pkg.provider(name).ok_or_else(|| WireError::UnknownProvider {
            name: name.clone(),
            pkg_path: pkg.path.clone(),
        })?;
        items.extend(extract_provider(pkg, decl)?.into_iter().map(|p| SetItem::Provider(Arc::new(p))));
    }

    for reference in sets {
        items.push(SetItem::Reference(SetId::parse(reference, &pkg.path)));
    }

    Ok(items)
}

/// Extract a named set of `pkg`.
///
/// `referenced_from` names the set or injector that asked for it and is only
/// used in the [`WireError::UnknownSet`] diagnostic.
pub fn extract_set(
    pkg: &PackageDescriptor,
    name: &str,
    referenced_from: &str,
) -> Result<ProviderSet, WireError> {
    let decl = pkg.set(name).ok_or_else(|| WireError::UnknownSet {
        set: SetId::new(&pkg.path, name).to_string(),
        referenced_from: referenced_from.to_string(),
    })?;

    Ok(ProviderSet {
        id: SetId::new(&pkg.path, name),
        items: resolve_items(pkg, &decl.providers, &decl.sets)?,
    })
}

/// Build the request for an injector declared in `pkg`.
///
/// Directly listed providers come first, then set references in declaration
/// order; this is the precedence order used by the resolver.
pub fn injector_request(
    pkg: &PackageDescriptor,
    decl: &InjectorDecl,
) -> Result<InjectorRequest, WireError> {
    Ok(InjectorRequest {
        pkg_path: pkg.path.clone(),
        name: decl.name.clone(),
        inputs: decl.inputs.clone(),
        outputs: decl.outputs.clone(),
        items: resolve_items(pkg, &decl.providers, &decl.sets)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldDecl, SetDecl, TypeInfo};

    fn config_pkg() -> PackageDescriptor {
        let mut pkg = PackageDescriptor::new("example.com/app");
        pkg.types.insert(
            "Config".to_string(),
            TypeInfo {
                kind: TypeKind::Struct,
                fields: vec![
                    FieldDecl {
                        name: "Port".to_string(),
                        type_ref: "int".into(),
                    },
                    FieldDecl {
                        name: "Host".to_string(),
                        type_ref: "string".into(),
                    },
                ],
            },
        );
        pkg.types.insert(
            "Fooer".to_string(),
            TypeInfo {
                kind: TypeKind::Interface,
                fields: Vec::new(),
            },
        );
        pkg
    }

    #[test]
    fn test_function_requires_output() {
        let pkg = config_pkg();
        let decl = ProviderDecl {
            name: "NewFoo".to_string(),
            ..ProviderDecl::default()
        };
        let err = extract_provider(&pkg, &decl).unwrap_err();
        assert!(matches!(err, WireError::InvalidDeclaration { .. }));
    }

    #[test]
    fn test_fields_expand_per_field() {
        let pkg = config_pkg();
        let decl = ProviderDecl {
            name: "ConfigFields".to_string(),
            kind: DeclKind::Fields,
            struct_type: Some("Config".into()),
            fields: vec!["*".to_string()],
            ..ProviderDecl::default()
        };
        let providers = extract_provider(&pkg, &decl).unwrap();
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].name, "Config.Port");
        assert_eq!(providers[0].inputs, vec![TypeRef::from("Config")]);
        assert_eq!(providers[0].output, TypeRef::from("int"));
        assert_eq!(providers[1].kind, ProviderKind::StructField);
    }

    #[test]
    fn test_struct_provider_inputs_follow_selected_fields() {
        let pkg = config_pkg();
        let decl = ProviderDecl {
            name: "NewConfig".to_string(),
            kind: DeclKind::Struct,
            struct_type: Some("Config".into()),
            fields: vec!["Host".to_string()],
            ..ProviderDecl::default()
        };
        let providers = extract_provider(&pkg, &decl).unwrap();
        assert_eq!(providers[0].inputs, vec![TypeRef::from("string")]);
        assert_eq!(providers[0].fields, vec!["Host".to_string()]);
    }

    #[test]
    fn test_unknown_field_is_invalid() {
        let pkg = config_pkg();
        let decl = ProviderDecl {
            name: "NewConfig".to_string(),
            kind: DeclKind::Struct,
            struct_type: Some("Config".into()),
            fields: vec!["Missing".to_string()],
            ..ProviderDecl::default()
        };
        let err = extract_provider(&pkg, &decl).unwrap_err();
        assert!(err.to_string().contains("has no field Missing"));
    }

    #[test]
    fn test_bind_rejects_non_interface() {
        let pkg = config_pkg();
        let decl = ProviderDecl {
            name: "BindConfig".to_string(),
            kind: DeclKind::Bind,
            interface: Some("Config".into()),
            concrete: Some("*MyConfig".into()),
            ..ProviderDecl::default()
        };
        assert!(extract_provider(&pkg, &decl).is_err());

        let decl = ProviderDecl {
            interface: Some("Fooer".into()),
            ..decl
        };
        let providers = extract_provider(&pkg, &decl).unwrap();
        assert_eq!(providers[0].kind, ProviderKind::InterfaceBinding);
        assert_eq!(providers[0].inputs, vec![TypeRef::from("*MyConfig")]);
    }

    #[test]
    fn test_extract_set_resolves_items_in_order() {
        let mut pkg = config_pkg();
        pkg.providers.push(ProviderDecl {
            name: "NewFoo".to_string(),
            output: Some("Foo".into()),
            ..ProviderDecl::default()
        });
        pkg.sets.push(SetDecl {
            name: "Set".to_string(),
            providers: vec!["NewFoo".to_string()],
            sets: vec!["example.com/other.OtherSet".to_string()],
        });

        let set = extract_set(&pkg, "Set", "test").unwrap();
        assert_eq!(set.items.len(), 2);
        assert_eq!(set.references().next(), Some(&SetId::new("example.com/other", "OtherSet")));
    }

    #[test]
    fn test_extract_missing_set_and_provider() {
        let mut pkg = config_pkg();
        assert!(matches!(
            extract_set(&pkg, "Nope", "example.com/app.Init"),
            Err(WireError::UnknownSet { .. })
        ));

        pkg.sets.push(SetDecl {
            name: "Set".to_string(),
            providers: vec!["Missing".to_string()],
            sets: Vec::new(),
        });
        assert!(matches!(extract_set(&pkg, "Set", "x"), Err(WireError::UnknownProvider { .. })));
    }
}
