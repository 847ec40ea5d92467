//! Tera-based Rust emitter.
//!
//! Most decisions (local names, clones, call syntax) are made here in Rust;
//! the templates only lay the pieces out.
//!
//! # Naming
//!
//! Locals are named after the type they hold in snake case (`*DBConn` →
//! `db_conn`, `example.com/app/db.Pool` → `pool`). A name already taken gets a
//! numeric suffix (`config2`). Function providers are called by their snake
//! case name, qualified with the last segment of their package path when they
//! live in another package.
//!
//! # Ownership
//!
//! Arguments are passed by value. A local that is still needed by a later
//! step is passed as `local.clone()`; its last use moves it.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tera::{Context as TeraContext, Tera};

use super::{RenderError, RenderedInjector, Renderer};
use crate::constants::GENERATED_BANNER;
use crate::generate::GenerateOptions;
use crate::model::{
    Binding, BindingSource, ConstructionPlan, InjectorDecl, PackageDescriptor, Provider,
    ProviderKind, TypeRef,
};

const INJECTOR_TEMPLATE: &str = r"/// Generated from injector `{{ name }}`.
pub fn {{ fn_name }}({{ params | join(sep=', ') }}) -> {{ return_type }} {
{%- if cleanup %}
    let mut cleanups: Vec<Box<dyn FnOnce()>> = Vec::new();
{%- endif %}
{%- for step in steps %}
{{ step }}
{%- endfor %}
    {{ result }}
}";

const FILE_TEMPLATE: &str = r"{{ preamble }}//! Injectors for `{{ pkg_path }}`.
{% for injector in injectors %}
{{ injector }}
{% endfor %}";

const ERROR_TYPE: &str = "Box<dyn std::error::Error + Send + Sync>";

const RESERVED: &[&str] = &[
    "as", "async", "await", "box", "break", "cleanup", "cleanups", "const", "continue", "crate",
    "dyn", "else", "enum", "err", "extern", "false", "fn", "for", "if", "impl", "in", "let",
    "loop", "match", "mod", "move", "mut", "pub", "ref", "return", "self", "static", "struct",
    "super", "trait", "true", "type", "unsafe", "use", "value", "where", "while", "yield",
];

/// Convert `NewHTTPServer` or `db-pool` to `new_http_server` / `db_pool`.
pub fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_alphanumeric() {
            if c.is_ascii_uppercase() && i > 0 {
                let prev = chars[i - 1];
                let next_lower = chars.get(i + 1).is_some_and(char::is_ascii_lowercase);
                if prev.is_ascii_lowercase()
                    || prev.is_ascii_digit()
                    || (prev.is_ascii_uppercase() && next_lower)
                {
                    out.push('_');
                }
            }
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    let out = out.trim_end_matches('_').to_string();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        format!("v_{out}")
    } else {
        out
    }
}

/// The bare name of a type: `*example.com/app/db.Pool` → `Pool`.
fn bare_type_name(type_ref: &TypeRef) -> &str {
    let name = type_ref.as_str().trim_start_matches(['*', '&']);
    let name = name.rsplit('/').next().unwrap_or(name);
    name.rsplit_once('.').map_or(name, |(_, n)| n)
}

/// Render a type reference as Rust.
pub fn rust_type(type_ref: &TypeRef) -> String {
    let name = type_ref.as_str().trim_start_matches('*');
    match name {
        "int" | "int64" => return "i64".to_string(),
        "int32" => return "i32".to_string(),
        "uint" | "uint64" => return "u64".to_string(),
        "float64" => return "f64".to_string(),
        "string" => return "String".to_string(),
        "bool" => return "bool".to_string(),
        _ => {}
    }
    match name.rsplit_once('.') {
        Some((pkg, ty)) if !pkg.is_empty() && !ty.is_empty() => {
            format!("{}::{}", snake_case(pkg.rsplit('/').next().unwrap_or(pkg)), ty)
        }
        _ => name.to_string(),
    }
}

/// Hands out collision-free local names.
#[derive(Debug, Default)]
struct Names {
    taken: HashSet<String>,
}

impl Names {
    fn reserve(&mut self, name: String) {
        self.taken.insert(name);
    }

    fn fresh(&mut self, type_ref: &TypeRef) -> String {
        let mut base = snake_case(bare_type_name(type_ref));
        if RESERVED.contains(&base.as_str()) {
            base.push('_');
        }
        let mut candidate = base.clone();
        let mut suffix = 2;
        while self.taken.contains(&candidate) {
            candidate = format!("{base}{suffix}");
            suffix += 1;
        }
        self.taken.insert(candidate.clone());
        candidate
    }
}

#[derive(Serialize)]
struct InjectorView<'a> {
    name: &'a str,
    fn_name: String,
    params: Vec<String>,
    return_type: String,
    cleanup: bool,
    steps: Vec<String>,
    result: String,
}

#[derive(Serialize)]
struct FileView<'a> {
    preamble: String,
    pkg_path: &'a str,
    injectors: Vec<&'a str>,
}

/// Tracks remaining uses so the last use of a local moves it.
struct Locals {
    names: HashMap<TypeRef, String>,
    remaining: HashMap<TypeRef, usize>,
}

impl Locals {
    fn name(&self, type_ref: &TypeRef) -> &str {
        self.names.get(type_ref).map_or("_", String::as_str)
    }

    fn take(&mut self, type_ref: &TypeRef) -> String {
        let remaining = self.remaining.entry(type_ref.clone()).or_insert(1);
        *remaining = remaining.saturating_sub(1);
        let name = self.name(type_ref).to_string();
        if self.remaining.get(type_ref).copied().unwrap_or(0) > 0 {
            format!("{name}.clone()")
        } else {
            name
        }
    }

    fn borrow(&mut self, type_ref: &TypeRef) -> String {
        if let Some(remaining) = self.remaining.get_mut(type_ref) {
            *remaining = remaining.saturating_sub(1);
        }
        self.name(type_ref).to_string()
    }
}

/// Renders injectors with Tera templates.
pub struct TemplateRenderer {
    tera: Tera,
}

impl std::fmt::Debug for TemplateRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRenderer").finish_non_exhaustive()
    }
}

impl TemplateRenderer {
    /// Create a renderer with the built-in templates.
    pub fn new() -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.autoescape_on(Vec::new());
        tera.add_raw_templates(vec![("injector.rs", INJECTOR_TEMPLATE), ("file.rs", FILE_TEMPLATE)])?;
        Ok(Self {
            tera,
        })
    }

    fn call_expr(&self, pkg: &PackageDescriptor, provider: &Provider, locals: &mut Locals) -> String {
        match provider.kind {
            ProviderKind::Value => provider.expr.clone().unwrap_or_default(),
            ProviderKind::StructField => {
                let field = provider.fields.first().map_or_else(String::new, |f| snake_case(f));
                let owner = provider.inputs.first().map(|t| locals.borrow(t)).unwrap_or_default();
                format!("{owner}.{field}.clone()")
            }
            ProviderKind::Struct => {
                let fields: Vec<String> = provider
                    .fields
                    .iter()
                    .zip(&provider.inputs)
                    .map(|(field, input)| format!("{}: {}", snake_case(field), locals.take(input)))
                    .collect();
                format!("{} {{ {} }}", rust_type(&provider.output), fields.join(", "))
            }
            ProviderKind::InterfaceBinding => {
                let concrete = provider.inputs.first().map(|t| locals.take(t)).unwrap_or_default();
                format!("{concrete}.into()")
            }
            ProviderKind::Function | ProviderKind::SetReference => {
                let args: Vec<String> = provider.inputs.iter().map(|t| locals.take(t)).collect();
                let path = if provider.pkg_path == pkg.path {
                    String::new()
                } else {
                    let segment = provider.pkg_path.rsplit('/').next().unwrap_or(&provider.pkg_path);
                    format!("{}::", snake_case(segment))
                };
                format!("{path}{}({})", snake_case(&provider.name), args.join(", "))
            }
        }
    }

    fn step_code(
        &self,
        pkg: &PackageDescriptor,
        binding: &Binding,
        provider: &Provider,
        locals: &mut Locals,
        cleanups_pending: bool,
    ) -> String {
        let name = locals.name(&binding.type_ref).to_string();
        let call = self.call_expr(pkg, provider, locals);
        let pattern = if provider.has_cleanup {
            format!("({name}, cleanup)")
        } else {
            name
        };
        let annotation = if provider.kind == ProviderKind::InterfaceBinding {
            format!(": {}", rust_type(&binding.type_ref))
        } else {
            String::new()
        };

        let mut code = if provider.returns_error && cleanups_pending {
            format!(
                "    let {pattern}{annotation} = match {call} {{\n        Ok(value) => value,\n        Err(err) => {{\n            cleanups.into_iter().rev().for_each(|cleanup| cleanup());\n            return Err(err.into());\n        }}\n    }};"
            )
        } else if provider.returns_error {
            format!("    let {pattern}{annotation} = {call}?;")
        } else {
            format!("    let {pattern}{annotation} = {call};")
        };
        if provider.has_cleanup {
            code.push_str("\n    cleanups.push(Box::new(cleanup));");
        }
        code
    }
}

impl Renderer for TemplateRenderer {
    fn render_injector(
        &self,
        pkg: &PackageDescriptor,
        injector: &InjectorDecl,
        plan: &ConstructionPlan,
    ) -> Result<RenderedInjector, RenderError> {
        let fn_name = snake_case(&injector.name);
        if let Some(provider) = pkg
            .providers
            .iter()
            .find(|p| p.name == injector.name || snake_case(&p.name) == fn_name)
        {
            return Err(RenderError::NameCollision {
                pkg_path: pkg.path.clone(),
                injector: injector.name.clone(),
                provider: provider.name.clone(),
            });
        }

        for provider in plan.steps.iter().filter_map(Binding::provider) {
            if provider.returns_error && !injector.returns_error {
                return Err(RenderError::UnhandledError {
                    injector: injector.name.clone(),
                    provider: provider.qualified_name(),
                });
            }
            if provider.has_cleanup && !injector.cleanup {
                return Err(RenderError::UnhandledCleanup {
                    injector: injector.name.clone(),
                    provider: provider.qualified_name(),
                });
            }
        }

        let mut names = Names::default();
        names.reserve(fn_name.clone());
        for provider in plan.steps.iter().filter_map(Binding::provider) {
            if provider.kind == ProviderKind::Function {
                names.reserve(snake_case(&provider.name));
            }
        }

        let mut locals = Locals {
            names: HashMap::new(),
            remaining: HashMap::new(),
        };
        for binding in plan.inputs.iter().chain(&plan.steps) {
            locals.names.insert(binding.type_ref.clone(), names.fresh(&binding.type_ref));
        }
        for input in plan.steps.iter().filter_map(Binding::provider).flat_map(|p| &p.inputs) {
            *locals.remaining.entry(input.clone()).or_default() += 1;
        }
        for output in &plan.outputs {
            *locals.remaining.entry(output.clone()).or_default() += 1;
        }

        let params = plan
            .inputs
            .iter()
            .map(|b| format!("{}: {}", locals.name(&b.type_ref), rust_type(&b.type_ref)))
            .collect();

        let mut steps = Vec::with_capacity(plan.steps.len());
        let mut cleanups_pending = false;
        for binding in &plan.steps {
            if let BindingSource::Provider(provider) = &binding.source {
                steps.push(self.step_code(pkg, binding, provider, &mut locals, cleanups_pending));
                cleanups_pending |= provider.has_cleanup;
            }
        }

        let values: Vec<String> = plan.outputs.iter().map(|t| locals.take(t)).collect();
        let types: Vec<String> = plan.outputs.iter().map(rust_type).collect();
        let (mut value, mut return_type) = match (values.as_slice(), types.as_slice()) {
            ([value], [ty]) => (value.clone(), ty.clone()),
            _ => (format!("({})", values.join(", ")), format!("({})", types.join(", "))),
        };
        if injector.cleanup {
            value = format!(
                "({value}, move || cleanups.into_iter().rev().for_each(|cleanup| cleanup()))"
            );
            return_type = format!("({return_type}, impl FnOnce())");
        }
        if injector.returns_error {
            value = format!("Ok({value})");
            return_type = format!("Result<{return_type}, {ERROR_TYPE}>");
        }

        let view = InjectorView {
            name: &injector.name,
            fn_name,
            params,
            return_type,
            cleanup: injector.cleanup,
            steps,
            result: value,
        };
        let code = self.tera.render("injector.rs", &TeraContext::from_serialize(&view)?)?;

        tracing::trace!(target: "wiregen::render", "rendered {}.{}", pkg.path, injector.name);
        Ok(RenderedInjector {
            name: injector.name.clone(),
            code,
        })
    }

    fn render_file(
        &self,
        pkg: &PackageDescriptor,
        injectors: &[RenderedInjector],
        options: &GenerateOptions,
    ) -> Result<String, RenderError> {
        let mut preamble = String::new();
        if let Some(header) = options.header.as_deref().filter(|h| !h.trim().is_empty()) {
            preamble.push_str(header.trim_end());
            preamble.push('\n');
        }
        if options.emit_generated_header {
            preamble.push_str(GENERATED_BANNER);
            preamble.push_str("\n\n");
        }

        let view = FileView {
            preamble,
            pkg_path: &pkg.path,
            injectors: injectors.iter().map(|i| i.code.as_str()).collect(),
        };
        let rendered = self.tera.render("file.rs", &TeraContext::from_serialize(&view)?)?;
        Ok(format!("{}\n", rendered.trim_end()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProviderDecl;
    use std::sync::Arc;

    fn plan(inputs: &[&str], steps: Vec<Provider>, outputs: &[&str]) -> ConstructionPlan {
        ConstructionPlan {
            inputs: inputs
                .iter()
                .enumerate()
                .map(|(index, t)| Binding {
                    type_ref: TypeRef::from(*t),
                    source: BindingSource::Input {
                        index,
                    },
                })
                .collect(),
            steps: steps
                .into_iter()
                .map(|p| Binding {
                    type_ref: p.output.clone(),
                    source: BindingSource::Provider(Arc::new(p)),
                })
                .collect(),
            outputs: outputs.iter().map(|&t| TypeRef::from(t)).collect(),
        }
    }

    fn injector(name: &str) -> InjectorDecl {
        InjectorDecl {
            name: name.to_string(),
            ..InjectorDecl::default()
        }
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("NewHTTPServer"), "new_http_server");
        assert_eq!(snake_case("NewDB"), "new_db");
        assert_eq!(snake_case("Config"), "config");
        assert_eq!(snake_case("db-pool"), "db_pool");
        assert_eq!(snake_case("OAuth2Token"), "o_auth2_token");
    }

    #[test]
    fn test_rust_type() {
        assert_eq!(rust_type(&"int".into()), "i64");
        assert_eq!(rust_type(&"*Foo".into()), "Foo");
        assert_eq!(rust_type(&"example.com/app/db.Pool".into()), "db::Pool");
        assert_eq!(rust_type(&"config.Settings".into()), "config::Settings");
    }

    #[test]
    fn test_render_simple_chain() {
        let pkg = PackageDescriptor::new("example.com/app");
        let plan = plan(
            &[],
            vec![
                Provider::function("example.com/app", "A", Vec::new(), "int"),
                Provider::function("example.com/app", "B", vec!["int".into()], "string"),
            ],
            &["string"],
        );
        let renderer = TemplateRenderer::new().unwrap();
        let rendered = renderer.render_injector(&pkg, &injector("InitString"), &plan).unwrap();

        assert_eq!(
            rendered.code,
            "/// Generated from injector `InitString`.\n\
             pub fn init_string() -> String {\n    \
             let int = a();\n    \
             let string = b(int);\n    \
             string\n\
             }"
        );
    }

    #[test]
    fn test_render_clones_shared_locals_and_uses_question_mark() {
        let pkg = PackageDescriptor::new("example.com/app");
        let plan = plan(
            &["Config"],
            vec![
                Provider::function("example.com/app/db", "NewDB", vec!["Config".into()], "*DB").with_error(),
                Provider::function("example.com/app", "NewApp", vec!["Config".into(), "*DB".into()], "*App"),
            ],
            &["*App"],
        );
        let mut decl = injector("InitApp");
        decl.returns_error = true;
        let code = TemplateRenderer::new().unwrap().render_injector(&pkg, &decl, &plan).unwrap().code;

        assert!(code.contains("pub fn init_app(config: Config) -> Result<App, Box<dyn std::error::Error + Send + Sync>>"));
        assert!(code.contains("let db = db::new_db(config.clone())?;"));
        assert!(code.contains("let app = new_app(config, db);"));
        assert!(code.contains("Ok(app)"));
    }

    #[test]
    fn test_render_cleanup_unwinds_on_error() {
        let pkg = PackageDescriptor::new("example.com/app");
        let plan = plan(
            &[],
            vec![
                Provider::function("example.com/app", "OpenFile", Vec::new(), "*File").with_cleanup(),
                Provider::function("example.com/app", "NewReader", vec!["*File".into()], "*Reader").with_error(),
            ],
            &["*Reader"],
        );
        let mut decl = injector("InitReader");
        decl.returns_error = true;
        decl.cleanup = true;
        let code = TemplateRenderer::new().unwrap().render_injector(&pkg, &decl, &plan).unwrap().code;

        assert!(code.contains("let mut cleanups: Vec<Box<dyn FnOnce()>> = Vec::new();"));
        assert!(code.contains("let (file, cleanup) = open_file();"));
        assert!(code.contains("cleanups.push(Box::new(cleanup));"));
        assert!(code.contains("let reader = match new_reader(file) {"));
        assert!(code.contains("-> Result<(Reader, impl FnOnce()), "));
    }

    #[test]
    fn test_fallible_step_requires_error_return() {
        let pkg = PackageDescriptor::new("p");
        let plan = plan(&[], vec![Provider::function("p", "NewFoo", Vec::new(), "Foo").with_error()], &["Foo"]);
        let err = TemplateRenderer::new().unwrap().render_injector(&pkg, &injector("InitFoo"), &plan).unwrap_err();
        assert!(matches!(err, RenderError::UnhandledError { .. }));
    }

    #[test]
    fn test_name_collision() {
        let mut pkg = PackageDescriptor::new("example.com/app");
        pkg.providers.push(ProviderDecl {
            name: "InitFoo".to_string(),
            output: Some("Foo".into()),
            ..ProviderDecl::default()
        });
        let plan = plan(&[], Vec::new(), &[]);
        let err = TemplateRenderer::new().unwrap().render_injector(&pkg, &injector("InitFoo"), &plan).unwrap_err();
        assert!(matches!(err, RenderError::NameCollision { .. }));
    }

    #[test]
    fn test_locals_get_numeric_suffix() {
        let pkg = PackageDescriptor::new("p");
        let plan = plan(
            &[],
            vec![
                Provider::function("p", "NewA", Vec::new(), "a.Config"),
                Provider::function("p", "NewB", vec!["a.Config".into()], "b.Config"),
            ],
            &["b.Config"],
        );
        let code = TemplateRenderer::new().unwrap().render_injector(&pkg, &injector("Init"), &plan).unwrap().code;
        assert!(code.contains("let config = new_a();"));
        assert!(code.contains("let config2 = new_b(config);"));
    }

    #[test]
    fn test_render_file_with_header_and_banner() {
        let pkg = PackageDescriptor::new("example.com/app");
        let options = GenerateOptions {
            header: Some("// Copyright Example".to_string()),
            ..GenerateOptions::default()
        };
        let injectors = vec![
            RenderedInjector {
                name: "A".to_string(),
                code: "pub fn a() {}".to_string(),
            },
            RenderedInjector {
                name: "B".to_string(),
                code: "pub fn b() {}".to_string(),
            },
        ];
        let file = TemplateRenderer::new().unwrap().render_file(&pkg, &injectors, &options).unwrap();

        assert!(file.starts_with("// Copyright Example\n// Code generated by wiregen. DO NOT EDIT.\n\n"));
        assert!(file.contains("//! Injectors for `example.com/app`."));
        assert!(file.contains("pub fn a() {}\n\npub fn b() {}\n"));
        assert!(file.ends_with("}\n"));
    }
}
