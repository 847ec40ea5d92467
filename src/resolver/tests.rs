//! Tests for the resolver module.

use super::*;
use crate::model::{ProviderSet, SetId, SetItem};

fn ranked(providers: Vec<Provider>) -> Vec<RankedProvider> {
    providers
        .into_iter()
        .enumerate()
        .map(|(order, provider)| RankedProvider {
            provider: Arc::new(provider),
            rank: Precedence {
                depth: 0,
                root_index: 0,
                order,
            },
        })
        .collect()
}

fn func(name: &str, inputs: &[&str], output: &str) -> Provider {
    Provider::function(
        "example.com/app",
        name,
        inputs.iter().map(|&t| TypeRef::from(t)).collect(),
        output,
    )
}

fn types(names: &[&str]) -> Vec<TypeRef> {
    names.iter().map(|&t| TypeRef::from(t)).collect()
}

#[test]
fn test_resolve_chain_in_dependency_order() {
    let candidates = ranked(vec![func("B", &["int"], "string"), func("A", &[], "int")]);
    let plan = Resolver::default().resolve(&candidates, &[], &types(&["string"])).unwrap();

    assert_eq!(plan.step_names(), vec!["A", "B"]);
    assert!(plan.inputs.is_empty());
    assert_eq!(plan.outputs, types(&["string"]));
}

#[test]
fn test_input_overrides_provider() {
    let candidates = ranked(vec![func("A", &[], "int"), func("B", &["int"], "string")]);
    let plan = Resolver::default().resolve(&candidates, &types(&["int"]), &types(&["string"])).unwrap();

    assert_eq!(plan.step_names(), vec!["B"]);
    assert_eq!(
        plan.binding_for(&"int".into()).map(|b| &b.source),
        Some(&BindingSource::Input {
            index: 0
        })
    );
}

#[test]
fn test_cycle_reports_full_chain() {
    let candidates = ranked(vec![func("NewA", &["B"], "A"), func("NewB", &["A"], "B")]);
    let errors = Resolver::default().resolve(&candidates, &[], &types(&["A"])).unwrap_err();

    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0],
        WireError::Cycle {
            chain: types(&["A", "B", "A"])
        }
    );
    assert_eq!(errors[0].to_string(), "cycle for A: A -> B -> A");
}

#[test]
fn test_no_provider_names_requirer_and_suggestions() {
    let candidates = ranked(vec![func("NewFoo", &["*Bar"], "*Foo"), func("NewBaz", &[], "*Baz")]);
    let errors = Resolver::default().resolve(&candidates, &[], &types(&["*Foo"])).unwrap_err();

    match &errors[0] {
        WireError::NoProvider {
            type_ref,
            needed_by,
            suggestions,
        } => {
            assert_eq!(type_ref.as_str(), "*Bar");
            assert_eq!(needed_by.as_deref(), Some("example.com/app.NewFoo"));
            assert_eq!(suggestions, &types(&["*Baz"]));
        }
        other => panic!("expected NoProvider, got {other:?}"),
    }
}

#[test]
fn test_errors_collected_across_branches() {
    let candidates = ranked(vec![func("NewApp", &["Missing1", "Missing2"], "App")]);
    let errors = Resolver::default().resolve(&candidates, &[], &types(&["App", "Other"])).unwrap_err();

    let missing: Vec<_> = errors
        .iter()
        .filter_map(|e| match e {
            WireError::NoProvider {
                type_ref,
                ..
            } => Some(type_ref.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(missing, vec!["Missing1", "Missing2", "Other"]);
}

#[test]
fn test_shared_dependency_bound_once() {
    let candidates = ranked(vec![
        func("NewConfig", &[], "Config"),
        func("NewDB", &["Config"], "DB"),
        func("NewCache", &["Config"], "Cache"),
        func("NewApp", &["DB", "Cache"], "App"),
    ]);
    let plan = Resolver::default().resolve(&candidates, &[], &types(&["App"])).unwrap();
    assert_eq!(plan.step_names(), vec!["NewConfig", "NewDB", "NewCache", "NewApp"]);
}

#[test]
fn test_strict_policy_reports_duplicates() {
    let candidates = ranked(vec![func("NewFoo", &[], "Foo"), func("OtherFoo", &[], "Foo")]);
    let errors = Resolver::new(DuplicatePolicy::Strict).resolve(&candidates, &[], &types(&["Foo"])).unwrap_err();

    assert_eq!(
        errors,
        vec![WireError::DuplicateProvider {
            type_ref: "Foo".into(),
            providers: vec!["example.com/app.NewFoo".to_string(), "example.com/app.OtherFoo".to_string()],
        }]
    );
}

#[test]
fn test_first_match_policy_takes_highest_precedence() {
    let candidates = ranked(vec![func("NewFoo", &[], "Foo"), func("OtherFoo", &[], "Foo")]);
    let plan =
        Resolver::new(DuplicatePolicy::FirstMatch).resolve(&candidates, &[], &types(&["Foo"])).unwrap();
    assert_eq!(plan.step_names(), vec!["NewFoo"]);
}

#[test]
fn test_identical_providers_are_deduplicated() {
    let candidates = ranked(vec![func("NewFoo", &[], "Foo"), func("NewFoo", &[], "Foo")]);
    let plan = Resolver::default().resolve(&candidates, &[], &types(&["Foo"])).unwrap();
    assert_eq!(plan.step_names(), vec!["NewFoo"]);
}

#[test]
fn test_duplicate_input_is_error() {
    let errors = Resolver::default().resolve(&[], &types(&["int", "int"]), &types(&["int"])).unwrap_err();
    assert!(matches!(errors[0], WireError::DuplicateInput { .. }));
}

#[test]
fn test_resolution_is_deterministic() {
    let candidates = ranked(vec![
        func("NewA", &[], "A"),
        func("NewB", &["A"], "B"),
        func("NewC", &["A", "B"], "C"),
        func("NewD", &["C", "B"], "D"),
    ]);
    let first = Resolver::default().resolve(&candidates, &[], &types(&["D", "C"])).unwrap();
    for _ in 0..20 {
        assert_eq!(Resolver::default().resolve(&candidates, &[], &types(&["D", "C"])).unwrap(), first);
    }
}

#[test]
fn test_resolve_request_through_sets() {
    let shared = Provider::function("example.com/app", "NewConfig", Vec::new(), "Config");
    let graph = SetGraph::from_sets([
        Arc::new(
            ProviderSet::new(SetId::new("example.com/app", "Base"))
                .with_provider(shared.clone())
                .with_provider(func("NewDB", &["Config"], "DB")),
        ),
        Arc::new(
            ProviderSet::new(SetId::new("example.com/app", "Extra"))
                .with_provider(shared)
                .with_reference(SetId::new("example.com/app", "Base")),
        ),
    ]);

    let mut request = InjectorRequest::new("example.com/app", "InitDB");
    request.outputs = types(&["DB"]);
    request.items = vec![
        SetItem::Reference(SetId::new("example.com/app", "Extra")),
        SetItem::Reference(SetId::new("example.com/app", "Base")),
    ];

    let plan = Resolver::default().resolve_request(&request, &graph).unwrap();
    assert_eq!(plan.step_names(), vec!["NewConfig", "NewDB"]);
}

#[test]
fn test_resolve_request_set_cycle() {
    let graph = SetGraph::from_sets([
        Arc::new(ProviderSet::new(SetId::new("p", "A")).with_reference(SetId::new("p", "B"))),
        Arc::new(ProviderSet::new(SetId::new("p", "B")).with_reference(SetId::new("p", "A"))),
    ]);
    let mut request = InjectorRequest::new("p", "Init");
    request.items = vec![SetItem::Reference(SetId::new("p", "A"))];

    let errors = Resolver::default().resolve_request(&request, &graph).unwrap_err();
    assert!(matches!(errors[0], WireError::SetReferenceCycle { .. }));
}
