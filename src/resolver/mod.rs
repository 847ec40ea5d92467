//! Demand-driven dependency resolution.
//!
//! The resolver turns an injector's candidate providers, its input types and
//! its requested outputs into a [`ConstructionPlan`].
//!
//! # Algorithm
//!
//! Starting from each requested output, in order:
//!
//! 1. A type already bound (an input, or a provider bound earlier) is reused.
//! 2. A type already on the in-progress chain is a [`WireError::Cycle`]; the
//!    error carries the chain from the first occurrence, e.g. `A -> B -> A`.
//! 3. Otherwise the candidates for the type are consulted: none is
//!    [`WireError::NoProvider`] with close-match suggestions, more than one
//!    distinct provider is resolved by the [`DuplicatePolicy`].
//! 4. Each input of the chosen provider is bound recursively; once all are
//!    bound the provider becomes the next step of the plan.
//!
//! Every type is resolved at most once, so each provider runs at most once per
//! injector. A failure only poisons the types that depend on it: independent
//! branches keep resolving and all errors are returned together.
//!
//! # Precedence
//!
//! Injector inputs always win over providers of the same type. Identical
//! providers reached through several sets count once. For distinct providers
//! the candidates arrive ordered by [`Precedence`] (see
//! [`SetGraph::flatten`]); [`DuplicatePolicy::FirstMatch`] takes the first,
//! [`DuplicatePolicy::Strict`] reports a conflict.
//!
//! # Determinism
//!
//! Candidate order, input order and output order fully determine the plan.
//! No hash map iteration order leaks into the result.

pub mod set_graph;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use strsim::levenshtein;

use crate::constants::{MAX_TYPE_SUGGESTIONS, TYPE_SUGGESTION_DISTANCE};
use crate::core::WireError;
use crate::model::{Binding, BindingSource, ConstructionPlan, InjectorRequest, Provider, TypeRef};

pub use set_graph::{Precedence, RankedProvider, SetGraph};

/// How to treat distinct providers for one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Report [`WireError::DuplicateProvider`]
    #[default]
    Strict,
    /// Take the highest-precedence provider
    FirstMatch,
}

/// Candidate providers grouped by output type, in precedence order.
#[derive(Debug, Default)]
struct ProviderIndex {
    by_type: HashMap<TypeRef, Vec<Arc<Provider>>>,
}

impl ProviderIndex {
    fn build(candidates: &[RankedProvider]) -> Self {
        let mut by_type: HashMap<TypeRef, Vec<Arc<Provider>>> = HashMap::new();
        for candidate in candidates {
            let providers = by_type.entry(candidate.provider.output.clone()).or_default();
            if !providers.iter().any(|p| **p == *candidate.provider) {
                providers.push(Arc::clone(&candidate.provider));
            }
        }
        Self {
            by_type,
        }
    }

    fn get(&self, type_ref: &TypeRef) -> &[Arc<Provider>] {
        self.by_type.get(type_ref).map_or(&[], Vec::as_slice)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindState {
    Bound,
    Failed,
}

struct Resolution<'a> {
    policy: DuplicatePolicy,
    index: &'a ProviderIndex,
    inputs: &'a [TypeRef],
    state: HashMap<TypeRef, BindState>,
    chain: Vec<TypeRef>,
    steps: Vec<Binding>,
    errors: Vec<WireError>,
}

impl Resolution<'_> {
    fn bind(&mut self, type_ref: &TypeRef, needed_by: Option<&Provider>) -> bool {
        if let Some(state) = self.state.get(type_ref) {
            return *state == BindState::Bound;
        }

        if let Some(start) = self.chain.iter().position(|t| t == type_ref) {
            let mut chain = self.chain[start..].to_vec();
            chain.push(type_ref.clone());
            self.errors.push(WireError::Cycle {
                chain,
            });
            return false;
        }

        let index = self.index;
        let candidates = index.get(type_ref);
        let chosen = match candidates {
            [] => {
                self.errors.push(WireError::NoProvider {
                    type_ref: type_ref.clone(),
                    needed_by: needed_by.map(Provider::qualified_name),
                    suggestions: self.suggestions(type_ref),
                });
                self.state.insert(type_ref.clone(), BindState::Failed);
                return false;
            }
            [only] => Arc::clone(only),
            [first, ..] => match self.policy {
                DuplicatePolicy::FirstMatch => {
                    tracing::debug!(
                        target: "wiregen::resolver",
                        "{} has {} providers, using {}",
                        type_ref,
                        candidates.len(),
                        first.qualified_name()
                    );
                    Arc::clone(first)
                }
                DuplicatePolicy::Strict => {
                    self.errors.push(WireError::DuplicateProvider {
                        type_ref: type_ref.clone(),
                        providers: candidates.iter().map(|p| p.qualified_name()).collect(),
                    });
                    self.state.insert(type_ref.clone(), BindState::Failed);
                    return false;
                }
            },
        };

        self.chain.push(type_ref.clone());
        let mut ok = true;
        for input in &chosen.inputs {
            // Keep going after a failure so sibling branches report too.
            ok &= self.bind(input, Some(chosen.as_ref()));
        }
        self.chain.pop();

        if ok {
            self.steps.push(Binding {
                type_ref: type_ref.clone(),
                source: BindingSource::Provider(chosen),
            });
            self.state.insert(type_ref.clone(), BindState::Bound);
        } else {
            self.state.insert(type_ref.clone(), BindState::Failed);
        }
        ok
    }

    /// Provided or input types within edit distance of `missing`.
    fn suggestions(&self, missing: &TypeRef) -> Vec<TypeRef> {
        let mut close: Vec<(usize, &TypeRef)> = self
            .index
            .by_type
            .keys()
            .chain(self.inputs.iter())
            .filter(|t| *t != missing)
            .map(|t| (levenshtein(missing.as_str(), t.as_str()), t))
            .filter(|(distance, _)| *distance <= TYPE_SUGGESTION_DISTANCE)
            .collect();
        close.sort();
        close.dedup_by(|a, b| a.1 == b.1);
        close.into_iter().take(MAX_TYPE_SUGGESTIONS).map(|(_, t)| t.clone()).collect()
    }
}

/// Resolves injector requests into construction plans.
#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver {
    policy: DuplicatePolicy,
}

impl Resolver {
    /// Create a resolver with the given duplicate policy.
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            policy,
        }
    }

    /// Resolve `outputs` from ranked `candidates` and the injector's `inputs`.
    ///
    /// Returns every error found, in discovery order.
    pub fn resolve(
        &self,
        candidates: &[RankedProvider],
        inputs: &[TypeRef],
        outputs: &[TypeRef],
    ) -> Result<ConstructionPlan, Vec<WireError>> {
        let index = ProviderIndex::build(candidates);
        let mut resolution = Resolution {
            policy: self.policy,
            index: &index,
            inputs,
            state: HashMap::new(),
            chain: Vec::new(),
            steps: Vec::new(),
            errors: Vec::new(),
        };

        let mut input_bindings = Vec::with_capacity(inputs.len());
        for (position, input) in inputs.iter().enumerate() {
            if resolution.state.insert(input.clone(), BindState::Bound).is_some() {
                resolution.errors.push(WireError::DuplicateInput {
                    type_ref: input.clone(),
                });
                continue;
            }
            input_bindings.push(Binding {
                type_ref: input.clone(),
                source: BindingSource::Input {
                    index: position,
                },
            });
        }

        for output in outputs {
            resolution.bind(output, None);
        }

        if resolution.errors.is_empty() {
            Ok(ConstructionPlan {
                inputs: input_bindings,
                steps: resolution.steps,
                outputs: outputs.to_vec(),
            })
        } else {
            Err(resolution.errors)
        }
    }

    /// Flatten `request`'s items through `graph` and resolve it.
    pub fn resolve_request(
        &self,
        request: &InjectorRequest,
        graph: &SetGraph,
    ) -> Result<ConstructionPlan, Vec<WireError>> {
        let candidates =
            graph.flatten(&request.items, &request.qualified_name()).map_err(|e| vec![e])?;
        tracing::trace!(
            target: "wiregen::resolver",
            "{}: {} candidate providers",
            request.qualified_name(),
            candidates.len()
        );
        self.resolve(&candidates, &request.inputs, &request.outputs)
    }
}
