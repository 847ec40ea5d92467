//! One generation unit: a single injector taken from declaration to code.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::cache::{ObjectCache, ProviderSetCache};
use crate::core::WireError;
use crate::model::extract::{extract_set, injector_request};
use crate::model::{ConstructionPlan, InjectorDecl, PackageDescriptor, ProviderSet, SetId, SetItem};
use crate::render::Renderer;
use crate::resolver::{Resolver, SetGraph};

/// Result of a successful unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectorOutput {
    /// Injector name
    pub name: String,
    /// Resolved plan
    pub plan: ConstructionPlan,
    /// Emitted function source
    pub code: String,
}

/// State shared by all units of a run.
pub(crate) struct UnitContext {
    pub objects: Arc<ObjectCache>,
    /// `None` re-extracts every set for every unit
    pub sets: Option<Arc<ProviderSetCache>>,
    pub resolver: Resolver,
    pub renderer: Arc<dyn Renderer>,
}

impl UnitContext {
    async fn load_set(&self, id: &SetId, referenced_from: &str) -> Result<Arc<ProviderSet>, WireError> {
        let pkg = self.objects.get_package(&id.pkg_path).await?;
        if !pkg.is_valid() {
            return Err(WireError::LoadFailure {
                pkg_path: pkg.path.clone(),
                reason: pkg.errors.join("; "),
            });
        }

        match &self.sets {
            Some(cache) => {
                cache
                    .get_or_extract(&pkg.path, &id.name, &pkg.files, pkg.file_fingerprint(), || {
                        extract_set(&pkg, &id.name, referenced_from)
                    })
                    .await
            }
            None => extract_set(&pkg, &id.name, referenced_from).map(Arc::new),
        }
    }

    /// Collect every set reachable from the request into a graph.
    ///
    /// Each set is fetched once even if referenced from several places; a set
    /// that cannot be fetched is an error for this unit only.
    async fn collect_sets(
        &self,
        roots: impl Iterator<Item = &SetId>,
        referenced_from: &str,
    ) -> Result<SetGraph, Vec<WireError>> {
        let mut graph = SetGraph::new();
        let mut errors = Vec::new();
        let mut seen = HashSet::new();
        let mut queue: VecDeque<(SetId, String)> =
            roots.map(|id| (id.clone(), referenced_from.to_string())).collect();

        while let Some((id, from)) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            match self.load_set(&id, &from).await {
                Ok(set) => {
                    let here = set.id.to_string();
                    queue.extend(set.references().map(|next| (next.clone(), here.clone())));
                    graph.add_set(set);
                }
                Err(WireError::Cancelled) => return Err(vec![WireError::Cancelled]),
                Err(err) => errors.push(err),
            }
        }

        if errors.is_empty() { Ok(graph) } else { Err(errors) }
    }

    /// Extract, resolve and render one injector.
    pub async fn run(
        &self,
        pkg: &PackageDescriptor,
        decl: &InjectorDecl,
    ) -> Result<InjectorOutput, Vec<WireError>> {
        let request = injector_request(pkg, decl).map_err(|e| vec![e])?;
        let qualified = request.qualified_name();

        let roots = request.items.iter().filter_map(|item| match item {
            SetItem::Reference(id) => Some(id),
            SetItem::Provider(_) => None,
        });
        let graph = self.collect_sets(roots, &qualified).await?;

        let plan = self.resolver.resolve_request(&request, &graph)?;
        let rendered =
            self.renderer.render_injector(pkg, decl, &plan).map_err(|e| vec![WireError::from(e)])?;

        tracing::debug!(
            target: "wiregen::generate",
            "{}: {} steps from {} sets",
            qualified,
            plan.steps.len(),
            graph.len()
        );
        Ok(InjectorOutput {
            name: decl.name.clone(),
            plan,
            code: rendered.code,
        })
    }
}
