//! Provider set composition graph.
//!
//! Sets may reference other sets, possibly across packages. The references are
//! modelled as a directed graph over [`SetId`]s so that cycles are reported as
//! [`WireError::SetReferenceCycle`] before anything is flattened, instead of
//! recursing forever.

use petgraph::graph::{DiGraph, NodeIndex};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::core::WireError;
use crate::model::{Provider, ProviderSet, SetId, SetItem};

/// Color states for cycle detection using DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Position of a provider in the flattened candidate list.
///
/// Lower sorts first. `depth` is 0 for providers listed directly on the
/// injector, 1 for providers of a set the injector references, and so on;
/// `root_index` is the position of the injector item the provider was reached
/// through; `order` is the global declaration order of the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Precedence {
    /// Set nesting depth
    pub depth: usize,
    /// Index of the originating injector item
    pub root_index: usize,
    /// Declaration order
    pub order: usize,
}

/// A provider with its precedence key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedProvider {
    /// The provider
    pub provider: Arc<Provider>,
    /// Its precedence
    pub rank: Precedence,
}

impl PartialOrd for RankedProvider {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RankedProvider {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank.cmp(&other.rank)
    }
}

/// Directed graph of set references.
#[derive(Debug, Default)]
pub struct SetGraph {
    graph: DiGraph<SetId, ()>,
    node_map: HashMap<SetId, NodeIndex>,
    sets: HashMap<SetId, Arc<ProviderSet>>,
}

impl SetGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a collection of sets.
    pub fn from_sets(sets: impl IntoIterator<Item = Arc<ProviderSet>>) -> Self {
        let mut graph = Self::new();
        for set in sets {
            graph.add_set(set);
        }
        graph
    }

    fn ensure_node(&mut self, id: &SetId) -> NodeIndex {
        if let Some(&index) = self.node_map.get(id) {
            index
        } else {
            let index = self.graph.add_node(id.clone());
            self.node_map.insert(id.clone(), index);
            index
        }
    }

    /// Add a set and an edge to each set it references.
    ///
    /// Adding the same set twice keeps the first copy.
    pub fn add_set(&mut self, set: Arc<ProviderSet>) {
        if self.sets.contains_key(&set.id) {
            return;
        }
        let from = self.ensure_node(&set.id);
        for reference in set.references() {
            let to = self.ensure_node(reference);
            if !self.graph.contains_edge(from, to) {
                self.graph.add_edge(from, to, ());
            }
        }
        self.sets.insert(set.id.clone(), set);
    }

    /// Look up a set.
    pub fn get(&self, id: &SetId) -> Option<&Arc<ProviderSet>> {
        self.sets.get(id)
    }

    /// Number of sets added.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether no set has been added.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Successors of `node` in edge insertion order.
    fn successors(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut next: Vec<NodeIndex> = self.graph.neighbors(node).collect();
        next.reverse();
        next
    }

    /// Detect a reference cycle with a colored DFS.
    pub fn detect_cycles(&self) -> Result<(), WireError> {
        let mut colors: HashMap<NodeIndex, Color> =
            self.graph.node_indices().map(|n| (n, Color::White)).collect();
        let mut path = Vec::new();

        for node in self.graph.node_indices() {
            if colors.get(&node) == Some(&Color::White)
                && let Some(cycle) = self.dfs_visit(node, &mut colors, &mut path)
            {
                return Err(WireError::SetReferenceCycle {
                    chain: cycle.iter().map(ToString::to_string).collect(),
                });
            }
        }
        Ok(())
    }

    fn dfs_visit(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        path: &mut Vec<NodeIndex>,
    ) -> Option<Vec<SetId>> {
        colors.insert(node, Color::Gray);
        path.push(node);

        for next in self.successors(node) {
            match colors.get(&next) {
                Some(Color::Gray) => {
                    let start = path.iter().position(|&n| n == next).unwrap_or(0);
                    let mut cycle: Vec<SetId> =
                        path[start..].iter().map(|&n| self.graph[n].clone()).collect();
                    cycle.push(self.graph[next].clone());
                    return Some(cycle);
                }
                Some(Color::White) => {
                    if let Some(cycle) = self.dfs_visit(next, colors, path) {
                        return Some(cycle);
                    }
                }
                _ => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
        None
    }

    /// Flatten an injector's items into ranked candidate providers.
    ///
    /// Sets are walked breadth-first from the roots and each set is visited
    /// once, at its shallowest depth. The result is sorted by [`Precedence`].
    /// A reference to a set that was never added is
    /// [`WireError::UnknownSet`]; `referenced_from` names the injector for
    /// references made directly by `roots`.
    pub fn flatten(
        &self,
        roots: &[SetItem],
        referenced_from: &str,
    ) -> Result<Vec<RankedProvider>, WireError> {
        self.detect_cycles()?;

        let mut ranked = Vec::new();
        let mut order = 0usize;
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        for (root_index, item) in roots.iter().enumerate() {
            match item {
                SetItem::Provider(provider) => {
                    ranked.push(RankedProvider {
                        provider: Arc::clone(provider),
                        rank: Precedence {
                            depth: 0,
                            root_index,
                            order,
                        },
                    });
                    order += 1;
                }
                SetItem::Reference(id) => {
                    if visited.insert(id.clone()) {
                        queue.push_back((id.clone(), 1, root_index, referenced_from.to_string()));
                    }
                }
            }
        }

        while let Some((id, depth, root_index, from)) = queue.pop_front() {
            let set = self.sets.get(&id).ok_or_else(|| WireError::UnknownSet {
                set: id.to_string(),
                referenced_from: from,
            })?;

            for item in &set.items {
                match item {
                    SetItem::Provider(provider) => {
                        ranked.push(RankedProvider {
                            provider: Arc::clone(provider),
                            rank: Precedence {
                                depth,
                                root_index,
                                order,
                            },
                        });
                        order += 1;
                    }
                    SetItem::Reference(next) => {
                        if visited.insert(next.clone()) {
                            queue.push_back((next.clone(), depth + 1, root_index, id.to_string()));
                        }
                    }
                }
            }
        }

        ranked.sort();
        Ok(ranked)
    }
}
