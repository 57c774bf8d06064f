//! Recursion Analysis
//!
//! Builds a directed graph over the finalized cache (one node per slot, one
//! edge per `Named` link) and groups recursive types by strongly connected
//! component. Code generators use the groups to decide where a link needs
//! indirection.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::collections::HashMap;

use crate::compiler::{CompilationCache, Slot};
use crate::types::TypeId;

// =============================================================================
// Recursion Groups
// =============================================================================

/// A set of types that reach each other through links
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecursionGroup {
    pub id: usize,
    /// Member type ids in cache order
    pub members: Vec<TypeId>,
    /// Member names in cache order
    pub names: Vec<String>,
    /// Single type that links to itself
    pub self_referential: bool,
}

/// Recursion groups of one compiled schema
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecursionAnalysis {
    pub groups: Vec<RecursionGroup>,
    #[serde(skip)]
    membership: HashMap<TypeId, usize>,
}

impl RecursionAnalysis {
    pub fn is_recursive(&self, id: TypeId) -> bool {
        self.membership.contains_key(&id)
    }

    pub fn group_of(&self, id: TypeId) -> Option<&RecursionGroup> {
        self.membership.get(&id).and_then(|g| self.groups.get(*g))
    }

    /// True when a link from `from` to `to` closes a cycle
    pub fn same_group(&self, from: TypeId, to: TypeId) -> bool {
        match (self.membership.get(&from), self.membership.get(&to)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

// =============================================================================
// Analysis
// =============================================================================

/// Compute recursion groups for a finalized cache
pub fn analyze(cache: &CompilationCache) -> RecursionAnalysis {
    let mut graph: DiGraph<TypeId, ()> = DiGraph::with_capacity(cache.len(), cache.len());
    for (id, _, _) in cache.iter() {
        graph.add_node(id);
    }

    let mut links = Vec::new();
    for (id, _, slot) in cache.iter() {
        if let Slot::Ready(ty) = slot {
            links.clear();
            ty.links(&mut links);
            for target in &links {
                if target.index() < cache.len() {
                    graph.update_edge(NodeIndex::new(id.index()), NodeIndex::new(target.index()), ());
                }
            }
        }
    }

    let mut components: Vec<Vec<TypeId>> = kosaraju_scc(&graph)
        .into_iter()
        .filter_map(|scc| {
            let self_loop = scc.len() == 1 && graph.contains_edge(scc[0], scc[0]);
            if scc.len() > 1 || self_loop {
                let mut members: Vec<TypeId> = scc.iter().map(|ix| graph[*ix]).collect();
                members.sort();
                Some(members)
            } else {
                None
            }
        })
        .collect();
    components.sort_by_key(|members| members[0]);

    let mut analysis = RecursionAnalysis::default();
    for (group_id, members) in components.into_iter().enumerate() {
        for member in &members {
            analysis.membership.insert(*member, group_id);
        }
        analysis.groups.push(RecursionGroup {
            id: group_id,
            self_referential: members.len() == 1,
            names: members
                .iter()
                .filter_map(|m| cache.name_of(*m).map(String::from))
                .collect(),
            members,
        });
    }

    analysis
}
