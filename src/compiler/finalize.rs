//! Model Finalizer
//!
//! Runs once the descent is complete. Each pass rewrites, in every slot:
//!
//! - `Pending(name)` into `Named(id)`
//! - links to pure alias slots into links to the alias target
//! - `Union[.., null, ..]` into `Optional(..)`
//! - `Optional(Optional(T))` into `Optional(T)`
//!
//! Passes repeat until nothing changes, bounded by the slot count. The
//! result is then checked for cycles that never enter a record or array,
//! since no instance can satisfy them in finite depth.

use std::collections::HashMap;

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use super::{CompilationCache, Slot};
use crate::error::{CompileError, Result};
use crate::types::{CompiledType, TypeId};

/// Resolve every placeholder in `cache`, leaving no `Pending` anywhere
pub fn finalize(cache: &mut CompilationCache) -> Result<()> {
    if let Some(name) = cache.pending_names().next() {
        return Err(CompileError::UnresolvedPlaceholder {
            name: name.to_string(),
        });
    }

    let ids: HashMap<String, TypeId> = cache
        .iter()
        .map(|(id, name, _)| (name.to_string(), id))
        .collect();

    let bound = cache.len() + 1;
    for pass in 1..=bound {
        let aliases = alias_targets(cache, &ids)?;
        check_alias_cycles(cache, &aliases)?;

        let mut changed = 0;
        for (_, slot) in cache.slots_mut() {
            if let Slot::Ready(ty) = slot {
                changed += rewrite(ty, &ids, &aliases)?;
            }
        }

        if changed == 0 {
            check_unguarded_cycles(cache)?;
            debug!(passes = pass, types = cache.len(), "Finalized compilation cache");
            return Ok(());
        }
    }

    Err(CompileError::FinalizeDiverged { passes: bound })
}

/// Slots whose whole type is a link to another slot
fn alias_targets(
    cache: &CompilationCache,
    ids: &HashMap<String, TypeId>,
) -> Result<HashMap<TypeId, TypeId>> {
    let mut aliases = HashMap::new();
    for (id, _, slot) in cache.iter() {
        match slot {
            Slot::Ready(CompiledType::Named(target)) => {
                aliases.insert(id, *target);
            }
            Slot::Ready(CompiledType::Pending(name)) => {
                let target = ids
                    .get(name)
                    .ok_or_else(|| CompileError::UnresolvedPlaceholder { name: name.clone() })?;
                aliases.insert(id, *target);
            }
            _ => {}
        }
    }
    Ok(aliases)
}

/// Alias chains must end at a structural type
fn check_alias_cycles(cache: &CompilationCache, aliases: &HashMap<TypeId, TypeId>) -> Result<()> {
    for &start in aliases.keys() {
        let mut current = start;
        for _ in 0..=aliases.len() {
            match aliases.get(&current) {
                Some(&next) if next == start => {
                    let name = cache.name_of(start).unwrap_or("<unknown>").to_string();
                    return Err(CompileError::AliasCycle { name });
                }
                Some(&next) => current = next,
                None => break,
            }
        }
    }
    Ok(())
}

/// Links reachable from `ty` without entering a record or an array
fn unguarded_links(ty: &CompiledType, out: &mut Vec<TypeId>) {
    match ty {
        CompiledType::Named(id) => out.push(*id),
        CompiledType::Union(variants) => {
            for variant in variants {
                unguarded_links(variant, out);
            }
        }
        CompiledType::Optional(inner) => unguarded_links(inner, out),
        _ => {}
    }
}

/// Reject slots that reach themselves through unions, optionals or aliases
/// alone, e.g. `A = A | string`
fn check_unguarded_cycles(cache: &CompilationCache) -> Result<()> {
    let mut graph: DiGraph<TypeId, ()> = DiGraph::new();
    let nodes: HashMap<TypeId, NodeIndex> = cache
        .iter()
        .map(|(id, _, _)| (id, graph.add_node(id)))
        .collect();

    for (id, _, slot) in cache.iter() {
        let (Slot::Ready(ty), Some(&from)) = (slot, nodes.get(&id)) else {
            continue;
        };
        let mut links = Vec::new();
        unguarded_links(ty, &mut links);
        for target in links {
            if let Some(&to) = nodes.get(&target) {
                graph.update_edge(from, to, ());
            }
        }
    }

    for component in kosaraju_scc(&graph) {
        let cyclic = component.len() > 1
            || component.iter().any(|&n| graph.contains_edge(n, n));
        if cyclic {
            let names: Vec<&str> = component
                .iter()
                .filter_map(|&n| cache.name_of(graph[n]))
                .collect();
            debug!(types = ?names, "Unguarded recursion");
            let name = names.first().copied().unwrap_or("<unknown>").to_string();
            return Err(CompileError::AliasCycle { name });
        }
    }
    Ok(())
}

fn rewrite(
    ty: &mut CompiledType,
    ids: &HashMap<String, TypeId>,
    aliases: &HashMap<TypeId, TypeId>,
) -> Result<usize> {
    let mut changed = 0;

    match ty {
        CompiledType::Record(record) => {
            for field in &mut record.fields {
                changed += rewrite(&mut field.ty, ids, aliases)?;
            }
        }
        CompiledType::ArrayOf { element, .. } => changed += rewrite(element, ids, aliases)?,
        CompiledType::Union(variants) => {
            for variant in variants.iter_mut() {
                changed += rewrite(variant, ids, aliases)?;
            }
        }
        CompiledType::Optional(inner) => changed += rewrite(inner, ids, aliases)?,
        _ => {}
    }

    let replacement = match ty {
        CompiledType::Pending(name) => {
            let id = ids
                .get(name.as_str())
                .ok_or_else(|| CompileError::UnresolvedPlaceholder { name: name.clone() })?;
            Some(CompiledType::Named(*id))
        }
        CompiledType::Named(id) => aliases.get(id).map(|target| CompiledType::Named(*target)),
        CompiledType::Union(variants) if variants.iter().any(CompiledType::is_null) => {
            let mut rest: Vec<CompiledType> = std::mem::take(variants)
                .into_iter()
                .filter(|v| !v.is_null())
                .collect();
            match rest.len() {
                0 => Some(CompiledType::null()),
                1 => Some(CompiledType::optional(rest.remove(0))),
                _ => Some(CompiledType::Optional(Box::new(CompiledType::Union(rest)))),
            }
        }
        CompiledType::Optional(inner) if matches!(**inner, CompiledType::Optional(_)) => {
            Some(std::mem::replace(&mut **inner, CompiledType::Dynamic))
        }
        _ => None,
    };

    if let Some(replacement) = replacement {
        *ty = replacement;
        changed += 1;
    }

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, PrimitiveKind, Record};

    fn record(name: &str, fields: Vec<(&str, CompiledType)>) -> CompiledType {
        CompiledType::Record(Record {
            name: name.to_string(),
            fields: fields
                .into_iter()
                .map(|(field, ty)| Field {
                    name: field.to_string(),
                    ty,
                    required: true,
                    constraints: Default::default(),
                    description: None,
                    default: None,
                })
                .collect(),
            closed: false,
            description: None,
        })
    }

    #[test]
    fn test_mutual_recursion_resolved() {
        let mut cache = CompilationCache::new();
        let a = cache.store("A", record("A", vec![("b", CompiledType::Pending("B".into()))]));
        let b = cache.store("B", record("B", vec![("a", CompiledType::Pending("A".into()))]));

        finalize(&mut cache).unwrap();

        assert!(cache.iter().all(|(_, _, slot)| !matches!(slot, Slot::Ready(t) if t.contains_pending())));
        match cache.get("A") {
            Some(CompiledType::Record(r)) => assert_eq!(r.fields[0].ty, CompiledType::Named(b)),
            other => panic!("Expected Record, got {:?}", other),
        }
        match cache.get("B") {
            Some(CompiledType::Record(r)) => assert_eq!(r.fields[0].ty, CompiledType::Named(a)),
            other => panic!("Expected Record, got {:?}", other),
        }
    }

    #[test]
    fn test_union_with_null_becomes_optional() {
        let mut cache = CompilationCache::new();
        let node = cache.store(
            "Node",
            record(
                "Node",
                vec![("next", CompiledType::Union(vec![CompiledType::Pending("Node".into()), CompiledType::null()]))],
            ),
        );

        finalize(&mut cache).unwrap();

        match cache.get("Node") {
            Some(CompiledType::Record(r)) => assert_eq!(
                r.fields[0].ty,
                CompiledType::Optional(Box::new(CompiledType::Named(node)))
            ),
            other => panic!("Expected Record, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_optional_flattens() {
        let mut cache = CompilationCache::new();
        let string = CompiledType::primitive(PrimitiveKind::String);
        cache.store(
            "R",
            record(
                "R",
                vec![(
                    "x",
                    CompiledType::Optional(Box::new(CompiledType::Union(vec![
                        CompiledType::null(),
                        string.clone(),
                    ]))),
                )],
            ),
        );

        finalize(&mut cache).unwrap();

        match cache.get("R") {
            Some(CompiledType::Record(r)) => {
                assert_eq!(r.fields[0].ty, CompiledType::Optional(Box::new(string)))
            }
            other => panic!("Expected Record, got {:?}", other),
        }
    }

    #[test]
    fn test_alias_chain_shortcut() {
        let mut cache = CompilationCache::new();
        let a = cache.reserve("A");
        let b = cache.reserve("B");
        let c = cache.reserve("C");
        cache.store("A", CompiledType::Named(b));
        cache.store("B", CompiledType::Pending("C".into()));
        cache.store("C", record("C", vec![]));
        let user = cache.store("User", record("User", vec![("a", CompiledType::Named(a))]));

        finalize(&mut cache).unwrap();

        assert_eq!(cache.get("A"), Some(&CompiledType::Named(c)));
        match cache.get_by_id(user) {
            Some(CompiledType::Record(r)) => assert_eq!(r.fields[0].ty, CompiledType::Named(c)),
            other => panic!("Expected Record, got {:?}", other),
        }
    }

    #[test]
    fn test_alias_cycle_rejected() {
        let mut cache = CompilationCache::new();
        let a = cache.reserve("A");
        cache.reserve("B");
        cache.store("B", CompiledType::Named(a));
        cache.store("A", CompiledType::Pending("B".into()));

        match finalize(&mut cache) {
            Err(CompileError::AliasCycle { .. }) => {}
            other => panic!("Expected AliasCycle, got {:?}", other),
        }
    }

    #[test]
    fn test_union_reaching_itself_rejected() {
        let mut cache = CompilationCache::new();
        cache.reserve("A");
        cache.store(
            "A",
            CompiledType::Union(vec![
                CompiledType::Pending("A".into()),
                CompiledType::primitive(PrimitiveKind::String),
            ]),
        );

        match finalize(&mut cache) {
            Err(CompileError::AliasCycle { name }) => assert_eq!(name, "A"),
            other => panic!("Expected AliasCycle, got {:?}", other),
        }
    }

    #[test]
    fn test_optional_cycle_across_slots_rejected() {
        let mut cache = CompilationCache::new();
        cache.reserve("A");
        cache.reserve("B");
        cache.store("A", CompiledType::optional(CompiledType::Pending("B".into())));
        cache.store(
            "B",
            CompiledType::Union(vec![
                CompiledType::primitive(PrimitiveKind::Integer),
                CompiledType::Pending("A".into()),
            ]),
        );

        assert!(matches!(
            finalize(&mut cache),
            Err(CompileError::AliasCycle { .. })
        ));
    }

    #[test]
    fn test_recursion_through_array_allowed() {
        let mut cache = CompilationCache::new();
        cache.reserve("Tree");
        cache.store(
            "Tree",
            CompiledType::Union(vec![
                CompiledType::primitive(PrimitiveKind::String),
                CompiledType::ArrayOf {
                    element: Box::new(CompiledType::Pending("Tree".into())),
                    min_items: None,
                    max_items: None,
                },
            ]),
        );

        assert!(finalize(&mut cache).is_ok());
    }

    #[test]
    fn test_leftover_pending_slot_is_internal_error() {
        let mut cache = CompilationCache::new();
        cache.reserve("Orphan");
        match finalize(&mut cache) {
            Err(CompileError::UnresolvedPlaceholder { name }) => assert_eq!(name, "Orphan"),
            other => panic!("Expected UnresolvedPlaceholder, got {:?}", other),
        }
    }

    #[test]
    fn test_dangling_placeholder_name() {
        let mut cache = CompilationCache::new();
        cache.store("R", record("R", vec![("x", CompiledType::Pending("Missing".into()))]));
        assert!(matches!(
            finalize(&mut cache),
            Err(CompileError::UnresolvedPlaceholder { .. })
        ));
    }
}
