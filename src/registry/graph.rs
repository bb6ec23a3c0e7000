//! Dependency graph analysis over `blocked_by` edges.

use super::model::WorkUnit;
use crate::error::{RegistryError, RegistryResult};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Maps each unit ID to the IDs it is blocked by.
pub type DependencyGraph = BTreeMap<String, BTreeSet<String>>;

pub fn dependency_graph<'a>(units: impl IntoIterator<Item = &'a WorkUnit>) -> DependencyGraph {
    units
        .into_iter()
        .map(|u| (u.unit_id.clone(), u.dependencies.blocked_by.clone()))
        .collect()
}

/// Returns the first cycle found, as a path that starts and ends on the same ID.
///
/// Edges to IDs absent from the graph are ignored. Traversal order is
/// deterministic (sorted IDs).
pub fn find_cycle(graph: &DependencyGraph) -> Option<Vec<String>> {
    let mut visited: HashSet<&str> = HashSet::new();
    for start in graph.keys() {
        if visited.contains(start.as_str()) {
            continue;
        }
        let mut path: Vec<&str> = Vec::new();
        let mut on_path: HashSet<&str> = HashSet::new();
        if let Some(cycle) = visit(graph, start, &mut visited, &mut path, &mut on_path) {
            return Some(cycle);
        }
    }
    None
}

fn visit<'g>(
    graph: &'g DependencyGraph,
    node: &'g str,
    visited: &mut HashSet<&'g str>,
    path: &mut Vec<&'g str>,
    on_path: &mut HashSet<&'g str>,
) -> Option<Vec<String>> {
    visited.insert(node);
    on_path.insert(node);
    path.push(node);

    if let Some(deps) = graph.get(node) {
        for dep in deps {
            let dep = dep.as_str();
            if !graph.contains_key(dep) {
                continue;
            }
            if on_path.contains(dep) {
                let start = path.iter().position(|n| *n == dep).unwrap_or(0);
                let mut cycle: Vec<String> = path.iter().skip(start).map(|n| n.to_string()).collect();
                cycle.push(dep.to_string());
                return Some(cycle);
            }
            if !visited.contains(dep) {
                if let Some(cycle) = visit(graph, dep, visited, path, on_path) {
                    return Some(cycle);
                }
            }
        }
    }

    path.pop();
    on_path.remove(node);
    None
}

/// Orders unit IDs so every unit follows the units it is blocked by.
///
/// Ties resolve in ID order. Fails with [`RegistryError::DependencyCycle`].
pub fn topological_order(graph: &DependencyGraph) -> RegistryResult<Vec<String>> {
    if let Some(cycle) = find_cycle(graph) {
        return Err(RegistryError::DependencyCycle(cycle));
    }

    let mut remaining: BTreeMap<&str, usize> = graph
        .iter()
        .map(|(id, deps)| {
            let known = deps.iter().filter(|d| graph.contains_key(d.as_str())).count();
            (id.as_str(), known)
        })
        .collect();
    let mut order = Vec::with_capacity(graph.len());

    loop {
        let Some(next) = remaining
            .iter()
            .find(|(_, pending)| **pending == 0)
            .map(|(id, _)| *id)
        else {
            break;
        };
        remaining.remove(next);
        order.push(next.to_string());
        for (id, pending) in remaining.iter_mut() {
            if graph
                .get(*id)
                .is_some_and(|deps| deps.contains(next))
            {
                *pending -= 1;
            }
        }
    }

    Ok(order)
}
