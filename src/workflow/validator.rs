//! Structural checks on a [`WorkflowDefinition`] before it is executed.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::model::WorkflowDefinition;

/// Validate a workflow definition, returning every problem found.
///
/// An empty list means the workflow may be executed. Checks run in a fixed
/// order (identity, nodes, connections, cycles) and all of them run even
/// when an earlier one already failed.
pub fn validate(workflow: &WorkflowDefinition) -> Vec<String> {
    let mut errors = Vec::new();

    if workflow.workflow_id.trim().is_empty() {
        errors.push("workflow is missing workflow_id".to_string());
    }
    if workflow.name.trim().is_empty() {
        errors.push("workflow is missing name".to_string());
    }

    validate_nodes(workflow, &mut errors);
    let edges = validate_connections(workflow, &mut errors);

    for cycle in find_cycles(workflow.nodes.keys(), &edges) {
        errors.push(format!("cycle detected: {}", cycle.join(" -> ")));
    }

    errors
}

fn validate_nodes(
    workflow: &WorkflowDefinition,
    errors: &mut Vec<String>,
) {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for (key, node) in &workflow.nodes {
        if key.trim().is_empty() {
            errors.push("node is missing id".to_string());
        }
        if node.node_type.trim().is_empty() {
            errors.push(format!("node '{}' is missing type", key));
        }

        let id = match &node.id {
            Some(id) if id != key => {
                errors.push(format!("node '{}' declares mismatching id '{}'", key, id));
                id.as_str()
            }
            _ => key.as_str(),
        };
        if let Some(first) = seen.insert(id, key) {
            errors.push(format!("duplicate node id '{}' (nodes '{}' and '{}')", id, first, key));
        }
    }
}

/// Reports bad connections and returns the adjacency of the valid ones.
fn validate_connections<'a>(
    workflow: &'a WorkflowDefinition,
    errors: &mut Vec<String>,
) -> BTreeMap<&'a str, BTreeSet<&'a str>> {
    let mut edges: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for (id, connection) in &workflow.connections {
        let (source, target) = (connection.source.as_str(), connection.target.as_str());
        if source.is_empty() || target.is_empty() {
            errors.push(format!("connection '{}' is missing source or target", id));
            continue;
        }

        let mut dangling = false;
        for endpoint in [source, target] {
            if !workflow.nodes.contains_key(endpoint) {
                errors.push(format!("connection '{}' references unknown node '{}'", id, endpoint));
                dangling = true;
            }
        }
        if source == target {
            errors.push(format!("connection '{}' connects node '{}' to itself", id, source));
            continue;
        }
        if !dangling {
            edges.entry(source).or_default().insert(target);
        }
    }
    edges
}

/// Depth-first search with an on-path set. Nodes are visited in sorted order so
/// the reported cycles are stable; each back edge found reports one cycle.
fn find_cycles<'a>(
    nodes: impl Iterator<Item = &'a String>,
    edges: &BTreeMap<&'a str, BTreeSet<&'a str>>,
) -> Vec<Vec<String>> {
    let mut visited = HashSet::new();
    let mut cycles = Vec::new();
    for node in nodes {
        if !visited.contains(node.as_str()) {
            let mut path = Vec::new();
            dfs(node.as_str(), edges, &mut visited, &mut path, &mut cycles);
        }
    }
    cycles
}

fn dfs<'a>(
    node: &'a str,
    edges: &BTreeMap<&'a str, BTreeSet<&'a str>>,
    visited: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
    cycles: &mut Vec<Vec<String>>,
) {
    visited.insert(node);
    path.push(node);

    for &next in edges.get(node).into_iter().flatten() {
        if let Some(pos) = path.iter().position(|n| *n == next) {
            let mut cycle: Vec<String> = path[pos..].iter().map(|n| n.to_string()).collect();
            cycle.push(next.to_string());
            cycles.push(cycle);
        } else if !visited.contains(next) {
            dfs(next, edges, visited, path, cycles);
        }
    }

    path.pop();
}
