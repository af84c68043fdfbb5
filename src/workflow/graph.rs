//! Runtime workflow representation using a directed graph.
//!
//! Every node of a [`WorkflowDefinition`] becomes an action built through the
//! [`ActionRegistry`]; every connection becomes an edge. The graph only
//! decides the order nodes run in, which is a topological order of the edges.

use std::collections::HashMap;

use petgraph::{
    Direction,
    algo::toposort,
    graph::{DiGraph, NodeIndex},
};

use crate::{
    AutoflowError, Result,
    model::WorkflowDefinition,
    workflow::actions::{Action, ActionRegistry},
};

/// A node ready to run.
pub struct Node {
    pub id: String,
    pub action: Box<dyn Action>,
}

/// Runtime workflow representation as a directed graph.
pub struct WorkflowGraph {
    graph: DiGraph<Node, ()>,
}

impl WorkflowGraph {
    /// Build the graph, constructing each node's action from its `type` and
    /// `properties`.
    pub fn build(
        workflow: &WorkflowDefinition,
        registry: &ActionRegistry,
    ) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut indices = HashMap::new();

        for (id, node) in &workflow.nodes {
            let action = registry
                .create(node.action_definition(id))
                .map_err(|e| AutoflowError::Engine(format!("failed to build node '{}': {}", id, e)))?;
            let idx = graph.add_node(Node {
                id: id.clone(),
                action,
            });
            indices.insert(id.as_str(), idx);
        }

        for (id, connection) in &workflow.connections {
            let source = indices
                .get(connection.source.as_str())
                .ok_or(AutoflowError::Engine(format!("connection {}: source node {} not found", id, connection.source)))?;
            let target = indices
                .get(connection.target.as_str())
                .ok_or(AutoflowError::Engine(format!("connection {}: target node {} not found", id, connection.target)))?;
            graph.add_edge(*source, *target, ());
        }

        Ok(Self {
            graph,
        })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Nodes in an order where every node comes after all of its sources.
    pub fn execution_order(&self) -> Result<Vec<&Node>> {
        let order = toposort(&self.graph, None).map_err(|cycle| AutoflowError::Engine(format!("cycle detected at node {}", self.graph[cycle.node_id()].id)))?;
        Ok(order.into_iter().map(|idx| &self.graph[idx]).collect())
    }

    /// Ids of the nodes that must finish before `id` runs.
    pub fn dependencies(
        &self,
        id: &str,
    ) -> Vec<&str> {
        self.index_of(id)
            .map(|idx| self.graph.neighbors_directed(idx, Direction::Incoming).map(|n| self.graph[n].id.as_str()).collect())
            .unwrap_or_default()
    }

    fn index_of(
        &self,
        id: &str,
    ) -> Option<NodeIndex> {
        self.graph.node_indices().find(|idx| self.graph[*idx].id == id)
    }

    /// Human-readable adjacency list, one node per line.
    pub fn describe(&self) -> String {
        self.graph
            .node_indices()
            .map(|idx| {
                let node = &self.graph[idx];
                let next: Vec<&str> = self.graph.neighbors_directed(idx, Direction::Outgoing).map(|n| self.graph[n].id.as_str()).collect();
                if next.is_empty() {
                    format!("{} ({}) -> (end)", node.id, node.action.action_type())
                } else {
                    format!("{} ({}) -> {}", node.id, node.action.action_type(), next.join(", "))
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::NodeDefinition;

    fn ids(graph: &WorkflowGraph) -> Vec<String> {
        graph.execution_order().unwrap().iter().map(|n| n.id.clone()).collect()
    }

    #[test]
    fn test_order_follows_connections() {
        let registry = ActionRegistry::with_builtins();
        let wf = WorkflowDefinition::new("wf", "order")
            .with_node("submit", NodeDefinition::new("noop", json!({})))
            .with_node("fill", NodeDefinition::new("set_variable", json!({"name": "user", "value": "ada"})))
            .with_node("open", NodeDefinition::new("noop", json!({})))
            .with_connection("c1", "open", "fill")
            .with_connection("c2", "fill", "submit");

        let graph = WorkflowGraph::build(&wf, &registry).unwrap();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(ids(&graph), vec!["open", "fill", "submit"]);
        assert_eq!(graph.dependencies("submit"), vec!["fill"]);
        assert!(graph.describe().contains("open (noop) -> fill"));
    }

    #[test]
    fn test_node_id_becomes_action_id() {
        let registry = ActionRegistry::with_builtins();
        let wf = WorkflowDefinition::new("wf", "ids").with_node("only", NodeDefinition::new("noop", json!({})));
        let graph = WorkflowGraph::build(&wf, &registry).unwrap();
        assert_eq!(graph.execution_order().unwrap()[0].action.id(), "only");
    }

    #[test]
    fn test_unknown_node_type_fails() {
        let registry = ActionRegistry::with_builtins();
        let wf = WorkflowDefinition::new("wf", "bad").with_node("x", NodeDefinition::new("click", json!({})));
        let err = WorkflowGraph::build(&wf, &registry).err().unwrap();
        assert_eq!(err.to_string(), "failed to build node 'x': unknown action type: click");
    }

    #[test]
    fn test_cycle_has_no_order() {
        let registry = ActionRegistry::with_builtins();
        let wf = WorkflowDefinition::new("wf", "loop")
            .with_node("a", NodeDefinition::new("noop", json!({})))
            .with_node("b", NodeDefinition::new("noop", json!({})))
            .with_connection("1", "a", "b")
            .with_connection("2", "b", "a");
        let graph = WorkflowGraph::build(&wf, &registry).unwrap();
        assert!(graph.execution_order().is_err());
    }
}
