use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::{
    AutoflowError, Result,
    model::{Connection, NodeDefinition},
};

/// Declarative workflow: a set of nodes and the connections ordering them.
///
/// Nodes and connections are keyed by id. Maps are ordered so everything
/// derived from a definition (validation messages, execution order among
/// independent nodes) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default)]
    pub workflow_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub nodes: BTreeMap<String, NodeDefinition>,
    #[serde(default)]
    pub connections: BTreeMap<String, Connection>,
}

impl WorkflowDefinition {
    pub fn new(
        workflow_id: &str,
        name: &str,
    ) -> Self {
        Self {
            workflow_id: workflow_id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str::<WorkflowDefinition>(s).map_err(|e| AutoflowError::Validation(format!("invalid workflow definition: {}", e)))
    }

    pub fn with_node(
        mut self,
        id: &str,
        node: NodeDefinition,
    ) -> Self {
        self.nodes.insert(id.to_string(), node);
        self
    }

    pub fn with_connection(
        mut self,
        id: &str,
        source: &str,
        target: &str,
    ) -> Self {
        self.connections.insert(id.to_string(), Connection::new(source, target));
        self
    }

    pub fn with_env(
        mut self,
        key: &str,
        value: &str,
    ) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }
}
