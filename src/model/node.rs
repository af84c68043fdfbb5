use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Repeats the map key when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Registered action type of the node.
    #[serde(default, rename = "type")]
    pub node_type: String,
    #[serde(default = "empty_object")]
    pub properties: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl NodeDefinition {
    pub fn new(
        node_type: &str,
        properties: Value,
    ) -> Self {
        Self {
            id: None,
            node_type: node_type.to_string(),
            properties,
        }
    }

    /// Action definition for the registry: the properties plus `type`, and
    /// `id` set to `node_id` unless the properties carry their own.
    pub fn action_definition(
        &self,
        node_id: &str,
    ) -> Value {
        let mut definition = match &self.properties {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("properties".to_string(), other.clone());
                map
            }
        };
        definition.insert("type".to_string(), Value::String(self.node_type.clone()));
        definition.entry("id").or_insert_with(|| Value::String(node_id.to_string()));
        Value::Object(definition)
    }
}
