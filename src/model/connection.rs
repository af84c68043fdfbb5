use serde::{Deserialize, Serialize};

/// Directed dependency between two nodes: `target` runs after `source`.
///
/// Both the short (`source`/`target`) and the long
/// (`source_node_id`/`target_node_id`) spellings are accepted on read; the
/// short form is written back. A missing endpoint reads as an empty string and
/// is reported by the validator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(default, alias = "source_node_id")]
    pub source: String,
    #[serde(default, alias = "target_node_id")]
    pub target: String,
}

impl Connection {
    pub fn new(
        source: &str,
        target: &str,
    ) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
        }
    }
}
