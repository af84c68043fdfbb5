use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    Result,
    runtime::ExecutionContext,
    utils,
    workflow::actions::{Action, ActionRegistry, ActionResult, parse_params},
};

/// Does nothing and succeeds. Used for start and end placeholder nodes.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NoopAction {
    #[serde(default = "utils::shortid")]
    id: String,
    #[serde(default)]
    description: String,
}

#[async_trait]
#[typetag::serialize(name = "noop")]
impl Action for NoopAction {
    fn create(
        params: Value,
        _registry: &ActionRegistry,
    ) -> Result<Self> {
        parse_params(params, &Self::schema())
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string" },
                "description": { "type": "string" }
            }
        })
    }

    fn type_name() -> &'static str {
        "noop"
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn action_type(&self) -> &str {
        Self::type_name()
    }

    async fn execute(
        &self,
        _ctx: &mut ExecutionContext,
    ) -> Result<ActionResult> {
        Ok(ActionResult::success("noop"))
    }
}
