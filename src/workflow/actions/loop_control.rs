use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    Result,
    runtime::ExecutionContext,
    utils,
    workflow::actions::{Action, ActionRegistry, ActionResult, parse_params},
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LoopSignal {
    Break,
    Continue,
}

/// Signals the innermost enclosing loop to stop or to skip to its next iteration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoopControlAction {
    #[serde(default = "utils::shortid")]
    id: String,
    #[serde(default)]
    description: String,
    signal: LoopSignal,
}

#[async_trait]
#[typetag::serialize(name = "loop_control")]
impl Action for LoopControlAction {
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
                "description": { "type": "string" },
                "signal": { "type": "string", "enum": ["break", "continue"] }
            },
            "required": ["signal"]
        })
    }

    fn type_name() -> &'static str {
        "loop_control"
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
        ctx: &mut ExecutionContext,
    ) -> Result<ActionResult> {
        let requested = match self.signal {
            LoopSignal::Break => ctx.request_break(),
            LoopSignal::Continue => ctx.request_continue(),
        };
        match requested {
            Ok(()) => Ok(ActionResult::success(format!("{} requested", self.signal))),
            Err(err) => Ok(ActionResult::failure(err.to_string())),
        }
    }
}
