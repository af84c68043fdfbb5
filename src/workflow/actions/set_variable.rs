use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    Result,
    common::Vars,
    runtime::ExecutionContext,
    utils,
    workflow::{
        actions::{Action, ActionRegistry, ActionResult, parse_params},
        template,
    },
};

/// Assigns a value to a variable.
///
/// String parts of `value` may reference variables (`{{#name.path#}}`) and
/// environment entries (`{{$NAME$}}`); they are resolved at execution time.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SetVariableAction {
    #[serde(default = "utils::shortid")]
    id: String,
    #[serde(default)]
    description: String,
    name: String,
    #[serde(default)]
    value: Value,
}

#[async_trait]
#[typetag::serialize(name = "set_variable")]
impl Action for SetVariableAction {
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
                "name": { "type": "string", "minLength": 1 },
                "value": {}
            },
            "required": ["name"]
        })
    }

    fn type_name() -> &'static str {
        "set_variable"
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
        let value = match template::resolve_json_value(ctx, &self.value) {
            Ok(value) => value,
            Err(err) => return Ok(ActionResult::failure(format!("cannot set '{}': {}", self.name, err))),
        };

        ctx.set_variable(&self.name, value.clone());
        Ok(ActionResult::success(format!("set {}", self.name)).with_data(Vars::new().with("name", &self.name).with("value", value)))
    }
}
