use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    Result,
    common::Vars,
    runtime::ExecutionContext,
    utils,
    workflow::actions::{Action, ActionRegistry, ActionResult, execute_child, parse_params},
};

#[derive(Deserialize)]
struct ForEachParams {
    #[serde(default = "utils::shortid")]
    id: String,
    #[serde(default)]
    description: String,
    collection_variable: String,
    item_variable: String,
    #[serde(default)]
    actions: Vec<Value>,
}

/// Runs its actions once per element of a collection variable.
///
/// Arrays yield their elements and objects their keys. Each iteration gets
/// its own variable scope with the item bound in it, so the item variable is
/// gone once the loop ends.
#[derive(Serialize)]
pub struct ForEachAction {
    id: String,
    description: String,
    collection_variable: String,
    item_variable: String,
    actions: Vec<Box<dyn Action>>,
}

enum Iteration {
    Completed,
    Break,
    Failed(ActionResult),
}

impl ForEachAction {
    fn items(collection: &Value) -> Option<Vec<Value>> {
        match collection {
            Value::Array(items) => Some(items.clone()),
            Value::Object(map) => Some(map.keys().map(|k| Value::String(k.clone())).collect()),
            _ => None,
        }
    }

    async fn run_iteration(
        &self,
        ctx: &mut ExecutionContext,
        index: usize,
        item: Value,
        results: &mut Vec<Value>,
    ) -> Result<Iteration> {
        ctx.variables_mut().push_scope();
        ctx.variables_mut().set_local(&self.item_variable, item);
        ctx.set_loop_index(index);

        let outcome = self.run_actions(ctx, results).await;
        ctx.variables_mut().pop_scope();
        outcome
    }

    async fn run_actions(
        &self,
        ctx: &mut ExecutionContext,
        results: &mut Vec<Value>,
    ) -> Result<Iteration> {
        for action in &self.actions {
            let result = execute_child(action.as_ref(), ctx).await?;
            results.push(result.to_value());
            if !result.is_success() {
                return Ok(Iteration::Failed(result));
            }
            if ctx.break_requested() {
                return Ok(Iteration::Break);
            }
            if ctx.take_continue() {
                break;
            }
        }
        Ok(Iteration::Completed)
    }
}

#[async_trait]
#[typetag::serialize(name = "for_each")]
impl Action for ForEachAction {
    fn create(
        params: Value,
        registry: &ActionRegistry,
    ) -> Result<Self> {
        let params: ForEachParams = parse_params(params, &Self::schema())?;
        Ok(Self {
            id: params.id,
            description: params.description,
            collection_variable: params.collection_variable,
            item_variable: params.item_variable,
            actions: registry.create_all(&params.actions)?,
        })
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string" },
                "description": { "type": "string" },
                "collection_variable": { "type": "string", "minLength": 1 },
                "item_variable": { "type": "string", "minLength": 1 },
                "actions": { "type": "array", "items": { "type": "object" } }
            },
            "required": ["collection_variable", "item_variable"]
        })
    }

    fn type_name() -> &'static str {
        "for_each"
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
        let Some(collection) = ctx.get_variable(&self.collection_variable) else {
            return Ok(ActionResult::failure(format!("collection variable '{}' not found", self.collection_variable)));
        };
        let Some(items) = Self::items(collection) else {
            return Ok(ActionResult::failure(format!("variable '{}' is not iterable", self.collection_variable)));
        };

        let total = items.len();
        let mut results = Vec::new();
        let mut iterations = 0;
        let mut broke = false;

        let frame = ctx.enter_loop();
        let mut failure = None;
        for (index, item) in items.into_iter().enumerate() {
            if let Err(err) = ctx.check_cancelled() {
                ctx.exit_loop(frame);
                return Err(err);
            }

            iterations += 1;
            match self.run_iteration(ctx, index, item, &mut results).await {
                Ok(Iteration::Completed) => {}
                Ok(Iteration::Break) => {
                    debug!("for_each {} stopped by break at index {}", self.id, index);
                    broke = true;
                    break;
                }
                Ok(Iteration::Failed(result)) => {
                    failure = Some((index, result));
                    break;
                }
                Err(err) => {
                    ctx.exit_loop(frame);
                    return Err(err);
                }
            }
        }
        ctx.exit_loop(frame);

        let data = Vars::new().with("iterations", iterations).with("total", total).with("results", &results);
        if let Some((index, result)) = failure {
            return Ok(ActionResult::failure(format!("iteration {} failed: {}", index, result.message())).with_data(data.with("failed_index", index)));
        }
        let message = if broke {
            format!("stopped after {} of {} iterations", iterations, total)
        } else {
            format!("completed {} iterations", iterations)
        };
        Ok(ActionResult::success(message).with_data(data.with("broke", broke)))
    }
}
