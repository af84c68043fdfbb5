use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    Result,
    common::Vars,
    runtime::ExecutionContext,
    utils,
    workflow::{
        actions::{Action, ActionRegistry, ActionResult, execute_child, parse_params},
        condition::Condition,
    },
};

#[derive(Deserialize)]
struct WhileParams {
    #[serde(default = "utils::shortid")]
    id: String,
    #[serde(default)]
    description: String,
    condition: Value,
    #[serde(default)]
    max_iterations: Option<u64>,
    #[serde(default)]
    actions: Vec<Value>,
}

/// Repeats its actions while a condition holds.
///
/// Without `max_iterations` the loop is unbounded. Reaching the limit is a
/// success with `max_iterations_reached` set in the result data.
#[derive(Serialize)]
pub struct WhileAction {
    id: String,
    description: String,
    condition: Box<dyn Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_iterations: Option<u64>,
    actions: Vec<Box<dyn Action>>,
}

enum Stop {
    ConditionFalse,
    LimitReached,
    Break,
    Failed(String),
}

impl WhileAction {
    async fn run_loop(
        &self,
        ctx: &mut ExecutionContext,
        iterations: &mut u64,
        results: &mut Vec<Value>,
    ) -> Result<Stop> {
        loop {
            ctx.check_cancelled()?;
            if self.max_iterations.is_some_and(|max| *iterations >= max) {
                return Ok(Stop::LimitReached);
            }
            match self.condition.evaluate(ctx) {
                Ok(true) => {}
                Ok(false) => return Ok(Stop::ConditionFalse),
                Err(err) => return Ok(Stop::Failed(format!("condition evaluation failed: {}", err))),
            }

            ctx.set_loop_index(*iterations as usize);
            *iterations += 1;
            for action in &self.actions {
                let result = execute_child(action.as_ref(), ctx).await?;
                results.push(result.to_value());
                if !result.is_success() {
                    return Ok(Stop::Failed(format!("iteration {} failed: {}", *iterations - 1, result.message())));
                }
                if ctx.break_requested() {
                    return Ok(Stop::Break);
                }
                if ctx.take_continue() {
                    break;
                }
            }
        }
    }
}

#[async_trait]
#[typetag::serialize(name = "while")]
impl Action for WhileAction {
    fn create(
        params: Value,
        registry: &ActionRegistry,
    ) -> Result<Self> {
        let params: WhileParams = parse_params(params, &Self::schema())?;
        Ok(Self {
            id: params.id,
            description: params.description,
            condition: registry.create_condition(params.condition)?,
            max_iterations: params.max_iterations,
            actions: registry.create_all(&params.actions)?,
        })
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string" },
                "description": { "type": "string" },
                "condition": { "type": "object" },
                "max_iterations": { "type": "integer", "minimum": 0 },
                "actions": { "type": "array", "items": { "type": "object" } }
            },
            "required": ["condition"]
        })
    }

    fn type_name() -> &'static str {
        "while"
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
        let mut iterations = 0;
        let mut results = Vec::new();

        let frame = ctx.enter_loop();
        let stop = self.run_loop(ctx, &mut iterations, &mut results).await;
        ctx.exit_loop(frame);

        let data = Vars::new().with("iterations", iterations).with("results", &results);
        match stop? {
            Stop::ConditionFalse => Ok(ActionResult::success(format!("completed {} iterations", iterations)).with_data(data)),
            Stop::Break => Ok(ActionResult::success(format!("stopped by break after {} iterations", iterations)).with_data(data)),
            Stop::LimitReached => {
                debug!("while {} reached its limit of {} iterations", self.id, iterations);
                Ok(ActionResult::success(format!("reached max iterations ({})", iterations)).with_data(data.with("max_iterations_reached", true)))
            }
            Stop::Failed(message) => Ok(ActionResult::failure(message).with_data(data)),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::workflow::{
        actions::{
            to_definition,
            testing::{self, Outcome, ScriptedAction},
        },
        condition::ConstantCondition,
    };

    #[tokio::test]
    async fn test_stops_when_condition_false() {
        let registry = testing::registry();
        let action = registry
            .create(json!({
                "type": "while",
                "condition": {
                    "type": "compare",
                    "conditions": [{"variable_selector": "items", "comparison_operator": "not_empty"}]
                },
                "actions": [{"type": "set_variable", "name": "items", "value": []}]
            }))
            .unwrap();
        let mut ctx = ExecutionContext::new().with_variables(Vars::new().with("items", json!([1])));

        let result = action.execute(&mut ctx).await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.data().get::<u64>("iterations"), Some(1));
        assert!(!ctx.in_loop());
    }

    #[tokio::test]
    async fn test_max_iterations_reached() {
        let child = ScriptedAction::always("tick", Outcome::Succeed);
        let action = WhileAction {
            id: "spin".to_string(),
            description: String::new(),
            condition: Box::new(ConstantCondition::new(true)),
            max_iterations: Some(4),
            actions: vec![Box::new(child.clone())],
        };

        let result = action.execute(&mut ExecutionContext::new()).await.unwrap();
        assert!(result.is_success());
        assert_eq!(child.calls(), 4);
        assert_eq!(result.data().get::<bool>("max_iterations_reached"), Some(true));
    }

    #[tokio::test]
    async fn test_child_failure_stops_loop() {
        let child = ScriptedAction::new("tick", vec![Outcome::Succeed, Outcome::Fail("stale element")]);
        let action = WhileAction {
            id: "spin".to_string(),
            description: String::new(),
            condition: Box::new(ConstantCondition::new(true)),
            max_iterations: None,
            actions: vec![Box::new(child.clone())],
        };

        let result = action.execute(&mut ExecutionContext::new()).await.unwrap();
        assert!(!result.is_success());
        assert_eq!(child.calls(), 2);
        assert_eq!(result.data().get::<u64>("iterations"), Some(2));
    }

    #[tokio::test]
    async fn test_break_and_loop_index() {
        let registry = testing::registry();
        let action = registry
            .create(json!({
                "type": "while",
                "condition": {"type": "constant", "value": true},
                "actions": [
                    {"type": "retry", "max_retries": 0, "action": {"type": "noop"}},
                    {"type": "loop_control", "signal": "break"},
                    {"type": "fail"}
                ]
            }))
            .unwrap();
        let mut ctx = ExecutionContext::new();

        let result = action.execute(&mut ctx).await.unwrap();
        assert!(result.is_success(), "{:?}", result);
        assert_eq!(result.data().get::<u64>("iterations"), Some(1));
        assert!(!ctx.break_requested());
        assert_eq!(ctx.loop_index(), None);
    }

    #[tokio::test]
    async fn test_round_trip() {
        let registry = testing::registry();
        let definition = json!({
            "type": "while",
            "id": "poll",
            "description": "",
            "condition": {
                "type": "compare",
                "logical_operator": "and",
                "conditions": [{"variable_selector": "n", "comparison_operator": "lt", "value": 3}]
            },
            "max_iterations": 10,
            "actions": [{"type": "noop", "id": "n", "description": ""}]
        });
        let action = registry.create(definition.clone()).unwrap();
        assert_eq!(to_definition(action.as_ref()).unwrap(), definition);

        assert!(registry.create(json!({"type": "while", "condition": {"type": "sometimes"}})).is_err());
    }
}
