use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    Result,
    common::Vars,
    recovery::{ErrorCategory, ErrorContext, ErrorSeverity},
    runtime::ExecutionContext,
    utils,
    workflow::actions::{Action, ActionRegistry, ActionResult, execute_child, parse_params},
};

#[derive(Deserialize)]
struct TryCatchParams {
    #[serde(default = "utils::shortid")]
    id: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    try_actions: Vec<Value>,
    #[serde(default)]
    catch_actions: Vec<Value>,
    #[serde(default)]
    finally_actions: Vec<Value>,
    #[serde(default)]
    error_variable_name: Option<String>,
}

/// Structured error handling over three action blocks.
///
/// The try block stops at its first failure. The catch block runs only
/// after such a failure, the finally block always runs, and neither of them
/// stops early. The action succeeds when the try block did, or when every
/// catch action succeeded. Finally results are reported but never change the
/// outcome.
#[derive(Serialize)]
pub struct TryCatchAction {
    id: String,
    description: String,
    try_actions: Vec<Box<dyn Action>>,
    catch_actions: Vec<Box<dyn Action>>,
    finally_actions: Vec<Box<dyn Action>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_variable_name: Option<String>,
}

impl TryCatchAction {
    async fn run_try(
        &self,
        ctx: &mut ExecutionContext,
    ) -> Result<(Vec<Value>, Option<ErrorContext>)> {
        let mut results = Vec::new();
        for (index, action) in self.try_actions.iter().enumerate() {
            let result = execute_child(action.as_ref(), ctx).await?;
            results.push(result.to_value());
            if !result.is_success() {
                let mut error = ErrorContext::new(result.message(), ErrorCategory::Execution)
                    .with_severity(ErrorSeverity::Error)
                    .with_context("failed_index", index)
                    .with_context("action_type", action.action_type())
                    .with_context("action_id", action.id());
                error.source_error = result.exception();
                return Ok((results, Some(error)));
            }
            if ctx.loop_signal_pending() {
                debug!("try_catch {} interrupted by loop signal", self.id);
                break;
            }
        }
        Ok((results, None))
    }

    async fn run_all(
        actions: &[Box<dyn Action>],
        ctx: &mut ExecutionContext,
    ) -> Result<(Vec<Value>, bool)> {
        let mut results = Vec::with_capacity(actions.len());
        let mut all_succeeded = true;
        for action in actions {
            let result = execute_child(action.as_ref(), ctx).await?;
            all_succeeded &= result.is_success();
            results.push(result.to_value());
        }
        Ok((results, all_succeeded))
    }
}

#[async_trait]
#[typetag::serialize(name = "try_catch")]
impl Action for TryCatchAction {
    fn create(
        params: Value,
        registry: &ActionRegistry,
    ) -> Result<Self> {
        let params: TryCatchParams = parse_params(params, &Self::schema())?;
        Ok(Self {
            id: params.id,
            description: params.description,
            try_actions: registry.create_all(&params.try_actions)?,
            catch_actions: registry.create_all(&params.catch_actions)?,
            finally_actions: registry.create_all(&params.finally_actions)?,
            error_variable_name: params.error_variable_name,
        })
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string" },
                "description": { "type": "string" },
                "try_actions": { "type": "array", "items": { "type": "object" } },
                "catch_actions": { "type": "array", "items": { "type": "object" } },
                "finally_actions": { "type": "array", "items": { "type": "object" } },
                "error_variable_name": { "type": "string" }
            }
        })
    }

    fn type_name() -> &'static str {
        "try_catch"
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
        let (try_results, error) = self.run_try(ctx).await?;

        let mut catch_results = Vec::new();
        let mut catch_succeeded = true;
        if let Some(error) = &error {
            debug!("try_catch {} caught: {}", self.id, error);
            ctx.set_last_error(error.clone());
            if let Some(name) = &self.error_variable_name {
                ctx.set_variable(name, error.to_value());
            }
            (catch_results, catch_succeeded) = Self::run_all(&self.catch_actions, ctx).await?;
        }

        let (finally_results, finally_succeeded) = Self::run_all(&self.finally_actions, ctx).await?;

        let mut data = Vars::new()
            .with("try_results", try_results)
            .with("catch_results", catch_results)
            .with("finally_results", finally_results)
            .with("finally_succeeded", finally_succeeded);
        if let Some(error) = &error {
            data.set("error", error.to_value());
        }

        match error {
            None => Ok(ActionResult::success("try block completed").with_data(data)),
            Some(error) if catch_succeeded => Ok(ActionResult::success(format!("error handled: {}", error.message)).with_data(data)),
            Some(error) => Ok(ActionResult::failure(format!("error not handled: {}", error.message)).with_data(data)),
        }
    }
}
