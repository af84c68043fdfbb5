use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::{
    Result,
    common::Vars,
    recovery::ErrorContext,
    runtime::ExecutionContext,
    utils,
    workflow::actions::{Action, ActionRegistry, ActionResult, execute_child, parse_params},
};

fn default_max_retries() -> u32 {
    3
}

fn default_delay_seconds() -> f64 {
    1.0
}

fn default_backoff_factor() -> f64 {
    2.0
}

#[derive(Deserialize)]
struct RetryParams {
    #[serde(default = "utils::shortid")]
    id: String,
    #[serde(default)]
    description: String,
    action: Value,
    #[serde(default = "default_max_retries")]
    max_retries: u32,
    #[serde(default = "default_delay_seconds")]
    delay_seconds: f64,
    #[serde(default = "default_backoff_factor")]
    backoff_factor: f64,
    #[serde(default)]
    result_variable: Option<String>,
    #[serde(default)]
    attempts_variable: Option<String>,
}

/// Runs one action until it succeeds, at most `max_retries + 1` times.
///
/// The first attempt is immediate. Before every further attempt the action
/// sleeps for the current delay, which is then multiplied by
/// `backoff_factor`.
#[derive(Serialize)]
pub struct RetryAction {
    id: String,
    description: String,
    action: Box<dyn Action>,
    max_retries: u32,
    delay_seconds: f64,
    backoff_factor: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    result_variable: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attempts_variable: Option<String>,
}

#[async_trait]
#[typetag::serialize(name = "retry")]
impl Action for RetryAction {
    fn create(
        params: Value,
        registry: &ActionRegistry,
    ) -> Result<Self> {
        let params: RetryParams = parse_params(params, &Self::schema())?;
        Ok(Self {
            id: params.id,
            description: params.description,
            action: registry.create(params.action)?,
            max_retries: params.max_retries,
            delay_seconds: params.delay_seconds,
            backoff_factor: params.backoff_factor,
            result_variable: params.result_variable,
            attempts_variable: params.attempts_variable,
        })
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string" },
                "description": { "type": "string" },
                "action": { "type": "object" },
                "max_retries": { "type": "integer", "minimum": 0 },
                "delay_seconds": { "type": "number", "minimum": 0 },
                "backoff_factor": { "type": "number", "exclusiveMinimum": 0 },
                "result_variable": { "type": "string" },
                "attempts_variable": { "type": "string" }
            },
            "required": ["action"]
        })
    }

    fn type_name() -> &'static str {
        "retry"
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
        let max_attempts = self.max_retries.saturating_add(1);
        let mut delay = self.delay_seconds;
        let mut attempts = 0;

        let last = loop {
            ctx.check_cancelled()?;
            attempts += 1;
            let result = execute_child(self.action.as_ref(), ctx).await?;
            if result.is_success() || attempts >= max_attempts {
                break result;
            }

            debug!("retry {}: attempt {}/{} failed: {}", self.id, attempts, max_attempts, result.message());
            ctx.sleep(Duration::try_from_secs_f64(delay).unwrap_or(Duration::MAX)).await?;
            delay *= self.backoff_factor;
        };

        let success = last.is_success();
        if let Some(name) = &self.result_variable {
            ctx.set_variable(name, Value::Bool(success));
        }
        if let Some(name) = &self.attempts_variable {
            ctx.set_variable(name, json!(attempts));
        }

        let last_error = if success {
            Value::Null
        } else {
            ErrorContext::from_result(&last).with_context("action_id", self.action.id()).to_value()
        };
        let data = Vars::new().with("attempts", attempts).with("last_result", last.to_value()).with("last_error", last_error);

        if success {
            Ok(ActionResult::success(format!("succeeded after {} attempt(s)", attempts)).with_data(data))
        } else {
            warn!("retry {} gave up after {} attempts", self.id, attempts);
            Ok(ActionResult::failure(format!("failed after {} attempt(s): {}", attempts, last.message())).with_data(data))
        }
    }
}
