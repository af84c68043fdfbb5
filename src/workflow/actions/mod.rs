mod fail;
mod for_each;
mod loop_control;
mod noop;
mod registry;
mod retry;
mod set_variable;
mod try_catch;
mod while_loop;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::{AutoflowError, Result, common::Vars, runtime::ExecutionContext};

pub use fail::FailAction;
pub use for_each::ForEachAction;
pub use loop_control::{LoopControlAction, LoopSignal};
pub use noop::NoopAction;
pub use registry::ActionRegistry;
pub use retry::RetryAction;
pub use set_variable::SetVariableAction;
pub use try_catch::TryCatchAction;
pub use while_loop::WhileAction;

/// Data key under which a converted exception message is stored.
pub const EXCEPTION_KEY: &str = "exception";

#[async_trait]
#[typetag::serialize(tag = "type")]
pub trait Action: Send + Sync {
    /// Creates a new instance of the action from its definition.
    ///
    /// # Arguments
    ///
    /// * `params` - The [`serde_json::Value`] definition of the action, `"type"` included.
    /// * `registry` - The [`ActionRegistry`] used to build nested actions.
    ///
    /// # Returns
    ///
    /// Returns a [`Result`] containing the created action instance.
    fn create(
        params: Value,
        registry: &ActionRegistry,
    ) -> Result<Self>
    where
        Self: Sized;

    /// Returns the JSON schema the definition is validated against.
    fn schema() -> Value
    where
        Self: Sized;

    /// Returns the type name the action is registered and serialized under.
    fn type_name() -> &'static str
    where
        Self: Sized;

    fn id(&self) -> &str;

    fn description(&self) -> &str;

    /// Returns the type discriminator of this instance.
    fn action_type(&self) -> &str;

    /// Executes the action against the shared context.
    ///
    /// # Returns
    ///
    /// `Ok` with a failed [`ActionResult`] is an ordinary failure. `Err` is an
    /// unexpected exception; composite actions convert it into a failure.
    async fn execute(
        &self,
        ctx: &mut ExecutionContext,
    ) -> Result<ActionResult>;
}

/// Outcome of one action execution.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ActionResult {
    success: bool,
    message: String,
    #[serde(default)]
    data: Vars,
}

impl ActionResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Vars::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: Vars::new(),
        }
    }

    pub fn with_data(
        mut self,
        data: Vars,
    ) -> Self {
        self.data = data;
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> &Vars {
        &self.data
    }

    /// Exception text when this failure was converted from a raised error.
    pub fn exception(&self) -> Option<String> {
        self.data.get::<String>(EXCEPTION_KEY)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Serialize an action tree into its definition form.
///
/// `registry.create(to_definition(a)?)` rebuilds an equivalent tree.
pub fn to_definition(action: &dyn Action) -> Result<Value> {
    Ok(serde_json::to_value(action)?)
}

/// Run a child action, converting a raised error into a failed result.
///
/// Cancellation is not an exception and is passed through.
pub(crate) async fn execute_child(
    action: &dyn Action,
    ctx: &mut ExecutionContext,
) -> Result<ActionResult> {
    match action.execute(ctx).await {
        Ok(result) => Ok(result),
        Err(AutoflowError::Cancelled) => Err(AutoflowError::Cancelled),
        Err(err) => {
            warn!("action {} ({}) raised: {}", action.id(), action.action_type(), err);
            Ok(ActionResult::failure(format!("action {} raised: {}", action.id(), err)).with_data(Vars::new().with(EXCEPTION_KEY, err.to_string())))
        }
    }
}

/// Validate `params` against `schema`, then deserialize it.
pub(crate) fn parse_params<T: serde::de::DeserializeOwned>(
    params: Value,
    schema: &Value,
) -> Result<T> {
    jsonschema::validate(schema, &params)?;
    Ok(serde_json::from_value::<T>(params)?)
}
