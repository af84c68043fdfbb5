//! Boolean conditions evaluated against the execution context.

mod compare;
mod models;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{Result, runtime::ExecutionContext};

pub use compare::CompareCondition;
pub use models::{ComparisonOperator, ConditionValue, LogicalOperator};

#[typetag::serialize(tag = "type")]
pub trait Condition: Send + Sync {
    /// Creates a new instance of the condition from its definition.
    fn create(params: Value) -> Result<Self>
    where
        Self: Sized;

    fn schema() -> Value
    where
        Self: Sized;

    fn type_name() -> &'static str
    where
        Self: Sized;

    fn condition_type(&self) -> &str;

    /// Evaluates the condition. Reads only; never changes the context.
    fn evaluate(
        &self,
        ctx: &ExecutionContext,
    ) -> Result<bool>;
}

/// A fixed answer.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct ConstantCondition {
    value: bool,
}

impl ConstantCondition {
    pub fn new(value: bool) -> Self {
        Self {
            value,
        }
    }
}

#[typetag::serialize(name = "constant")]
impl Condition for ConstantCondition {
    fn create(params: Value) -> Result<Self> {
        jsonschema::validate(&Self::schema(), &params)?;
        Ok(serde_json::from_value::<Self>(params)?)
    }

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "value": { "type": "boolean" }
            },
            "required": ["value"]
        })
    }

    fn type_name() -> &'static str {
        "constant"
    }

    fn condition_type(&self) -> &str {
        Self::type_name()
    }

    fn evaluate(
        &self,
        _ctx: &ExecutionContext,
    ) -> Result<bool> {
        Ok(self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::actions::ActionRegistry;

    #[test]
    fn test_registry_builds_conditions() {
        let registry = ActionRegistry::with_builtins();
        let condition = registry.create_condition(json!({"type": "constant", "value": true})).unwrap();
        assert!(condition.evaluate(&ExecutionContext::new()).unwrap());
        assert_eq!(serde_json::to_value(&*condition).unwrap(), json!({"type": "constant", "value": true}));

        let err = registry.create_condition(json!({"type": "element_visible"})).err().unwrap();
        assert_eq!(err.to_string(), "unknown condition type: element_visible");
    }
}
