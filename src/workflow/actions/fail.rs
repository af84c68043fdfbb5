use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    Result,
    common::Vars,
    recovery::ErrorCategory,
    runtime::ExecutionContext,
    utils,
    workflow::actions::{Action, ActionRegistry, ActionResult, parse_params},
};

/// Always fails with `message`.
///
/// When a `category` is given it is attached to the result data so error
/// classification does not have to guess from the message.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FailAction {
    #[serde(default = "utils::shortid")]
    id: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_message")]
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<ErrorCategory>,
}

fn default_message() -> String {
    "failed".to_string()
}

#[async_trait]
#[typetag::serialize(name = "fail")]
impl Action for FailAction {
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
                "message": { "type": "string" },
                "category": { "type": "string" }
            }
        })
    }

    fn type_name() -> &'static str {
        "fail"
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
        let mut data = Vars::new();
        if let Some(category) = self.category {
            data.set("category", category);
        }
        Ok(ActionResult::failure(&self.message).with_data(data))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_fail_action() {
        let registry = ActionRegistry::new();
        let action = FailAction::create(json!({"type": "fail", "message": "login button missing", "category": "element"}), &registry).unwrap();

        let result = action.execute(&mut ExecutionContext::new()).await.unwrap();
        assert!(!result.is_success());
        assert_eq!(result.message(), "login button missing");
        assert_eq!(result.data().get::<ErrorCategory>("category"), Some(ErrorCategory::Element));
    }

    #[test]
    fn test_unknown_category_rejected() {
        assert!(FailAction::create(json!({"type": "fail", "category": "cosmic_rays"}), &ActionRegistry::new()).is_err());
    }
}
