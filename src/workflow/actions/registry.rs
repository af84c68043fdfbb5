use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    AutoflowError, Result,
    workflow::{
        actions::{
            Action, FailAction, ForEachAction, LoopControlAction, NoopAction, RetryAction, SetVariableAction, TryCatchAction, WhileAction,
        },
        condition::{CompareCondition, Condition, ConstantCondition},
    },
};

type ActionConstructor = Arc<dyn Fn(Value, &ActionRegistry) -> Result<Box<dyn Action>> + Send + Sync>;
type ConditionConstructor = Arc<dyn Fn(Value, &ActionRegistry) -> Result<Box<dyn Condition>> + Send + Sync>;

/// Maps type names to constructors for actions and conditions.
///
/// The registry is an ordinary value: build one, register what the
/// environment provides, and share it with `Arc`. Nothing is registered
/// implicitly; call [`ActionRegistry::register_builtins`] or use
/// [`ActionRegistry::with_builtins`].
#[derive(Default)]
pub struct ActionRegistry {
    actions: RwLock<HashMap<String, ActionConstructor>>,
    conditions: RwLock<HashMap<String, ConditionConstructor>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in action and condition.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        if let Err(err) = registry.register_builtins() {
            warn!("failed to register built-in actions: {}", err);
        }
        registry
    }

    /// Register all built-in actions and conditions.
    pub fn register_builtins(&self) -> Result<()> {
        self.register::<ForEachAction>()?;
        self.register::<RetryAction>()?;
        self.register::<TryCatchAction>()?;
        self.register::<WhileAction>()?;
        self.register::<SetVariableAction>()?;
        self.register::<LoopControlAction>()?;
        self.register::<NoopAction>()?;
        self.register::<FailAction>()?;
        self.register_condition::<ConstantCondition>()?;
        self.register_condition::<CompareCondition>()?;
        Ok(())
    }

    /// Register `A` under [`Action::type_name`].
    pub fn register<A: Action + 'static>(&self) -> Result<()> {
        self.register_fn(A::type_name(), |params, registry| Ok(Box::new(A::create(params, registry)?)))
    }

    /// Register an arbitrary constructor under `type_name`, replacing any previous one.
    pub fn register_fn<F>(
        &self,
        type_name: &str,
        constructor: F,
    ) -> Result<()>
    where
        F: Fn(Value, &ActionRegistry) -> Result<Box<dyn Action>> + Send + Sync + 'static,
    {
        check_type_name(type_name)?;
        let mut actions = self.actions.write().map_err(|err| AutoflowError::Registry(err.to_string()))?;
        if actions.insert(type_name.to_string(), Arc::new(constructor)).is_some() {
            warn!("action type '{}' registered again, previous constructor replaced", type_name);
        } else {
            debug!("registered action type '{}'", type_name);
        }
        Ok(())
    }

    pub fn register_condition<C: Condition + 'static>(&self) -> Result<()> {
        self.register_condition_fn(C::type_name(), |params, _| Ok(Box::new(C::create(params)?)))
    }

    pub fn register_condition_fn<F>(
        &self,
        type_name: &str,
        constructor: F,
    ) -> Result<()>
    where
        F: Fn(Value, &ActionRegistry) -> Result<Box<dyn Condition>> + Send + Sync + 'static,
    {
        check_type_name(type_name)?;
        let mut conditions = self.conditions.write().map_err(|err| AutoflowError::Registry(err.to_string()))?;
        if conditions.insert(type_name.to_string(), Arc::new(constructor)).is_some() {
            warn!("condition type '{}' registered again, previous constructor replaced", type_name);
        }
        Ok(())
    }

    /// Build an action from its definition.
    ///
    /// The definition must be an object carrying a string `"type"`.
    pub fn create(
        &self,
        definition: Value,
    ) -> Result<Box<dyn Action>> {
        let type_name = definition_type(&definition)?;
        // The lock is released before the constructor runs, which may recurse into `create`.
        let constructor = {
            let actions = self.actions.read().map_err(|err| AutoflowError::Registry(err.to_string()))?;
            actions.get(&type_name).cloned().ok_or_else(|| AutoflowError::Registry(format!("unknown action type: {}", type_name)))?
        };

        let action = constructor(definition, self)?;
        if action.action_type() != type_name {
            return Err(AutoflowError::Registry(format!(
                "constructor for '{}' produced an action of type '{}'",
                type_name,
                action.action_type()
            )));
        }
        Ok(action)
    }

    pub fn create_all(
        &self,
        definitions: &[Value],
    ) -> Result<Vec<Box<dyn Action>>> {
        definitions.iter().map(|definition| self.create(definition.clone())).collect()
    }

    pub fn create_condition(
        &self,
        definition: Value,
    ) -> Result<Box<dyn Condition>> {
        let type_name = definition_type(&definition)?;
        let constructor = {
            let conditions = self.conditions.read().map_err(|err| AutoflowError::Registry(err.to_string()))?;
            conditions.get(&type_name).cloned().ok_or_else(|| AutoflowError::Registry(format!("unknown condition type: {}", type_name)))?
        };

        let condition = constructor(definition, self)?;
        if condition.condition_type() != type_name {
            return Err(AutoflowError::Registry(format!(
                "constructor for '{}' produced a condition of type '{}'",
                type_name,
                condition.condition_type()
            )));
        }
        Ok(condition)
    }

    pub fn contains(
        &self,
        type_name: &str,
    ) -> bool {
        self.actions.read().map(|actions| actions.contains_key(type_name)).unwrap_or(false)
    }

    /// Registered action type names, sorted.
    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.actions.read().map(|actions| actions.keys().cloned().collect()).unwrap_or_default();
        types.sort();
        types
    }

    /// Remove every registration.
    pub fn reset(&self) {
        if let Ok(mut actions) = self.actions.write() {
            actions.clear();
        }
        if let Ok(mut conditions) = self.conditions.write() {
            conditions.clear();
        }
    }
}

fn definition_type(definition: &Value) -> Result<String> {
    if !definition.is_object() {
        return Err(AutoflowError::Validation(format!("definition must be an object, got: {}", definition)));
    }
    definition
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AutoflowError::Validation("definition is missing a string \"type\"".to_string()))
}

/// Type names are non-empty snake_case ASCII: lowercase letters, digits and
/// underscores, starting with a letter.
fn check_type_name(type_name: &str) -> Result<()> {
    let mut chars = type_name.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_lowercase()) && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid {
        return Err(AutoflowError::Registry(format!("invalid action type name: '{}'", type_name)));
    }
    Ok(())
}
