use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::recovery::{ErrorCategory, ErrorContext, ErrorSeverity, RecoveryResult, RecoveryScope, RecoveryStrategy};

/// Context key marking an error as caused by an expired session.
pub const AUTH_REQUIRED_KEY: &str = "auth_required";

/// Log in again by running a login action built from a stored definition.
///
/// Applies to permission errors and to any error flagged with
/// `auth_required: true` in its context. The login action is constructed
/// through the context's action registry; without one the recovery fails.
#[derive(Debug, Clone)]
pub struct ReauthenticateStrategy {
    login_action: Value,
    rerun_action: bool,
}

impl ReauthenticateStrategy {
    /// `login_action` is an action definition, e.g. a `try_catch` around the login steps.
    pub fn new(login_action: Value) -> Self {
        Self {
            login_action,
            rerun_action: true,
        }
    }

    pub fn with_rerun_action(
        mut self,
        rerun_action: bool,
    ) -> Self {
        self.rerun_action = rerun_action;
        self
    }
}

#[async_trait]
impl RecoveryStrategy for ReauthenticateStrategy {
    fn name(&self) -> &str {
        "reauthenticate"
    }

    fn can_recover(
        &self,
        error: &ErrorContext,
    ) -> bool {
        let auth_related = error.category == ErrorCategory::Permission || error.context.get::<bool>(AUTH_REQUIRED_KEY) == Some(true);
        auth_related && error.severity < ErrorSeverity::Fatal
    }

    async fn recover(
        &self,
        error: &ErrorContext,
        scope: &mut RecoveryScope<'_>,
    ) -> RecoveryResult {
        let Some(registry) = scope.ctx.registry() else {
            return RecoveryResult::failed("no action factory available in context");
        };

        let login = match registry.create(self.login_action.clone()) {
            Ok(action) => action,
            Err(err) => {
                let new_error = ErrorContext::from_error(&err).with_recoverable(false).with_cause(error.clone());
                return RecoveryResult::failed(format!("cannot build login action: {}", err)).with_new_error(new_error);
            }
        };

        match login.execute(&mut *scope.ctx).await {
            Ok(result) if result.is_success() => info!("re-authenticated with action {}", login.id()),
            Ok(result) => {
                return RecoveryResult::failed(format!("re-authentication failed: {}", result.message()))
                    .with_new_error(ErrorContext::from_result(&result).with_cause(error.clone()));
            }
            Err(err) => {
                return RecoveryResult::failed(format!("re-authentication failed: {}", err)).with_new_error(ErrorContext::from_error(&err).with_cause(error.clone()));
            }
        }

        let Some(action) = scope.action.filter(|_| self.rerun_action) else {
            return RecoveryResult::succeeded("re-authenticated");
        };

        match action.execute(&mut *scope.ctx).await {
            Ok(result) if result.is_success() => RecoveryResult::succeeded("re-authenticated and action succeeded").with_data(result.to_value()),
            Ok(result) => RecoveryResult::failed("action failed again after re-authentication").with_new_error(ErrorContext::from_result(&result).with_cause(error.clone())),
            Err(err) => RecoveryResult::failed("action failed again after re-authentication").with_new_error(ErrorContext::from_error(&err).with_cause(error.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::{runtime::ExecutionContext, workflow::actions::ActionRegistry};

    fn login_definition() -> Value {
        json!({"type": "set_variable", "id": "login", "name": "session", "value": "fresh"})
    }

    #[test]
    fn test_applicability() {
        let strategy = ReauthenticateStrategy::new(login_definition());
        assert!(strategy.can_recover(&ErrorContext::new("401", ErrorCategory::Permission)));
        assert!(strategy.can_recover(&ErrorContext::new("redirected", ErrorCategory::Navigation).with_context(AUTH_REQUIRED_KEY, true)));
        assert!(!strategy.can_recover(&ErrorContext::new("redirected", ErrorCategory::Navigation)));
    }

    #[tokio::test]
    async fn test_missing_factory_is_a_failed_recovery() {
        let mut ctx = ExecutionContext::new();
        let result = ReauthenticateStrategy::new(login_definition())
            .recover(&ErrorContext::new("401", ErrorCategory::Permission), &mut RecoveryScope::new(&mut ctx))
            .await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_runs_login_action() {
        let registry = Arc::new(ActionRegistry::with_builtins());
        let mut ctx = ExecutionContext::new().with_registry(registry);
        let result = ReauthenticateStrategy::new(login_definition())
            .recover(&ErrorContext::new("401", ErrorCategory::Permission), &mut RecoveryScope::new(&mut ctx))
            .await;

        assert!(result.success, "{:?}", result);
        assert_eq!(ctx.get_variable("session"), Some(&json!("fresh")));
    }

    #[tokio::test]
    async fn test_unknown_login_type_is_not_recoverable() {
        let registry = Arc::new(ActionRegistry::with_builtins());
        let mut ctx = ExecutionContext::new().with_registry(registry);
        let result = ReauthenticateStrategy::new(json!({"type": "browser_login"}))
            .recover(&ErrorContext::new("401", ErrorCategory::Permission), &mut RecoveryScope::new(&mut ctx))
            .await;

        assert!(!result.success);
        assert!(!result.new_error.unwrap().recoverable);
    }
}
