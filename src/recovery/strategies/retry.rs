use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    config::RecoveryConfig,
    recovery::{ErrorContext, RecoveryResult, RecoveryScope, RecoveryStrategy},
};

/// Negative or non-finite seconds clamp to zero.
fn seconds(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

/// Re-run the failing action with exponential backoff.
///
/// Applies to transient categories (network, timeout, element, navigation)
/// below critical severity. Attempts are counted in the execution context
/// under the error's key, so handling the same logical error again continues
/// the count instead of starting over. The counter is cleared on success.
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    max_retries: u32,
    delay: Duration,
    backoff_factor: f64,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), 2.0)
    }
}

impl RetryStrategy {
    pub fn new(
        max_retries: u32,
        delay: Duration,
        backoff_factor: f64,
    ) -> Self {
        Self {
            max_retries,
            delay,
            backoff_factor,
        }
    }

    pub fn from_config(config: &RecoveryConfig) -> Self {
        Self::new(config.max_retries, seconds(config.delay_seconds), config.backoff_factor)
    }

    fn delay_for(
        &self,
        attempt: u32,
    ) -> Duration {
        let factor = self.backoff_factor.powi(attempt.saturating_sub(1) as i32);
        Duration::try_from_secs_f64(self.delay.as_secs_f64() * factor).unwrap_or(Duration::MAX)
    }
}

#[async_trait]
impl RecoveryStrategy for RetryStrategy {
    fn name(&self) -> &str {
        "retry"
    }

    fn can_recover(
        &self,
        error: &ErrorContext,
    ) -> bool {
        error.category.is_transient() && !error.severity.is_critical()
    }

    async fn recover(
        &self,
        error: &ErrorContext,
        scope: &mut RecoveryScope<'_>,
    ) -> RecoveryResult {
        retry_action(error, scope, self.max_retries, |attempt| self.delay_for(attempt)).await
    }
}

/// Wait a fixed time, then re-run the failing action.
///
/// Same applicability and counting as [`RetryStrategy`], without backoff.
#[derive(Debug, Clone)]
pub struct WaitAndRetryStrategy {
    max_retries: u32,
    wait: Duration,
}

impl Default for WaitAndRetryStrategy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

impl WaitAndRetryStrategy {
    pub fn new(
        max_retries: u32,
        wait: Duration,
    ) -> Self {
        Self {
            max_retries,
            wait,
        }
    }

    pub fn from_config(config: &RecoveryConfig) -> Self {
        Self::new(config.max_retries, seconds(config.wait_seconds))
    }
}

#[async_trait]
impl RecoveryStrategy for WaitAndRetryStrategy {
    fn name(&self) -> &str {
        "wait_and_retry"
    }

    fn can_recover(
        &self,
        error: &ErrorContext,
    ) -> bool {
        error.category.is_transient() && !error.severity.is_critical()
    }

    async fn recover(
        &self,
        error: &ErrorContext,
        scope: &mut RecoveryScope<'_>,
    ) -> RecoveryResult {
        retry_action(error, scope, self.max_retries, |_| self.wait).await
    }
}

async fn retry_action(
    error: &ErrorContext,
    scope: &mut RecoveryScope<'_>,
    max_retries: u32,
    delay_for: impl Fn(u32) -> Duration + Send + Sync,
) -> RecoveryResult {
    let Some(action) = scope.action else {
        return RecoveryResult::failed("no action available to retry");
    };

    let key = error.key();
    let mut last_error = error.clone();

    loop {
        if scope.ctx.retry_count(&key) >= max_retries {
            warn!(key = %key, max_retries, "retry limit reached");
            let exhausted = ErrorContext::new(format!("retry limit of {} reached: {}", max_retries, last_error.message), last_error.category)
                .with_recoverable(false)
                .with_cause(last_error);
            return RecoveryResult::failed(format!("gave up after {} retries", max_retries)).with_new_error(exhausted);
        }

        let attempt = scope.ctx.increment_retry_count(&key);
        let delay = delay_for(attempt);
        debug!(key = %key, attempt, delay_ms = delay.as_millis() as u64, "retrying action {}", action.id());

        if let Err(err) = scope.ctx.sleep(delay).await {
            return RecoveryResult::failed(format!("retry interrupted: {}", err)).with_new_error(ErrorContext::from_error(&err).with_cause(error.clone()));
        }

        match action.execute(&mut *scope.ctx).await {
            Ok(result) if result.is_success() => {
                scope.ctx.reset_retry_count(&key);
                return RecoveryResult::succeeded(format!("recovered after {} retr{}", attempt, if attempt == 1 { "y" } else { "ies" }))
                    .with_data(result.to_value());
            }
            Ok(result) => {
                last_error = ErrorContext::from_result(&result).with_context("action_id", action.id()).with_cause(error.clone());
            }
            Err(err) => {
                last_error = ErrorContext::from_error(&err).with_context("action_id", action.id()).with_cause(error.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        AutoflowError,
        recovery::{ErrorCategory, ErrorSeverity},
        runtime::ExecutionContext,
        workflow::actions::testing::{Outcome, RecordingSleeper, ScriptedAction},
    };

    fn network_error() -> ErrorContext {
        ErrorContext::new("connection reset", ErrorCategory::Network).with_context("action_id", "fetch")
    }

    #[test]
    fn test_applicability() {
        let strategy = RetryStrategy::default();
        assert!(strategy.can_recover(&network_error()));
        assert!(strategy.can_recover(&ErrorContext::new("x", ErrorCategory::Timeout)));
        assert!(!strategy.can_recover(&ErrorContext::new("x", ErrorCategory::Validation)));
        assert!(!strategy.can_recover(&network_error().with_severity(ErrorSeverity::Critical)));
        assert!(!WaitAndRetryStrategy::default().can_recover(&network_error().with_severity(ErrorSeverity::Fatal)));
    }

    #[test]
    fn test_from_config_clamps_bad_delays() {
        let config = RecoveryConfig {
            delay_seconds: -1.0,
            wait_seconds: f64::NAN,
            ..RecoveryConfig::default()
        };
        assert_eq!(RetryStrategy::from_config(&config).delay, Duration::ZERO);
        assert_eq!(WaitAndRetryStrategy::from_config(&config).wait, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_retry_recovers_with_backoff() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let mut ctx = ExecutionContext::new().with_sleeper(sleeper.clone());
        let action = ScriptedAction::new("fetch", vec![Outcome::Fail("still down"), Outcome::Succeed]);

        let strategy = RetryStrategy::new(3, Duration::from_millis(100), 2.0);
        let mut scope = RecoveryScope::new(&mut ctx).with_action(&action);
        let result = strategy.recover(&network_error(), &mut scope).await;

        assert!(result.success, "{:?}", result);
        assert_eq!(action.calls(), 2);
        assert_eq!(sleeper.recorded(), vec![Duration::from_millis(100), Duration::from_millis(200)]);
        assert_eq!(ctx.retry_count(&network_error().key()), 0);
    }

    #[tokio::test]
    async fn test_retry_count_converges_across_calls() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let mut ctx = ExecutionContext::new().with_sleeper(sleeper.clone());
        let action = ScriptedAction::always("fetch", Outcome::Error(AutoflowError::Network("down".to_string())));
        let strategy = WaitAndRetryStrategy::new(2, Duration::from_millis(50));

        let first = strategy.recover(&network_error(), &mut RecoveryScope::new(&mut ctx).with_action(&action)).await;
        assert!(!first.success);
        assert_eq!(action.calls(), 2);
        let new_error = first.new_error.unwrap();
        assert!(!new_error.recoverable);
        assert_eq!(new_error.root_cause().message, "connection reset");

        let second = strategy.recover(&network_error(), &mut RecoveryScope::new(&mut ctx).with_action(&action)).await;
        assert!(!second.success);
        assert_eq!(action.calls(), 2);
        assert_eq!(sleeper.recorded(), vec![Duration::from_millis(50); 2]);
    }

    #[tokio::test]
    async fn test_retry_without_action_fails() {
        let mut ctx = ExecutionContext::new();
        let result = RetryStrategy::default().recover(&network_error(), &mut RecoveryScope::new(&mut ctx)).await;
        assert!(!result.success);
    }
}
