use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::recovery::{ErrorCategory, ErrorContext, ErrorSeverity, RecoveryResult, RecoveryScope, RecoveryStrategy};

/// Reload the page through the context's driver, optionally re-running the failing action.
///
/// A context without a driver is a recovery failure, not an error.
#[derive(Debug, Clone)]
pub struct RefreshPageStrategy {
    settle: Duration,
    rerun_action: bool,
}

impl Default for RefreshPageStrategy {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(1),
            rerun_action: true,
        }
    }
}

impl RefreshPageStrategy {
    pub fn new(
        settle: Duration,
        rerun_action: bool,
    ) -> Self {
        Self {
            settle,
            rerun_action,
        }
    }
}

#[async_trait]
impl RecoveryStrategy for RefreshPageStrategy {
    fn name(&self) -> &str {
        "refresh_page"
    }

    fn can_recover(
        &self,
        error: &ErrorContext,
    ) -> bool {
        matches!(error.category, ErrorCategory::Navigation | ErrorCategory::Element | ErrorCategory::Timeout) && error.severity < ErrorSeverity::Fatal
    }

    async fn recover(
        &self,
        error: &ErrorContext,
        scope: &mut RecoveryScope<'_>,
    ) -> RecoveryResult {
        let Some(driver) = scope.ctx.driver() else {
            return RecoveryResult::failed("no page driver available in context");
        };

        if let Err(err) = driver.refresh().await {
            return RecoveryResult::failed(format!("page refresh failed: {}", err)).with_new_error(ErrorContext::from_error(&err).with_cause(error.clone()));
        }
        info!("page refreshed after: {}", error.message);

        if let Err(err) = scope.ctx.sleep(self.settle).await {
            return RecoveryResult::failed(format!("page refresh interrupted: {}", err));
        }

        let Some(action) = scope.action.filter(|_| self.rerun_action) else {
            return RecoveryResult::succeeded("page refreshed");
        };

        match action.execute(&mut *scope.ctx).await {
            Ok(result) if result.is_success() => RecoveryResult::succeeded("page refreshed and action succeeded").with_data(result.to_value()),
            Ok(result) => RecoveryResult::failed("action failed again after page refresh").with_new_error(ErrorContext::from_result(&result).with_cause(error.clone())),
            Err(err) => RecoveryResult::failed("action failed again after page refresh").with_new_error(ErrorContext::from_error(&err).with_cause(error.clone())),
        }
    }
}
