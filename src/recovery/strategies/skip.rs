use async_trait::async_trait;

use crate::recovery::{ErrorCategory, ErrorContext, RecoveryResult, RecoveryScope, RecoveryStrategy};

/// Acknowledge the error and carry on without a payload.
///
/// Applies to every non-critical error except configuration and permission
/// problems, which skipping would only hide.
#[derive(Debug, Clone, Default)]
pub struct SkipStrategy;

#[async_trait]
impl RecoveryStrategy for SkipStrategy {
    fn name(&self) -> &str {
        "skip"
    }

    fn can_recover(
        &self,
        error: &ErrorContext,
    ) -> bool {
        !error.severity.is_critical() && !matches!(error.category, ErrorCategory::Configuration | ErrorCategory::Permission)
    }

    async fn recover(
        &self,
        error: &ErrorContext,
        _scope: &mut RecoveryScope<'_>,
    ) -> RecoveryResult {
        RecoveryResult::succeeded(format!("skipped after error: {}", error.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{recovery::ErrorSeverity, runtime::ExecutionContext};

    #[tokio::test]
    async fn test_skip() {
        let error = ErrorContext::new("optional banner missing", ErrorCategory::Element).with_severity(ErrorSeverity::Warning);
        assert!(SkipStrategy.can_recover(&error));

        let mut ctx = ExecutionContext::new();
        let result = SkipStrategy.recover(&error, &mut RecoveryScope::new(&mut ctx)).await;
        assert!(result.success);
        assert!(result.data.is_none());
    }

    #[test]
    fn test_skip_refuses() {
        assert!(!SkipStrategy.can_recover(&ErrorContext::new("x", ErrorCategory::Permission)));
        assert!(!SkipStrategy.can_recover(&ErrorContext::new("x", ErrorCategory::Element).with_severity(ErrorSeverity::Critical)));
    }
}
