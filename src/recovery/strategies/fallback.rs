use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::{
    Result,
    recovery::{ErrorCategory, ErrorContext, RecoveryResult, RecoveryScope, RecoveryStrategy},
};

type FallbackFactory = Arc<dyn Fn(&ErrorContext) -> Result<Value> + Send + Sync>;

#[derive(Clone)]
enum FallbackSource {
    Value(Value),
    Factory(FallbackFactory),
}

/// Substitute a value for the failed operation.
///
/// Applies to validation, element and variable errors below critical
/// severity. A factory error turns into a non-recoverable error in
/// `new_error`, so a fallback never falls back again.
#[derive(Clone)]
pub struct FallbackStrategy {
    source: FallbackSource,
    categories: Vec<ErrorCategory>,
}

impl FallbackStrategy {
    pub fn value(value: Value) -> Self {
        Self {
            source: FallbackSource::Value(value),
            categories: vec![ErrorCategory::Validation, ErrorCategory::Element, ErrorCategory::Variable],
        }
    }

    pub fn factory(f: impl Fn(&ErrorContext) -> Result<Value> + Send + Sync + 'static) -> Self {
        Self {
            source: FallbackSource::Factory(Arc::new(f)),
            ..Self::value(Value::Null)
        }
    }

    /// Restrict or widen the categories this fallback answers for.
    pub fn with_categories(
        mut self,
        categories: Vec<ErrorCategory>,
    ) -> Self {
        self.categories = categories;
        self
    }
}

#[async_trait]
impl RecoveryStrategy for FallbackStrategy {
    fn name(&self) -> &str {
        "fallback"
    }

    fn can_recover(
        &self,
        error: &ErrorContext,
    ) -> bool {
        self.categories.contains(&error.category) && !error.severity.is_critical()
    }

    async fn recover(
        &self,
        error: &ErrorContext,
        _scope: &mut RecoveryScope<'_>,
    ) -> RecoveryResult {
        let value = match &self.source {
            FallbackSource::Value(value) => value.clone(),
            FallbackSource::Factory(factory) => match factory(error) {
                Ok(value) => value,
                Err(err) => {
                    warn!("fallback factory failed: {}", err);
                    let new_error = ErrorContext::from_error(&err).with_recoverable(false).with_cause(error.clone());
                    return RecoveryResult::failed(format!("fallback failed: {}", err)).with_new_error(new_error);
                }
            },
        };
        RecoveryResult::succeeded("fallback value used").with_data(value)
    }
}
