use async_trait::async_trait;

use crate::recovery::{ErrorContext, RecoveryResult, RecoveryScope, RecoveryStrategy};

/// A named, reusable bundle of strategies.
///
/// Uses the same first-match-wins rule as the
/// [`ErrorHandler`](crate::ErrorHandler): the first sub-strategy that claims
/// the error decides the outcome.
pub struct CompositeStrategy {
    name: String,
    strategies: Vec<Box<dyn RecoveryStrategy>>,
}

impl CompositeStrategy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            strategies: Vec::new(),
        }
    }

    pub fn with_strategy(
        mut self,
        strategy: impl RecoveryStrategy + 'static,
    ) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

#[async_trait]
impl RecoveryStrategy for CompositeStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_recover(
        &self,
        error: &ErrorContext,
    ) -> bool {
        self.strategies.iter().any(|s| s.can_recover(error))
    }

    async fn recover(
        &self,
        error: &ErrorContext,
        scope: &mut RecoveryScope<'_>,
    ) -> RecoveryResult {
        match self.strategies.iter().find(|s| s.can_recover(error)) {
            Some(strategy) => strategy.recover(error, scope).await,
            None => RecoveryResult::failed(format!("no strategy in '{}' can recover", self.name)),
        }
    }
}
