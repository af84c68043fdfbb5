use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    config::{RecoveryConfig, StrategyKind},
    recovery::{
        ErrorCategory, ErrorContext, ErrorSeverity, RecoveryResult, RecoveryScope, RecoveryStrategy, RefreshPageStrategy, RetryStrategy, SkipStrategy,
        WaitAndRetryStrategy,
    },
    utils::time::time_millis,
};

pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Running counters over every error the handler has seen.
///
/// Unlike the history these are never evicted, only reset by
/// [`ErrorHandler::clear_history`].
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorStatistics {
    pub total: usize,
    pub recovered: usize,
    pub unrecovered: usize,
    pub by_category: BTreeMap<ErrorCategory, usize>,
    pub by_severity: BTreeMap<ErrorSeverity, usize>,
}

/// Records errors and offers them to an ordered strategy chain.
pub struct ErrorHandler {
    strategies: Vec<Box<dyn RecoveryStrategy>>,
    history: VecDeque<ErrorContext>,
    capacity: usize,
    stats: ErrorStatistics,
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl ErrorHandler {
    /// A handler with no strategies keeping at most `capacity` errors.
    pub fn new(capacity: usize) -> Self {
        Self {
            strategies: Vec::new(),
            history: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity,
            stats: ErrorStatistics::default(),
        }
    }

    /// A handler preloaded with the strategies listed in `config.strategies`, in that order.
    pub fn with_default_strategies(
        capacity: usize,
        config: &RecoveryConfig,
    ) -> Self {
        let mut handler = Self::new(capacity);
        for kind in &config.strategies {
            match kind {
                StrategyKind::Retry => handler.add_strategy(RetryStrategy::from_config(config)),
                StrategyKind::WaitAndRetry => handler.add_strategy(WaitAndRetryStrategy::from_config(config)),
                StrategyKind::RefreshPage => handler.add_strategy(RefreshPageStrategy::default()),
                StrategyKind::Skip => handler.add_strategy(SkipStrategy),
            }
        }
        handler
    }

    /// Append a strategy. Earlier strategies take precedence.
    pub fn add_strategy(
        &mut self,
        strategy: impl RecoveryStrategy + 'static,
    ) {
        self.strategies.push(Box::new(strategy));
    }

    pub fn with_strategy(
        mut self,
        strategy: impl RecoveryStrategy + 'static,
    ) -> Self {
        self.add_strategy(strategy);
        self
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Record `error` and try to recover from it.
    ///
    /// Non-recoverable errors are recorded but never offered to a strategy.
    /// Otherwise the first strategy whose `can_recover` accepts the error
    /// runs and its result is returned unchanged.
    pub async fn handle(
        &mut self,
        mut error: ErrorContext,
        scope: &mut RecoveryScope<'_>,
    ) -> RecoveryResult {
        error.timestamp = Some(time_millis());
        self.record(error.clone());

        if !error.recoverable {
            debug!("skipping recovery for non-recoverable error: {}", error);
            self.stats.unrecovered += 1;
            return RecoveryResult::failed(format!("error is not recoverable: {}", error.message));
        }

        let Some(strategy) = self.strategies.iter().find(|s| s.can_recover(&error)) else {
            warn!("no recovery strategy for: {}", error);
            self.stats.unrecovered += 1;
            return RecoveryResult::failed(format!("no suitable strategy for: {}", error.message));
        };

        info!("recovering from {} with strategy {}", error, strategy.name());
        let result = strategy.recover(&error, scope).await;
        if result.success {
            self.stats.recovered += 1;
        } else {
            self.stats.unrecovered += 1;
        }
        result
    }

    fn record(
        &mut self,
        error: ErrorContext,
    ) {
        self.stats.total += 1;
        *self.stats.by_category.entry(error.category).or_default() += 1;
        *self.stats.by_severity.entry(error.severity).or_default() += 1;

        if self.capacity == 0 {
            return;
        }
        while self.history.len() >= self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(error);
    }

    /// Recorded errors, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &ErrorContext> {
        self.history.iter()
    }

    /// The `n` most recent errors, oldest first.
    pub fn recent(
        &self,
        n: usize,
    ) -> Vec<&ErrorContext> {
        let skip = self.history.len().saturating_sub(n);
        self.history.iter().skip(skip).collect()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        self.stats = ErrorStatistics::default();
    }

    pub fn statistics(&self) -> &ErrorStatistics {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;

    use super::*;
    use crate::runtime::ExecutionContext;

    /// Strategy with fixed answers that counts how it was used.
    struct CountingStrategy {
        name: &'static str,
        claims: bool,
        succeeds: bool,
        asked: Arc<AtomicUsize>,
        invoked: Arc<AtomicUsize>,
    }

    impl CountingStrategy {
        fn new(
            name: &'static str,
            claims: bool,
            succeeds: bool,
        ) -> Self {
            Self {
                name,
                claims,
                succeeds,
                asked: Arc::new(AtomicUsize::new(0)),
                invoked: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn counters(&self) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
            (self.asked.clone(), self.invoked.clone())
        }
    }

    #[async_trait]
    impl RecoveryStrategy for CountingStrategy {
        fn name(&self) -> &str {
            self.name
        }

        fn can_recover(
            &self,
            _error: &ErrorContext,
        ) -> bool {
            self.asked.fetch_add(1, Ordering::SeqCst);
            self.claims
        }

        async fn recover(
            &self,
            _error: &ErrorContext,
            _scope: &mut RecoveryScope<'_>,
        ) -> RecoveryResult {
            self.invoked.fetch_add(1, Ordering::SeqCst);
            if self.succeeds {
                RecoveryResult::succeeded(self.name)
            } else {
                RecoveryResult::failed(self.name)
            }
        }
    }

    fn error() -> ErrorContext {
        ErrorContext::new("element not found", ErrorCategory::Element)
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let declines = CountingStrategy::new("declines", false, false);
        let succeeds = CountingStrategy::new("succeeds", true, true);
        let fails = CountingStrategy::new("fails", true, false);
        let (declines_asked, declines_invoked) = declines.counters();
        let (_, succeeds_invoked) = succeeds.counters();
        let (fails_asked, fails_invoked) = fails.counters();

        let mut handler = ErrorHandler::default().with_strategy(declines).with_strategy(succeeds).with_strategy(fails);
        let mut ctx = ExecutionContext::new();
        let result = handler.handle(error(), &mut RecoveryScope::new(&mut ctx)).await;

        assert!(result.success);
        assert_eq!(result.message, "succeeds");
        assert_eq!(declines_asked.load(Ordering::SeqCst), 1);
        assert_eq!(declines_invoked.load(Ordering::SeqCst), 0);
        assert_eq!(succeeds_invoked.load(Ordering::SeqCst), 1);
        assert_eq!(fails_asked.load(Ordering::SeqCst), 0);
        assert_eq!(fails_invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_recoverable_short_circuits() {
        let strategy = CountingStrategy::new("any", true, true);
        let (asked, invoked) = strategy.counters();
        let mut handler = ErrorHandler::default().with_strategy(strategy);

        let mut ctx = ExecutionContext::new();
        let result = handler.handle(error().with_recoverable(false), &mut RecoveryScope::new(&mut ctx)).await;

        assert!(!result.success);
        assert!(result.message.contains("not recoverable"));
        assert_eq!(asked.load(Ordering::SeqCst), 0);
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
        assert_eq!(handler.history().count(), 1);
        assert_eq!(handler.statistics().unrecovered, 1);
    }

    #[tokio::test]
    async fn test_no_suitable_strategy() {
        let mut handler = ErrorHandler::default().with_strategy(CountingStrategy::new("declines", false, true));
        let mut ctx = ExecutionContext::new();
        let result = handler.handle(error(), &mut RecoveryScope::new(&mut ctx)).await;
        assert!(!result.success);
        assert!(result.message.contains("no suitable strategy"));
    }

    #[tokio::test]
    async fn test_history_is_capped_and_timestamped() {
        let mut handler = ErrorHandler::new(2);
        let mut ctx = ExecutionContext::new();
        for message in ["first", "second", "third"] {
            handler.handle(ErrorContext::new(message, ErrorCategory::Network), &mut RecoveryScope::new(&mut ctx)).await;
        }

        let messages: Vec<_> = handler.history().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["second", "third"]);
        assert!(handler.history().all(|e| e.timestamp.is_some()));
        assert_eq!(handler.recent(1)[0].message, "third");

        let stats = handler.statistics();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_category.get(&ErrorCategory::Network), Some(&3));
        assert_eq!(stats.by_severity.get(&ErrorSeverity::Error), Some(&3));

        handler.clear_history();
        assert_eq!(handler.history().count(), 0);
        assert_eq!(handler.statistics().total, 0);
    }

    #[test]
    fn test_default_strategies_follow_config() {
        let config = RecoveryConfig {
            strategies: vec![StrategyKind::WaitAndRetry, StrategyKind::Skip],
            ..RecoveryConfig::default()
        };
        let handler = ErrorHandler::with_default_strategies(10, &config);
        assert_eq!(handler.strategy_names(), vec!["wait_and_retry", "skip"]);
    }
}
