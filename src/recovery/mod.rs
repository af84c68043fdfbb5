//! Error classification and recovery.
//!
//! Failures are described by an [`ErrorContext`]. The [`ErrorHandler`] keeps a
//! bounded history of them and offers each recoverable error to its
//! [`RecoveryStrategy`] chain, first match wins.

mod error;
mod handler;
pub mod strategies;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{runtime::ExecutionContext, workflow::actions::Action};

pub use error::{ErrorCategory, ErrorContext, ErrorSeverity};
pub use handler::{ErrorHandler, ErrorStatistics};
pub use strategies::{
    CompositeStrategy, FallbackStrategy, ReauthenticateStrategy, RefreshPageStrategy, RetryStrategy, SkipStrategy, WaitAndRetryStrategy,
};

/// Outcome of a recovery attempt.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecoveryResult {
    pub success: bool,
    pub message: String,
    /// Replacement payload on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Set when the recovery attempt itself failed; its cause links the original error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_error: Option<ErrorContext>,
}

impl RecoveryResult {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            new_error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            new_error: None,
        }
    }

    pub fn with_data(
        mut self,
        data: Value,
    ) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_new_error(
        mut self,
        error: ErrorContext,
    ) -> Self {
        self.new_error = Some(error);
        self
    }
}

/// What a strategy may touch while recovering: the execution context and,
/// when known, the action whose failure is being handled.
pub struct RecoveryScope<'a> {
    pub ctx: &'a mut ExecutionContext,
    pub action: Option<&'a dyn Action>,
}

impl<'a> RecoveryScope<'a> {
    pub fn new(ctx: &'a mut ExecutionContext) -> Self {
        Self {
            ctx,
            action: None,
        }
    }

    pub fn with_action(
        mut self,
        action: &'a dyn Action,
    ) -> Self {
        self.action = Some(action);
        self
    }
}

/// A policy that may recover from a classified error.
#[async_trait]
pub trait RecoveryStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Whether this strategy applies to `error`.
    fn can_recover(
        &self,
        error: &ErrorContext,
    ) -> bool;

    /// Attempt the recovery.
    async fn recover(
        &self,
        error: &ErrorContext,
        scope: &mut RecoveryScope<'_>,
    ) -> RecoveryResult;
}
