//! Classified error values.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AutoflowError, common::Vars, workflow::actions::ActionResult};

/// What kind of failure happened.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, strum::AsRefStr, strum::EnumString, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    Element,
    Navigation,
    Timeout,
    Network,
    Validation,
    Execution,
    Condition,
    Variable,
    Configuration,
    Resource,
    Permission,
    #[default]
    Unknown,
}

impl ErrorCategory {
    /// Categories that usually go away when the operation is repeated.
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorCategory::Network | ErrorCategory::Timeout | ErrorCategory::Element | ErrorCategory::Navigation)
    }

    /// Best-effort classification of a failure message.
    pub fn classify(message: &str) -> Self {
        let message = message.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| message.contains(w));

        if has(&["timeout", "timed out"]) {
            ErrorCategory::Timeout
        } else if has(&["element", "selector", "stale", "not clickable", "not interactable"]) {
            ErrorCategory::Element
        } else if has(&["navigation", "navigate", "page load", "url"]) {
            ErrorCategory::Navigation
        } else if has(&["network", "connection", "dns", "unreachable"]) {
            ErrorCategory::Network
        } else if has(&["permission", "unauthorized", "forbidden", "access denied", "login required"]) {
            ErrorCategory::Permission
        } else if has(&["variable", "template"]) {
            ErrorCategory::Variable
        } else if has(&["invalid", "validation", "required"]) {
            ErrorCategory::Validation
        } else if has(&["condition"]) {
            ErrorCategory::Condition
        } else if has(&["config"]) {
            ErrorCategory::Configuration
        } else if has(&["memory", "resource", "quota", "disk"]) {
            ErrorCategory::Resource
        } else {
            ErrorCategory::Execution
        }
    }
}

/// How bad a failure is. Ordered from least to most severe.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, strum::AsRefStr, strum::EnumString, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorSeverity {
    Info,
    Warning,
    #[default]
    Error,
    Critical,
    Fatal,
}

impl ErrorSeverity {
    /// Critical and fatal errors are never retried, substituted or skipped.
    pub fn is_critical(&self) -> bool {
        *self >= ErrorSeverity::Critical
    }
}

fn default_recoverable() -> bool {
    true
}

/// A classified, structured description of a failure.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorContext {
    pub message: String,
    #[serde(default)]
    pub category: ErrorCategory,
    #[serde(default)]
    pub severity: ErrorSeverity,
    #[serde(default = "default_recoverable")]
    pub recoverable: bool,
    #[serde(default)]
    pub context: Vars,
    /// The lower-level error this one wraps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorContext>>,
    /// Text of the raised error, when the failure came from one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
    /// Milliseconds, stamped when the error is handled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ErrorContext {
    pub fn new(
        message: impl Into<String>,
        category: ErrorCategory,
    ) -> Self {
        Self {
            message: message.into(),
            category,
            severity: ErrorSeverity::Error,
            recoverable: true,
            context: Vars::new(),
            cause: None,
            source_error: None,
            timestamp: None,
        }
    }

    /// Classify a raised error by its variant.
    pub fn from_error(error: &AutoflowError) -> Self {
        let (category, severity, recoverable) = match error {
            AutoflowError::Element(_) => (ErrorCategory::Element, ErrorSeverity::Error, true),
            AutoflowError::Navigation(_) => (ErrorCategory::Navigation, ErrorSeverity::Error, true),
            AutoflowError::Timeout(_) => (ErrorCategory::Timeout, ErrorSeverity::Error, true),
            AutoflowError::Network(_) => (ErrorCategory::Network, ErrorSeverity::Error, true),
            AutoflowError::Validation(_) => (ErrorCategory::Validation, ErrorSeverity::Error, true),
            AutoflowError::Condition(_) => (ErrorCategory::Condition, ErrorSeverity::Error, true),
            AutoflowError::Variable(_) => (ErrorCategory::Variable, ErrorSeverity::Error, true),
            AutoflowError::Config(_) | AutoflowError::Registry(_) => (ErrorCategory::Configuration, ErrorSeverity::Critical, false),
            AutoflowError::Resource(_) | AutoflowError::IoError(_) => (ErrorCategory::Resource, ErrorSeverity::Error, true),
            AutoflowError::Permission(_) => (ErrorCategory::Permission, ErrorSeverity::Error, true),
            AutoflowError::Cancelled => (ErrorCategory::Execution, ErrorSeverity::Critical, false),
            AutoflowError::Execution(_) | AutoflowError::Convert(_) | AutoflowError::Engine(_) | AutoflowError::Queue(_) => {
                (ErrorCategory::Execution, ErrorSeverity::Error, true)
            }
        };

        Self {
            severity,
            recoverable,
            source_error: Some(error.to_string()),
            ..Self::new(error.to_string(), category)
        }
    }

    /// Classify a failed action result, by its `category` data entry when
    /// present, otherwise by its message.
    pub fn from_result(result: &ActionResult) -> Self {
        let category = result.data().get::<ErrorCategory>("category").unwrap_or_else(|| ErrorCategory::classify(result.message()));
        let mut error = Self::new(result.message(), category);
        if !result.data().is_empty() {
            error.context.set("result_data", result.data());
        }
        error
    }

    pub fn with_severity(
        mut self,
        severity: ErrorSeverity,
    ) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_recoverable(
        mut self,
        recoverable: bool,
    ) -> Self {
        self.recoverable = recoverable;
        self
    }

    pub fn with_context<T: Serialize>(
        mut self,
        key: &str,
        value: T,
    ) -> Self {
        self.context.set(key, value);
        self
    }

    pub fn with_cause(
        mut self,
        cause: ErrorContext,
    ) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// The innermost error of the causal chain.
    pub fn root_cause(&self) -> &ErrorContext {
        let mut current = self;
        while let Some(cause) = current.cause.as_deref() {
            current = cause;
        }
        current
    }

    /// Key identifying the same logical error across repeated handling.
    pub fn key(&self) -> String {
        match self.context.get::<String>("action_id") {
            Some(action_id) => format!("{}:{}", self.category, action_id),
            None => format!("{}:{}", self.category, self.message),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl std::fmt::Display for ErrorContext {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "[{}/{}] {}", self.category, self.severity, self.message)
    }
}
