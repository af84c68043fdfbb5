//! Error types for Autoflow.
//!
//! All errors in Autoflow are represented by the `AutoflowError` enum.
//! Most variants line up with an [`ErrorCategory`](crate::ErrorCategory) so a
//! raised error can be classified without string matching.

use std::{io::ErrorKind, string::FromUtf8Error};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all Autoflow operations.
///
/// Returned as the `Err` side of an action's `execute`, which is the
/// "unexpected failure" channel. Ordinary failures are reported through a
/// failed [`ActionResult`](crate::ActionResult) instead.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum AutoflowError {
    /// An element could not be found, was stale or not interactable.
    #[error("{0}")]
    Element(String),

    /// Page or route navigation failed.
    #[error("{0}")]
    Navigation(String),

    /// An operation did not finish in time.
    #[error("{0}")]
    Timeout(String),

    /// Connectivity errors.
    #[error("{0}")]
    Network(String),

    /// Input or definition validation errors.
    #[error("{0}")]
    Validation(String),

    /// Generic action execution errors.
    #[error("{0}")]
    Execution(String),

    /// Condition evaluation errors.
    #[error("{0}")]
    Condition(String),

    /// Variable lookup or template resolution errors.
    #[error("{0}")]
    Variable(String),

    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Exhausted or unavailable resources.
    #[error("{0}")]
    Resource(String),

    /// Authorization failures.
    #[error("{0}")]
    Permission(String),

    /// Action registry errors (unknown type, malformed registration).
    #[error("{0}")]
    Registry(String),

    /// Data conversion errors (JSON, TOML, etc.).
    #[error("{0}")]
    Convert(String),

    /// The execution was cancelled through its shutdown token.
    #[error("execution cancelled")]
    Cancelled,

    /// Engine-level errors.
    #[error("{0}")]
    Engine(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),

    /// Message queue errors.
    #[error("{0}")]
    Queue(String),
}

impl From<AutoflowError> for String {
    fn from(val: AutoflowError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for AutoflowError {
    fn from(error: std::io::Error) -> Self {
        AutoflowError::IoError(error.to_string())
    }
}

impl From<AutoflowError> for std::io::Error {
    fn from(val: AutoflowError) -> Self {
        #[allow(clippy::io_other_error)]
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<FromUtf8Error> for AutoflowError {
    fn from(_: FromUtf8Error) -> Self {
        AutoflowError::Convert("Error with utf-8 string convert".to_string())
    }
}

impl From<serde_json::Error> for AutoflowError {
    fn from(error: serde_json::Error) -> Self {
        AutoflowError::Convert(error.to_string())
    }
}

impl From<toml::de::Error> for AutoflowError {
    fn from(error: toml::de::Error) -> Self {
        AutoflowError::Config(error.to_string())
    }
}

impl From<jsonschema::ValidationError<'_>> for AutoflowError {
    fn from(error: jsonschema::ValidationError<'_>) -> Self {
        AutoflowError::Validation(error.to_string())
    }
}
