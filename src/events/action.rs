use std::fmt;

use crate::common::Vars;

#[derive(Debug, Clone)]
pub enum ActionEvent {
    Started {
        action_type: String,
    },
    Completed {
        message: String,
        data: Vars,
        /// Set when the result came out of a recovery strategy.
        recovered: bool,
    },
    Failed(ErrorReason),
}

impl ActionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ActionEvent::Started {
                ..
            } => "action.started",
            ActionEvent::Completed {
                ..
            } => "action.completed",
            ActionEvent::Failed(_) => "action.failed",
        }
    }
}

#[derive(Debug, Clone)]
pub enum ErrorReason {
    /// The action returned a failed result.
    Failed(String),
    /// The action raised an error.
    Exception(String),
}

impl fmt::Display for ErrorReason {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ErrorReason::Failed(msg) => write!(f, "Failed: {}", msg),
            ErrorReason::Exception(msg) => write!(f, "Exception: {}", msg),
        }
    }
}
