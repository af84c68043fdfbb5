//! Event types for workflow execution.
//!
//! Events are emitted during workflow execution to notify listeners
//! about lifecycle changes of the workflow, its actions and its variables.

mod action;
mod variable;
mod workflow;

pub use action::*;
pub use variable::*;
pub use workflow::*;

/// Generic event wrapper.
#[derive(Debug, Clone)]
pub struct Event<T> {
    inner: T,
}

/// Top-level event type.
#[derive(Debug, Clone)]
pub enum GraphEvent {
    /// Workflow-level events (started, completed, failed).
    Workflow(WorkflowEvent),
    /// Action-level events (started, completed, failed).
    Action(ActionEvent),
    /// Variable store changes.
    Variable(VariableEvent),
}

/// Event message carrying the execution it belongs to.
#[derive(Debug, Clone)]
pub struct Message {
    /// Workflow that generated this event.
    pub workflow_id: String,
    /// Execution that generated this event.
    pub execution_id: String,
    /// Action (node) id, empty for workflow events.
    pub action_id: String,
    /// Timestamp in milliseconds.
    pub timestamp: i64,
    /// The actual event data.
    pub event: GraphEvent,
}

impl<T> std::ops::Deref for Event<T>
where
    T: std::fmt::Debug + Clone,
{
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> Event<T>
where
    T: std::fmt::Debug + Clone,
{
    pub fn new(inner: &T) -> Self {
        Self {
            inner: inner.clone(),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl GraphEvent {
    /// Dotted event name, e.g. `workflow.started` or `action.failed`.
    pub fn name(&self) -> &'static str {
        match self {
            GraphEvent::Workflow(e) => e.name(),
            GraphEvent::Action(e) => e.name(),
            GraphEvent::Variable(e) => e.name(),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, GraphEvent::Workflow(WorkflowEvent::Completed(_)))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, GraphEvent::Workflow(WorkflowEvent::Failed(_)))
    }
}
