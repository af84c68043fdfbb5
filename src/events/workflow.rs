use crate::common::Vars;

#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    Started(WorkflowStartedEvent),
    Completed(WorkflowCompletedEvent),
    Failed(WorkflowFailedEvent),
}

impl WorkflowEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::Started(_) => "workflow.started",
            WorkflowEvent::Completed(_) => "workflow.completed",
            WorkflowEvent::Failed(_) => "workflow.failed",
        }
    }
}

/// Event emitted when a workflow starts
#[derive(Debug, Clone)]
pub struct WorkflowStartedEvent {
    pub name: String,
    /// Ids of the workflow's nodes, sorted
    pub node_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct WorkflowCompletedEvent {
    pub duration_ms: i64,
    pub variables: Vars,
}

#[derive(Debug, Clone)]
pub struct WorkflowFailedEvent {
    pub error: String,
    pub duration_ms: i64,
}
