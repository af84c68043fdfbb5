//! Node scheduling for a single workflow execution.

mod dispatcher;

use async_trait::async_trait;
use serde::Serialize;

use crate::{Result, model::WorkflowDefinition, recovery::ErrorHandler, runtime::ExecutionContext, workflow::actions::ActionResult};

pub use dispatcher::Dispatcher;

/// Result of one node.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NodeResult {
    pub node_id: String,
    pub result: ActionResult,
    /// The result was produced by a recovery strategy after the node failed.
    pub recovered: bool,
}

/// What an executor reports back to the engine.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub success: bool,
    pub errors: Vec<String>,
    /// Node results in the order the nodes ran.
    pub node_results: Vec<NodeResult>,
}

/// Runs the nodes of an already validated workflow.
///
/// Implementations publish `action.*` events through the context and hand
/// node failures to `handler`. An `Err` is reserved for failures of the
/// executor itself (and cancellation); the engine turns it into a failed
/// execution.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(
        &self,
        workflow: &WorkflowDefinition,
        ctx: &mut ExecutionContext,
        handler: &mut ErrorHandler,
    ) -> Result<ExecutionReport>;
}
