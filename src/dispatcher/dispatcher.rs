//! Default executor: runs nodes one at a time in dependency order.
//!
//! For every node the dispatcher:
//! - Publishes `action.started`
//! - Runs the node's action tree against the shared context
//! - On failure classifies an [`ErrorContext`] and offers it to the error handler
//! - Publishes `action.completed` or `action.failed`
//!
//! The first node that fails without being recovered stops the workflow.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::{
    AutoflowError, Result,
    common::Vars,
    dispatcher::{ExecutionReport, Executor, NodeResult},
    events::{ActionEvent, ErrorReason, GraphEvent},
    model::WorkflowDefinition,
    recovery::{ErrorContext, ErrorHandler, RecoveryResult, RecoveryScope},
    runtime::ExecutionContext,
    workflow::{
        Node, WorkflowGraph,
        actions::{ActionResult, EXCEPTION_KEY},
    },
};

/// Sequential workflow dispatcher.
#[derive(Debug, Default, Clone, Copy)]
pub struct Dispatcher;

impl Dispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Runs a node and classifies its failure, if any.
    async fn run_node(
        node: &Node,
        ctx: &mut ExecutionContext,
    ) -> Result<(ActionResult, Option<(ErrorContext, ErrorReason)>)> {
        match node.action.execute(ctx).await {
            Ok(result) if result.is_success() => Ok((result, None)),
            Ok(result) => {
                let error = ErrorContext::from_result(&result);
                let reason = ErrorReason::Failed(result.message().to_string());
                Ok((result, Some((error, reason))))
            }
            Err(AutoflowError::Cancelled) => Err(AutoflowError::Cancelled),
            Err(err) => {
                let result = ActionResult::failure(err.to_string()).with_data(Vars::new().with(EXCEPTION_KEY, err.to_string()));
                Ok((result, Some((ErrorContext::from_error(&err), ErrorReason::Exception(err.to_string())))))
            }
        }
    }

    /// Turns a successful recovery into the node's result. Strategies that
    /// re-ran the action report its serialized result as their data.
    fn recovered_result(recovery: &RecoveryResult) -> ActionResult {
        match &recovery.data {
            Some(data) => serde_json::from_value::<ActionResult>(data.clone())
                .unwrap_or_else(|_| ActionResult::success(recovery.message.clone()).with_data(Vars::from(data.clone()))),
            None => ActionResult::success(recovery.message.clone()),
        }
    }

    fn emit_completed(
        ctx: &ExecutionContext,
        node_id: &str,
        result: &ActionResult,
        recovered: bool,
    ) {
        ctx.emit(
            node_id,
            GraphEvent::Action(ActionEvent::Completed {
                message: result.message().to_string(),
                data: result.data().clone(),
                recovered,
            }),
        );
    }
}

#[async_trait]
impl Executor for Dispatcher {
    async fn execute(
        &self,
        workflow: &WorkflowDefinition,
        ctx: &mut ExecutionContext,
        handler: &mut ErrorHandler,
    ) -> Result<ExecutionReport> {
        let registry = ctx.registry().ok_or(AutoflowError::Engine("no action registry in execution context".to_string()))?;
        let graph = WorkflowGraph::build(workflow, &registry)?;
        debug!("workflow {} graph:\n{}", workflow.workflow_id, graph.describe());

        let mut report = ExecutionReport::default();
        for node in graph.execution_order()? {
            ctx.check_cancelled()?;
            ctx.emit(
                &node.id,
                GraphEvent::Action(ActionEvent::Started {
                    action_type: node.action.action_type().to_string(),
                }),
            );

            let (result, failure) = Self::run_node(node, ctx).await?;
            let Some((error, reason)) = failure else {
                Self::emit_completed(ctx, &node.id, &result, false);
                report.node_results.push(NodeResult {
                    node_id: node.id.clone(),
                    result,
                    recovered: false,
                });
                continue;
            };

            warn!("node {} failed: {}", node.id, reason);
            ctx.emit(&node.id, GraphEvent::Action(ActionEvent::Failed(reason)));

            let error = error.with_context("action_id", &node.id).with_context("action_type", node.action.action_type());
            ctx.set_last_error(error.clone());
            let recovery = handler.handle(error, &mut RecoveryScope::new(ctx).with_action(node.action.as_ref())).await;

            if recovery.success {
                info!("node {} recovered: {}", node.id, recovery.message);
                let recovered = Self::recovered_result(&recovery);
                Self::emit_completed(ctx, &node.id, &recovered, true);
                report.node_results.push(NodeResult {
                    node_id: node.id.clone(),
                    result: recovered,
                    recovered: true,
                });
                continue;
            }

            report.errors.push(format!("node '{}' failed: {}", node.id, result.message()));
            if let Some(new_error) = &recovery.new_error {
                report.errors.push(format!("recovery of node '{}' failed: {}", node.id, new_error.message));
            } else {
                report.errors.push(format!("recovery of node '{}' failed: {}", node.id, recovery.message));
            }
            report.node_results.push(NodeResult {
                node_id: node.id.clone(),
                result,
                recovered: false,
            });
            return Ok(report);
        }

        report.success = true;
        Ok(report)
    }
}
