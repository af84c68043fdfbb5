//! Workflow engine - the main entry point for Autoflow.
//!
//! The engine runs workflow definitions:
//! - Validating the definition before anything runs
//! - Building a fresh execution context and error handler per execution
//! - Delegating node execution to an [`Executor`]
//! - Publishing workflow lifecycle events on its channel
//! - Cancelling in-flight executions on [`Engine::stop`]

use std::{
    collections::HashMap,
    panic::AssertUnwindSafe,
    sync::{Arc, PoisonError, RwLock},
};

use futures::FutureExt;
use serde::Serialize;
use tokio::runtime::{Builder, Runtime};
use tracing::{error, info, warn};

use crate::{
    ChannelEvent, ChannelOptions, Config, Result, ShareLock,
    common::{Shutdown, Vars},
    dispatcher::{ExecutionReport, Executor, NodeResult},
    events::{GraphEvent, WorkflowCompletedEvent, WorkflowEvent, WorkflowFailedEvent, WorkflowStartedEvent},
    model::WorkflowDefinition,
    recovery::ErrorHandler,
    runtime::{Channel, EventHandle, ExecutionContext, PageDriver, Sleeper},
    utils,
    workflow::{actions::ActionRegistry, validate},
};

/// Builds the error handler of one execution.
pub type ErrorHandlerFactory = Arc<dyn Fn() -> ErrorHandler + Send + Sync>;

/// Lifecycle of one execution.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionState {
    Created,
    Validating,
    Invalid,
    Executing,
    Completed,
    Failed,
}

/// Outcome of [`Engine::execute`].
#[derive(Serialize, Debug, Clone)]
pub struct ExecutionResult {
    pub execution_id: String,
    pub workflow_id: String,
    pub state: ExecutionState,
    pub success: bool,
    /// Validation errors, node failures or the executor's own error.
    pub errors: Vec<String>,
    /// Node results in the order the nodes ran.
    pub node_results: Vec<NodeResult>,
    /// Global variables at the end of the execution.
    pub variables: Vars,
    pub duration_ms: i64,
}

impl ExecutionResult {
    fn new(
        execution_id: &str,
        workflow_id: &str,
    ) -> Self {
        Self {
            execution_id: execution_id.to_string(),
            workflow_id: workflow_id.to_string(),
            state: ExecutionState::Created,
            success: false,
            errors: Vec::new(),
            node_results: Vec::new(),
            variables: Vars::new(),
            duration_ms: 0,
        }
    }

    pub fn node_result(
        &self,
        node_id: &str,
    ) -> Option<&NodeResult> {
        self.node_results.iter().find(|r| r.node_id == node_id)
    }
}

/// Keeps an execution registered in [`Engine::running`] until dropped, even
/// when the `execute` future itself is dropped mid-flight.
struct ExecutionGuard {
    executions: ShareLock<HashMap<String, Arc<Shutdown>>>,
    id: String,
}

impl ExecutionGuard {
    fn register(
        executions: &ShareLock<HashMap<String, Arc<Shutdown>>>,
        id: &str,
        shutdown: Arc<Shutdown>,
    ) -> Self {
        executions.write().unwrap_or_else(PoisonError::into_inner).insert(id.to_string(), shutdown);
        Self {
            executions: executions.clone(),
            id: id.to_string(),
        }
    }
}

impl Drop for ExecutionGuard {
    fn drop(&mut self) {
        self.executions.write().unwrap_or_else(PoisonError::into_inner).remove(&self.id);
    }
}

/// The main workflow engine.
///
/// An engine is cheap to share behind an `Arc` and may run any number of
/// executions concurrently; each one gets its own [`ExecutionContext`] and
/// [`ErrorHandler`].
///
/// # Example
///
/// ```rust,ignore
/// let engine = EngineBuilder::new().build()?;
/// let workflow = WorkflowDefinition::from_json(json_str)?;
/// let result = engine.execute(&workflow, Vars::new()).await;
/// assert!(result.success);
/// ```
pub struct Engine {
    config: Config,
    registry: Arc<ActionRegistry>,
    executor: Arc<dyn Executor>,
    error_handler: ErrorHandlerFactory,
    channel: Arc<Channel>,
    driver: Option<Arc<dyn PageDriver>>,
    sleeper: Arc<dyn Sleeper>,
    /// Cancellation tokens of in-flight executions, by execution id.
    executions: ShareLock<HashMap<String, Arc<Shutdown>>>,
    runtime: Option<Arc<Runtime>>,
}

impl Engine {
    pub(crate) fn new(
        config: Config,
        registry: Arc<ActionRegistry>,
        executor: Arc<dyn Executor>,
        error_handler: ErrorHandlerFactory,
        driver: Option<Arc<dyn PageDriver>>,
        sleeper: Arc<dyn Sleeper>,
        runtime: Option<Arc<Runtime>>,
    ) -> Self {
        let channel = Arc::new(Channel::new(config.engine.event_queue_size));
        Self {
            config,
            registry,
            executor,
            error_handler,
            channel,
            driver,
            sleeper,
            executions: Arc::new(RwLock::new(HashMap::new())),
            runtime,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> Arc<ActionRegistry> {
        self.registry.clone()
    }

    /// Returns a reference to the event channel.
    pub fn channel(&self) -> Arc<Channel> {
        self.channel.clone()
    }

    /// Closure-based listener registration filtered by `options`.
    pub fn events(
        &self,
        options: ChannelOptions,
    ) -> ChannelEvent {
        ChannelEvent::channel(self.channel.clone(), options)
    }

    /// Registers `listener`; returns `false` if it was already registered.
    pub fn add_listener(
        &self,
        listener: EventHandle,
        options: ChannelOptions,
    ) -> Result<bool> {
        self.channel.add_listener(listener, options)
    }

    pub fn remove_listener(
        &self,
        listener: &EventHandle,
    ) -> bool {
        self.channel.remove_listener(listener)
    }

    /// Number of executions currently running.
    pub fn running(&self) -> usize {
        self.executions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Cancels every in-flight execution of this engine.
    ///
    /// Executions notice at their next cancellation point (before a node,
    /// an iteration, a retry attempt or a sleep) and finish as failed.
    pub fn stop(&self) {
        let executions = self.executions.read().unwrap_or_else(PoisonError::into_inner);
        for (id, shutdown) in executions.iter() {
            info!("stopping execution {}", id);
            shutdown.shutdown();
        }
    }

    /// Validates and runs `workflow` with `initial` as its global variables.
    ///
    /// Never fails: validation errors, node failures, executor errors and
    /// executor panics all end up in the returned result.
    pub async fn execute(
        &self,
        workflow: &WorkflowDefinition,
        initial: Vars,
    ) -> ExecutionResult {
        let started = utils::time::time_millis();
        let execution_id = utils::longid();
        let mut result = ExecutionResult::new(&execution_id, &workflow.workflow_id);

        result.state = ExecutionState::Validating;
        let errors = validate(workflow);
        if !errors.is_empty() {
            warn!("workflow {} is invalid: {}", workflow.workflow_id, errors.join("; "));
            result.state = ExecutionState::Invalid;
            result.errors = errors;
            result.variables = initial;
            result.duration_ms = utils::time::time_millis() - started;
            return result;
        }

        let shutdown = Arc::new(Shutdown::new());
        let guard = ExecutionGuard::register(&self.executions, &execution_id, shutdown.clone());

        let mut ctx = ExecutionContext::new()
            .with_workflow(&workflow.workflow_id, &execution_id)
            .with_variables(initial)
            .with_env(workflow.env.clone())
            .with_registry(self.registry.clone())
            .with_sleeper(self.sleeper.clone())
            .with_shutdown(shutdown)
            .with_channel(self.channel.clone());
        if let Some(driver) = &self.driver {
            ctx = ctx.with_driver(driver.clone());
        }
        let mut handler = (self.error_handler)();

        result.state = ExecutionState::Executing;
        info!("executing workflow {} ({})", workflow.workflow_id, execution_id);
        ctx.emit(
            "",
            GraphEvent::Workflow(WorkflowEvent::Started(WorkflowStartedEvent {
                name: workflow.name.clone(),
                node_ids: workflow.nodes.keys().cloned().collect(),
            })),
        );

        let outcome = AssertUnwindSafe(self.executor.execute(workflow, &mut ctx, &mut handler)).catch_unwind().await;
        drop(guard);

        let report = match outcome {
            Ok(Ok(report)) => report,
            Ok(Err(err)) => ExecutionReport {
                success: false,
                errors: vec![err.to_string()],
                node_results: Vec::new(),
            },
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("executor panicked in workflow {}: {}", workflow.workflow_id, message);
                ExecutionReport {
                    success: false,
                    errors: vec![format!("executor panicked: {}", message)],
                    node_results: Vec::new(),
                }
            }
        };

        result.success = report.success;
        result.errors = report.errors;
        result.node_results = report.node_results;
        result.variables = ctx.variables().snapshot();
        result.duration_ms = utils::time::time_millis() - started;

        if result.success {
            result.state = ExecutionState::Completed;
            info!("workflow {} completed in {}ms", workflow.workflow_id, result.duration_ms);
            ctx.emit(
                "",
                GraphEvent::Workflow(WorkflowEvent::Completed(WorkflowCompletedEvent {
                    duration_ms: result.duration_ms,
                    variables: result.variables.clone(),
                })),
            );
        } else {
            result.state = ExecutionState::Failed;
            warn!("workflow {} failed: {}", workflow.workflow_id, result.errors.join("; "));
            ctx.emit(
                "",
                GraphEvent::Workflow(WorkflowEvent::Failed(WorkflowFailedEvent {
                    error: result.errors.join("; "),
                    duration_ms: result.duration_ms,
                })),
            );
        }
        result
    }

    /// Runs [`Engine::execute`] to completion on the engine's runtime, or on a
    /// temporary current-thread runtime when none was configured.
    ///
    /// Must not be called from within an async context.
    pub fn execute_blocking(
        &self,
        workflow: &WorkflowDefinition,
        initial: Vars,
    ) -> Result<ExecutionResult> {
        match &self.runtime {
            Some(runtime) => Ok(runtime.block_on(self.execute(workflow, initial))),
            None => {
                let runtime = Builder::new_current_thread().enable_all().build()?;
                Ok(runtime.block_on(self.execute(workflow, initial)))
            }
        }
    }
}
