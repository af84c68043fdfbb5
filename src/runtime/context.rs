use std::{collections::HashMap, sync::Arc, time::Duration};

use serde_json::Value;

use crate::{
    AutoflowError, Result,
    common::{Shutdown, VariableStore, Vars},
    events::{GraphEvent, Message, VariableEvent},
    recovery::ErrorContext,
    runtime::{Channel, PageDriver, Sleeper, TokioSleeper},
    utils,
    workflow::actions::ActionRegistry,
};

/// Loop-control state of the innermost running loop.
#[derive(Debug, Clone, Copy, Default)]
struct LoopState {
    index: Option<usize>,
    break_requested: bool,
    continue_requested: bool,
}

/// Saved loop state of an enclosing loop, handed back on [`ExecutionContext::exit_loop`].
#[derive(Debug)]
#[must_use = "pass the frame back to exit_loop"]
pub struct LoopFrame {
    saved: LoopState,
}

/// Mutable state of one workflow execution.
///
/// Created per execution and passed by `&mut` through the whole action tree.
/// Concurrent executions must each use their own context.
pub struct ExecutionContext {
    workflow_id: String,
    execution_id: String,
    variables: VariableStore,
    env: HashMap<String, String>,

    loop_depth: usize,
    loop_state: LoopState,
    last_error: Option<ErrorContext>,
    retry_counts: HashMap<String, u32>,

    driver: Option<Arc<dyn PageDriver>>,
    registry: Option<Arc<ActionRegistry>>,

    sleeper: Arc<dyn Sleeper>,
    shutdown: Arc<Shutdown>,
    channel: Option<Arc<Channel>>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    /// Standalone context with an empty variable store and the tokio sleeper.
    pub fn new() -> Self {
        Self {
            workflow_id: String::new(),
            execution_id: utils::longid(),
            variables: VariableStore::new(),
            env: HashMap::new(),
            loop_depth: 0,
            loop_state: LoopState::default(),
            last_error: None,
            retry_counts: HashMap::new(),
            driver: None,
            registry: None,
            sleeper: Arc::new(TokioSleeper),
            shutdown: Arc::new(Shutdown::new()),
            channel: None,
        }
    }

    pub fn with_variables(
        mut self,
        vars: Vars,
    ) -> Self {
        self.variables = VariableStore::with_globals(vars);
        self
    }

    pub fn with_workflow(
        mut self,
        workflow_id: &str,
        execution_id: &str,
    ) -> Self {
        self.workflow_id = workflow_id.to_string();
        self.execution_id = execution_id.to_string();
        self
    }

    pub fn with_env(
        mut self,
        env: HashMap<String, String>,
    ) -> Self {
        self.env = env;
        self
    }

    pub fn with_driver(
        mut self,
        driver: Arc<dyn PageDriver>,
    ) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn with_registry(
        mut self,
        registry: Arc<ActionRegistry>,
    ) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_sleeper(
        mut self,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_shutdown(
        mut self,
        shutdown: Arc<Shutdown>,
    ) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_channel(
        mut self,
        channel: Arc<Channel>,
    ) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    // ---- variables ----

    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableStore {
        &mut self.variables
    }

    pub fn get_variable(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Set a variable and publish `variable.updated`.
    pub fn set_variable(
        &mut self,
        name: &str,
        value: Value,
    ) {
        self.variables.set(name, value.clone());
        self.emit(
            "",
            GraphEvent::Variable(VariableEvent::Updated {
                name: name.to_string(),
                value,
            }),
        );
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    // ---- loop control ----

    /// Enter a loop body scope. Loop flags start cleared; the enclosing
    /// loop's state is saved in the returned frame.
    pub fn enter_loop(&mut self) -> LoopFrame {
        self.loop_depth += 1;
        LoopFrame {
            saved: std::mem::take(&mut self.loop_state),
        }
    }

    /// Leave a loop, restoring the enclosing loop's state.
    pub fn exit_loop(
        &mut self,
        frame: LoopFrame,
    ) {
        self.loop_depth = self.loop_depth.saturating_sub(1);
        self.loop_state = frame.saved;
    }

    pub fn in_loop(&self) -> bool {
        self.loop_depth > 0
    }

    pub fn loop_index(&self) -> Option<usize> {
        self.loop_state.index
    }

    pub(crate) fn set_loop_index(
        &mut self,
        index: usize,
    ) {
        self.loop_state.index = Some(index);
    }

    /// Ask the innermost loop to stop after the current action.
    pub fn request_break(&mut self) -> Result<()> {
        if !self.in_loop() {
            return Err(AutoflowError::Execution("break requested outside of a loop".to_string()));
        }
        self.loop_state.break_requested = true;
        Ok(())
    }

    /// Ask the innermost loop to skip the rest of the current iteration.
    pub fn request_continue(&mut self) -> Result<()> {
        if !self.in_loop() {
            return Err(AutoflowError::Execution("continue requested outside of a loop".to_string()));
        }
        self.loop_state.continue_requested = true;
        Ok(())
    }

    pub fn break_requested(&self) -> bool {
        self.loop_state.break_requested
    }

    /// Consume a pending continue signal.
    pub(crate) fn take_continue(&mut self) -> bool {
        std::mem::take(&mut self.loop_state.continue_requested)
    }

    /// True when a break or continue is waiting for the innermost loop.
    pub fn loop_signal_pending(&self) -> bool {
        self.loop_state.break_requested || self.loop_state.continue_requested
    }

    // ---- errors and retries ----

    pub fn last_error(&self) -> Option<&ErrorContext> {
        self.last_error.as_ref()
    }

    pub fn set_last_error(
        &mut self,
        error: ErrorContext,
    ) {
        self.last_error = Some(error);
    }

    pub fn retry_count(
        &self,
        key: &str,
    ) -> u32 {
        self.retry_counts.get(key).copied().unwrap_or(0)
    }

    /// Increment and return the retry counter of `key`.
    pub fn increment_retry_count(
        &mut self,
        key: &str,
    ) -> u32 {
        let count = self.retry_counts.entry(key.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn reset_retry_count(
        &mut self,
        key: &str,
    ) {
        self.retry_counts.remove(key);
    }

    // ---- capabilities ----

    pub fn driver(&self) -> Option<Arc<dyn PageDriver>> {
        self.driver.clone()
    }

    pub fn registry(&self) -> Option<Arc<ActionRegistry>> {
        self.registry.clone()
    }

    // ---- cancellation and delays ----

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_terminated()
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(AutoflowError::Cancelled);
        }
        Ok(())
    }

    /// Sleep for `duration`, returning early with `Cancelled` if the execution is stopped.
    pub async fn sleep(
        &self,
        duration: Duration,
    ) -> Result<()> {
        self.check_cancelled()?;
        let sleeper = self.sleeper.clone();
        tokio::select! {
            _ = self.shutdown.wait() => Err(AutoflowError::Cancelled),
            _ = sleeper.sleep(duration) => Ok(()),
        }
    }

    // ---- events ----

    pub(crate) fn emit(
        &self,
        action_id: &str,
        event: GraphEvent,
    ) {
        if let Some(channel) = &self.channel {
            channel.publish(Message {
                workflow_id: self.workflow_id.clone(),
                execution_id: self.execution_id.clone(),
                action_id: action_id.to_string(),
                timestamp: utils::time::time_millis(),
                event,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::{events::Event, runtime::ChannelOptions};

    #[test]
    fn test_loop_state_is_restored_for_nested_loops() {
        let mut ctx = ExecutionContext::new();
        assert!(ctx.request_break().is_err());

        let outer = ctx.enter_loop();
        ctx.set_loop_index(3);

        let inner = ctx.enter_loop();
        assert_eq!(ctx.loop_index(), None);
        ctx.set_loop_index(0);
        ctx.request_continue().unwrap();
        assert!(ctx.loop_signal_pending());
        ctx.exit_loop(inner);

        assert_eq!(ctx.loop_index(), Some(3));
        assert!(!ctx.loop_signal_pending());

        ctx.exit_loop(outer);
        assert!(!ctx.in_loop());
        assert_eq!(ctx.loop_index(), None);
    }

    #[test]
    fn test_take_continue_consumes_signal() {
        let mut ctx = ExecutionContext::new();
        let frame = ctx.enter_loop();
        ctx.request_continue().unwrap();
        assert!(ctx.take_continue());
        assert!(!ctx.take_continue());
        ctx.exit_loop(frame);
    }

    #[test]
    fn test_retry_counts() {
        let mut ctx = ExecutionContext::new();
        assert_eq!(ctx.increment_retry_count("k"), 1);
        assert_eq!(ctx.increment_retry_count("k"), 2);
        assert_eq!(ctx.retry_count("k"), 2);
        ctx.reset_retry_count("k");
        assert_eq!(ctx.retry_count("k"), 0);
    }

    #[test]
    fn test_set_variable_publishes_event() {
        let channel = Arc::new(Channel::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        channel
            .add_listener(
                Arc::new(move |e: &Event<Message>| -> Result<()> {
                    sink.lock().unwrap().push(e.event.name());
                    Ok(())
                }),
                ChannelOptions::default(),
            )
            .unwrap();

        let mut ctx = ExecutionContext::new().with_channel(channel);
        ctx.set_variable("user", json!("alice"));

        assert_eq!(ctx.get_variable("user"), Some(&json!("alice")));
        assert_eq!(*seen.lock().unwrap(), vec!["variable.updated"]);
    }

    #[tokio::test]
    async fn test_sleep_is_cancelled() {
        let shutdown = Arc::new(Shutdown::new());
        let ctx = ExecutionContext::new().with_shutdown(shutdown.clone());
        shutdown.shutdown();

        let result = ctx.sleep(Duration::from_secs(60)).await;
        assert_eq!(result, Err(AutoflowError::Cancelled));
    }
}
