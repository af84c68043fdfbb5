//! Test doubles shared by the unit tests of actions, strategies and the engine.

use std::{
    any::Any,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::{
    AutoflowError, Result,
    runtime::{ExecutionContext, PageDriver, Sleeper},
    workflow::actions::{Action, ActionRegistry, ActionResult, LoopSignal},
};

#[derive(Debug, Clone)]
pub enum Outcome {
    Succeed,
    Fail(&'static str),
    Error(AutoflowError),
}

/// Plays back a fixed list of outcomes, repeating the last one.
#[derive(Serialize, Clone)]
pub struct ScriptedAction {
    id: String,
    #[serde(skip)]
    outcomes: Vec<Outcome>,
    #[serde(skip)]
    calls: Arc<AtomicUsize>,
}

impl ScriptedAction {
    pub fn new(
        id: &str,
        outcomes: Vec<Outcome>,
    ) -> Self {
        Self {
            id: id.to_string(),
            outcomes,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn always(
        id: &str,
        outcome: Outcome,
    ) -> Self {
        Self::new(id, vec![outcome])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
#[typetag::serialize(name = "scripted")]
impl Action for ScriptedAction {
    fn create(
        params: Value,
        _registry: &ActionRegistry,
    ) -> Result<Self> {
        let id = params.get("id").and_then(Value::as_str).unwrap_or("scripted");
        Ok(Self::always(id, Outcome::Succeed))
    }

    fn schema() -> Value {
        Value::Null
    }

    fn type_name() -> &'static str {
        "scripted"
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        ""
    }

    fn action_type(&self) -> &str {
        Self::type_name()
    }

    async fn execute(
        &self,
        _ctx: &mut ExecutionContext,
    ) -> Result<ActionResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.outcomes.get(call).or(self.outcomes.last()).cloned().unwrap_or(Outcome::Succeed);
        match outcome {
            Outcome::Succeed => Ok(ActionResult::success(format!("{} ok", self.id))),
            Outcome::Fail(message) => Ok(ActionResult::failure(message)),
            Outcome::Error(err) => Err(err),
        }
    }
}

/// Records the value of `variable` on every execution.
#[derive(Serialize, Clone)]
pub struct Recorder {
    id: String,
    variable: String,
    #[serde(skip)]
    seen: Arc<Mutex<Vec<Option<Value>>>>,
}

impl Recorder {
    pub fn new(variable: &str) -> Self {
        Self {
            id: format!("record_{}", variable),
            variable: variable.to_string(),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn seen(&self) -> Vec<Option<Value>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
#[typetag::serialize(name = "recorder")]
impl Action for Recorder {
    fn create(
        params: Value,
        _registry: &ActionRegistry,
    ) -> Result<Self> {
        Ok(Self::new(params.get("variable").and_then(Value::as_str).unwrap_or("item")))
    }

    fn schema() -> Value {
        Value::Null
    }

    fn type_name() -> &'static str {
        "recorder"
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        ""
    }

    fn action_type(&self) -> &str {
        Self::type_name()
    }

    async fn execute(
        &self,
        ctx: &mut ExecutionContext,
    ) -> Result<ActionResult> {
        self.seen.lock().unwrap().push(ctx.get_variable(&self.variable).cloned());
        Ok(ActionResult::success("recorded"))
    }
}

/// Raises a loop signal when the current loop index equals `index`.
#[derive(Serialize, Clone)]
pub struct SignalAt {
    id: String,
    index: usize,
    signal: LoopSignal,
}

impl SignalAt {
    pub fn new(
        index: usize,
        signal: LoopSignal,
    ) -> Self {
        Self {
            id: format!("{}_at_{}", signal, index),
            index,
            signal,
        }
    }
}

#[async_trait]
#[typetag::serialize(name = "signal_at")]
impl Action for SignalAt {
    fn create(
        _params: Value,
        _registry: &ActionRegistry,
    ) -> Result<Self> {
        Ok(Self::new(0, LoopSignal::Break))
    }

    fn schema() -> Value {
        Value::Null
    }

    fn type_name() -> &'static str {
        "signal_at"
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        ""
    }

    fn action_type(&self) -> &str {
        Self::type_name()
    }

    async fn execute(
        &self,
        ctx: &mut ExecutionContext,
    ) -> Result<ActionResult> {
        if ctx.loop_index() == Some(self.index) {
            match self.signal {
                LoopSignal::Break => ctx.request_break()?,
                LoopSignal::Continue => ctx.request_continue()?,
            }
        }
        Ok(ActionResult::success("checked"))
    }
}

/// Returns immediately and remembers every requested delay.
#[derive(Default)]
pub struct RecordingSleeper {
    recorded: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn recorded(&self) -> Vec<Duration> {
        self.recorded.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(
        &self,
        duration: Duration,
    ) {
        self.recorded.lock().unwrap().push(duration);
    }
}

#[derive(Default)]
pub struct StubDriver {
    fail: bool,
    refreshes: AtomicUsize,
}

impl StubDriver {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageDriver for StubDriver {
    async fn refresh(&self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AutoflowError::Navigation("browser disconnected".to_string()));
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Registry with the built-ins plus the test doubles above.
pub fn registry() -> ActionRegistry {
    let registry = ActionRegistry::with_builtins();
    registry.register::<ScriptedAction>().unwrap();
    registry.register::<Recorder>().unwrap();
    registry
}
