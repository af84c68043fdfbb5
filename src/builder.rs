use std::sync::Arc;

use tokio::runtime::Runtime;

use crate::{
    Config, Engine, Result,
    dispatcher::{Dispatcher, Executor},
    engine::ErrorHandlerFactory,
    recovery::ErrorHandler,
    runtime::{PageDriver, Sleeper, TokioSleeper},
    workflow::actions::ActionRegistry,
};

/// Assembles an [`Engine`].
///
/// Everything is optional: by default the engine uses [`Config::default`],
/// a registry holding the built-in actions, the sequential [`Dispatcher`] and
/// an error handler configured from the `[recovery]` section.
#[derive(Default)]
pub struct EngineBuilder {
    config: Option<Config>,
    registry: Option<Arc<ActionRegistry>>,
    executor: Option<Arc<dyn Executor>>,
    error_handler: Option<ErrorHandlerFactory>,
    driver: Option<Arc<dyn PageDriver>>,
    sleeper: Option<Arc<dyn Sleeper>>,
    rt: Option<Arc<Runtime>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = Some(config);
        self
    }

    /// Use `registry` instead of a fresh one with the built-in actions.
    pub fn registry(
        mut self,
        registry: Arc<ActionRegistry>,
    ) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn executor(
        mut self,
        executor: Arc<dyn Executor>,
    ) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Called once per execution to build its error handler.
    pub fn error_handler(
        mut self,
        factory: impl Fn() -> ErrorHandler + Send + Sync + 'static,
    ) -> Self {
        self.error_handler = Some(Arc::new(factory));
        self
    }

    /// Page driver handed to every execution context.
    pub fn driver(
        mut self,
        driver: Arc<dyn PageDriver>,
    ) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn sleeper(
        mut self,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Runtime used by [`Engine::execute_blocking`].
    pub fn runtime(
        mut self,
        runtime: Arc<Runtime>,
    ) -> Self {
        self.rt = Some(runtime);
        self
    }

    pub fn build(self) -> Result<Engine> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let registry = match self.registry {
            Some(registry) => registry,
            None => {
                let registry = ActionRegistry::new();
                registry.register_builtins()?;
                Arc::new(registry)
            }
        };
        let error_handler = self.error_handler.unwrap_or_else(|| {
            let capacity = config.engine.error_history_size;
            let recovery = config.recovery.clone();
            Arc::new(move || ErrorHandler::with_default_strategies(capacity, &recovery))
        });

        Ok(Engine::new(
            config,
            registry,
            self.executor.unwrap_or_else(|| Arc::new(Dispatcher::new())),
            error_handler,
            self.driver,
            self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper)),
            self.rt,
        ))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        Vars,
        model::{NodeDefinition, WorkflowDefinition},
        recovery::SkipStrategy,
        workflow::actions::testing::{RecordingSleeper, StubDriver},
    };

    #[tokio::test]
    async fn test_custom_parts_reach_the_execution() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let config = Config::load_from_str("[engine]\nerror_history_size = 5").unwrap();
        let engine = EngineBuilder::new()
            .config(config)
            .sleeper(sleeper.clone())
            .driver(Arc::new(StubDriver::default()))
            .error_handler(|| ErrorHandler::new(5).with_strategy(SkipStrategy))
            .build()
            .unwrap();
        assert_eq!(engine.config().engine.error_history_size, 5);

        let workflow = WorkflowDefinition::new("wf", "skips")
            .with_node("retry", NodeDefinition::new("retry", json!({"action": {"type": "fail"}, "max_retries": 2, "delay_seconds": 0.5})));
        let result = engine.execute(&workflow, Vars::new()).await;

        assert!(result.success, "{:?}", result.errors);
        assert!(result.node_result("retry").unwrap().recovered);
        assert_eq!(sleeper.recorded().len(), 2);
    }

    #[test]
    fn test_build_rejects_invalid_recovery_config() {
        let mut config = Config::default();
        config.recovery.delay_seconds = -1.0;
        assert!(EngineBuilder::new().config(config).build().is_err());

        let mut config = Config::default();
        config.recovery.wait_seconds = f64::NAN;
        assert!(EngineBuilder::new().config(config).build().is_err());
    }

    #[test]
    fn test_shared_registry() {
        let registry = Arc::new(ActionRegistry::with_builtins());
        let engine = EngineBuilder::new().registry(registry.clone()).build().unwrap();
        assert!(Arc::ptr_eq(&engine.registry(), &registry));
    }
}
