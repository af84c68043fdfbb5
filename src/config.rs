use std::{fs, path::Path};

use serde::Deserialize;

use crate::{AutoflowError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// engine config
    pub engine: EngineConfig,
    /// defaults for the built-in recovery strategies
    pub recovery: RecoveryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// errors kept per execution by the error handler, defaults to 100
    pub error_history_size: usize,
    /// capacity of the broadcast queue behind `Channel::subscribe`, defaults to 2048
    pub event_queue_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            error_history_size: 100,
            event_queue_size: 2048,
        }
    }
}

/// Strategy names accepted in `recovery.strategies`.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, strum::AsRefStr, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StrategyKind {
    Retry,
    WaitAndRetry,
    RefreshPage,
    Skip,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// retries per logical error, defaults to 3
    pub max_retries: u32,
    /// initial retry delay, defaults to 1.0
    pub delay_seconds: f64,
    /// multiplier applied after each retry, defaults to 2.0
    pub backoff_factor: f64,
    /// fixed wait of the wait-and-retry strategy, defaults to 2.0
    pub wait_seconds: f64,
    /// strategies installed by `ErrorHandler::with_default_strategies`, in order
    pub strategies: Vec<StrategyKind>,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_seconds: 1.0,
            backoff_factor: 2.0,
            wait_seconds: 2.0,
            strategies: vec![StrategyKind::Retry],
        }
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref()).map_err(|err| AutoflowError::Config(format!("failed to load config file {:?}: {}", path.as_ref(), err)))?;

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config = toml::from_str::<Config>(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let recovery = &self.recovery;
        if !recovery.delay_seconds.is_finite() || recovery.delay_seconds < 0.0 {
            return Err(AutoflowError::Config(format!("recovery.delay_seconds must be >= 0, got {}", recovery.delay_seconds)));
        }
        if !recovery.wait_seconds.is_finite() || recovery.wait_seconds < 0.0 {
            return Err(AutoflowError::Config(format!("recovery.wait_seconds must be >= 0, got {}", recovery.wait_seconds)));
        }
        if !recovery.backoff_factor.is_finite() || recovery.backoff_factor <= 0.0 {
            return Err(AutoflowError::Config(format!("recovery.backoff_factor must be > 0, got {}", recovery.backoff_factor)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::{Config, config::StrategyKind};

    #[test]
    fn test_config_deserialize() {
        let toml_str = r#"
        [engine]
        error_history_size = 10

        [recovery]
        max_retries = 5
        backoff_factor = 1.5
        strategies = ["wait_and_retry", "refresh_page", "skip"]
        "#;
        let config = Config::load_from_str(toml_str).unwrap();
        assert_eq!(config.engine.error_history_size, 10);
        assert_eq!(config.engine.event_queue_size, 2048);
        assert_eq!(config.recovery.max_retries, 5);
        assert_eq!(config.recovery.delay_seconds, 1.0);
        assert_eq!(config.recovery.strategies, vec![StrategyKind::WaitAndRetry, StrategyKind::RefreshPage, StrategyKind::Skip]);
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::load_from_str("").unwrap();
        assert_eq!(config.engine.error_history_size, 100);
        assert_eq!(config.recovery.strategies, vec![StrategyKind::Retry]);
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(Config::load_from_str("[recovery]\nbackoff_factor = 0.0").is_err());
        assert!(Config::load_from_str("[recovery]\nstrategies = [\"pray\"]").is_err());
        assert!(Config::create("/nonexistent/autoflow.toml").is_err());
    }
}
