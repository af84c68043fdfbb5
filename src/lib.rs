//! # Autoflow
//!
//! Autoflow is the action-execution and error-recovery core of a UI and
//! browser automation engine. Workflows are declared as JSON: a graph of
//! nodes, each of which is a tree of actions.
//!
//! ## Core Features
//!
//! - **Open Action Registry**: Actions and conditions are built from JSON definitions by type name, and new types can be registered at any time
//! - **Control Flow**: `for_each`, `while`, `retry` with exponential backoff and `try_catch` with finally semantics
//! - **Error Recovery**: Failures are classified into an [`ErrorContext`] and offered to a chain of recovery strategies
//! - **Validation**: Workflow definitions are checked (identity, nodes, connections, cycles) before anything runs
//! - **Event-Driven**: Workflow, action and variable events are published to listeners and async subscribers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use autoflow::{EngineBuilder, Vars, WorkflowDefinition};
//!
//! let engine = EngineBuilder::new().build()?;
//! let workflow = WorkflowDefinition::from_json(json_str)?;
//! let result = engine.execute(&workflow, Vars::new()).await;
//! println!("{}: {:?}", result.state, result.errors);
//! ```

mod builder;
mod common;
mod config;
mod dispatcher;
mod engine;
mod error;
pub mod events;
mod model;
pub mod recovery;
pub mod runtime;
mod utils;
pub mod workflow;

use std::sync::{Arc, RwLock};

pub use builder::EngineBuilder;
pub use common::{Shutdown, VariableStore, Vars};
pub use config::{Config, EngineConfig, RecoveryConfig, StrategyKind};
pub use dispatcher::{Dispatcher, ExecutionReport, Executor, NodeResult};
pub use engine::{Engine, ErrorHandlerFactory, ExecutionResult, ExecutionState};
pub use error::AutoflowError;
pub use model::*;
pub use recovery::{ErrorCategory, ErrorContext, ErrorHandler, ErrorSeverity, RecoveryResult, RecoveryScope, RecoveryStrategy};
pub use runtime::{ChannelEvent, ChannelOptions, ExecutionContext, PageDriver, Sleeper};
pub use workflow::{
    actions::{Action, ActionRegistry, ActionResult},
    condition::Condition,
};

/// Result type alias for Autoflow operations.
pub type Result<T> = std::result::Result<T, AutoflowError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
