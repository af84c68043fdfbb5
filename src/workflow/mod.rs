pub mod actions;
pub mod condition;
mod graph;
pub mod template;
pub mod validator;

pub use graph::{Node, WorkflowGraph};
pub use validator::validate;
