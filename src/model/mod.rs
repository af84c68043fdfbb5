mod connection;
mod node;
mod workflow;

pub use connection::Connection;
pub use node::NodeDefinition;
pub use workflow::WorkflowDefinition;
