mod queue;
mod shutdown;
mod variables;
mod vars;

pub use queue::BroadcastQueue;
pub use shutdown::Shutdown;
pub use variables::VariableStore;
pub use vars::Vars;
