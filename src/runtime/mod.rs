mod channel;
mod context;
mod driver;
mod sleeper;

pub use channel::{Channel, ChannelEvent, ChannelOptions, EventHandle, EventListener};
pub use context::{ExecutionContext, LoopFrame};
pub use driver::PageDriver;
pub use sleeper::{Sleeper, TokioSleeper};
