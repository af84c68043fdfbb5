//! Built-in recovery strategies.

mod composite;
mod fallback;
mod reauthenticate;
mod refresh;
mod retry;
mod skip;

pub use composite::CompositeStrategy;
pub use fallback::FallbackStrategy;
pub use reauthenticate::{AUTH_REQUIRED_KEY, ReauthenticateStrategy};
pub use refresh::RefreshPageStrategy;
pub use retry::{RetryStrategy, WaitAndRetryStrategy};
pub use skip::SkipStrategy;
