use std::time::Duration;

use async_trait::async_trait;

/// Source of delays for retry backoff and wait-based recovery.
///
/// Delays are awaited in place: an execution does not continue until the
/// sleep returns. Tests swap in a recording implementation.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(
        &self,
        duration: Duration,
    );
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(
        &self,
        duration: Duration,
    ) {
        tokio::time::sleep(duration).await;
    }
}
