use std::future::Future;

use tokio::sync::watch;

/// One-shot cancellation signal shared between an engine and its executions.
#[derive(Debug)]
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender,
        }
    }

    /// Trigger the signal. Idempotent.
    pub fn shutdown(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_terminated(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once [`Shutdown::shutdown`] has been called.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut receiver = self.sender.subscribe();
        async move {
            // An error means the sender is gone, which can only happen once
            // nothing is left to cancel.
            let _ = receiver.wait_for(|terminated| *terminated).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;

    #[tokio::test]
    async fn test_wait_resolves_after_shutdown() {
        let shutdown = Arc::new(Shutdown::new());
        assert!(!shutdown.is_terminated());

        let waiter = shutdown.wait();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            trigger.shutdown();
        });

        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap();
        assert!(shutdown.is_terminated());
    }

    #[tokio::test]
    async fn test_wait_after_shutdown_is_immediate() {
        let shutdown = Shutdown::new();
        shutdown.shutdown();
        tokio::time::timeout(Duration::from_millis(100), shutdown.wait()).await.unwrap();
    }
}
