//! Cooperative cancellation

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{RefreshError, Result};

/// A cloneable cancellation flag shared by a refresh and whoever may supersede it
///
/// Cancelling only signals intent. The operation observes it at its own
/// await points and unwinds.
#[derive(Clone, Debug)]
pub struct CancellationHandle {
    state: Arc<watch::Sender<bool>>,
}

impl CancellationHandle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Request cancellation. Returns `false` if it was already requested.
    pub fn cancel(&self) -> bool {
        self.state.send_if_modified(|cancelled| !std::mem::replace(cancelled, true))
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Fail with [`RefreshError::Cancelled`] once cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(RefreshError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves once cancellation is requested
    pub async fn cancelled(&self) {
        let mut receiver = self.state.subscribe();
        // The sender lives as long as `self`, so this only returns on cancellation
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }

    /// Run a future unless cancellation wins the race
    pub async fn run_until_cancelled<F, T>(&self, future: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(RefreshError::Cancelled),
            value = future => Ok(value),
        }
    }
}

impl Default for CancellationHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cancel_once() {
        let handle = CancellationHandle::new();
        let clone = handle.clone();
        assert!(handle.check().is_ok());

        assert!(clone.cancel());
        assert!(!handle.cancel());
        assert!(handle.is_cancelled());
        assert!(matches!(handle.check(), Err(RefreshError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_sleep() {
        let handle = CancellationHandle::new();
        let canceller = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let result = handle
            .run_until_cancelled(tokio::time::sleep(Duration::from_secs(10)))
            .await;
        assert!(matches!(result, Err(RefreshError::Cancelled)));
    }

    #[tokio::test]
    async fn test_uncancelled_future_completes() {
        let handle = CancellationHandle::new();
        let value = handle.run_until_cancelled(async { 7 }).await.unwrap();
        assert_eq!(value, 7);
    }
}
