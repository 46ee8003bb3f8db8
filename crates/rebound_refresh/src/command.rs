//! Command-style refresh operations
//!
//! A [`RefreshCommand`] wraps an async callback that receives the refresh's
//! cancellation handle. It tracks whether it is executing and publishes every
//! change of that flag, so a host can grey out a manual refresh button while
//! a pull-triggered refresh runs.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::watch;

use crate::cancel::CancellationHandle;
use crate::error::Result;

type ExecuteFn = dyn Fn(CancellationHandle) -> BoxFuture<'static, Result<()>> + Send + Sync;
type CanExecuteFn = dyn Fn(&CancellationHandle) -> bool + Send + Sync;

struct CommandInner {
    execute: Box<ExecuteFn>,
    can_execute: Box<CanExecuteFn>,
    executing: watch::Sender<bool>,
}

/// A cancellable async refresh callback
#[derive(Clone)]
pub struct RefreshCommand {
    inner: Arc<CommandInner>,
}

impl RefreshCommand {
    pub fn new<F, Fut>(execute: F) -> Self
    where
        F: Fn(CancellationHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self::with_can_execute(execute, |_| true)
    }

    /// Create a command guarded by a predicate
    pub fn with_can_execute<F, Fut, P>(execute: F, can_execute: P) -> Self
    where
        F: Fn(CancellationHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
        P: Fn(&CancellationHandle) -> bool + Send + Sync + 'static,
    {
        let (executing, _) = watch::channel(false);
        Self {
            inner: Arc::new(CommandInner {
                execute: Box::new(move |token| execute(token).boxed()),
                can_execute: Box::new(can_execute),
                executing,
            }),
        }
    }

    /// Whether the command may run now
    pub fn can_execute(&self, token: &CancellationHandle) -> bool {
        !self.is_executing() && (self.inner.can_execute)(token)
    }

    /// Like [`can_execute`](Self::can_execute), but lets a superseding run
    /// proceed while the previous one is still unwinding
    pub fn can_execute_ignoring_execution(&self, token: &CancellationHandle) -> bool {
        (self.inner.can_execute)(token)
    }

    pub fn is_executing(&self) -> bool {
        *self.inner.executing.borrow()
    }

    /// Observe changes of the executing flag
    pub fn subscribe_executing(&self) -> watch::Receiver<bool> {
        self.inner.executing.subscribe()
    }

    /// Run the callback, marking the command as executing until it returns
    pub async fn execute(&self, token: CancellationHandle) -> Result<()> {
        let _executing = ExecutingGuard::enter(&self.inner.executing);
        (self.inner.execute)(token).await
    }
}

impl fmt::Debug for RefreshCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshCommand")
            .field("executing", &self.is_executing())
            .finish_non_exhaustive()
    }
}

/// Clears the executing flag even if the future is dropped mid-flight
struct ExecutingGuard<'a> {
    flag: &'a watch::Sender<bool>,
}

impl<'a> ExecutingGuard<'a> {
    fn enter(flag: &'a watch::Sender<bool>) -> Self {
        flag.send_replace(true);
        Self { flag }
    }
}

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        self.flag.send_replace(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RefreshError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_execute_runs_callback() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let command = RefreshCommand::new(move |_token| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        command.execute(CancellationHandle::new()).await.unwrap();
        command.execute(CancellationHandle::new()).await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(!command.is_executing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_executing_flag_is_published() {
        let command = RefreshCommand::new(|_token| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(())
        });
        let mut changes = command.subscribe_executing();
        let token = CancellationHandle::new();

        let running = tokio::spawn({
            let command = command.clone();
            let token = token.clone();
            async move { command.execute(token).await }
        });

        changes.changed().await.unwrap();
        assert!(*changes.borrow_and_update());
        assert!(!command.can_execute(&token));
        assert!(command.can_execute_ignoring_execution(&token));

        running.await.unwrap().unwrap();
        changes.changed().await.unwrap();
        assert!(!*changes.borrow_and_update());
        assert!(command.can_execute(&token));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_execution_clears_flag() {
        let command = RefreshCommand::new(|token: CancellationHandle| async move {
            token
                .run_until_cancelled(tokio::time::sleep(Duration::from_secs(5)))
                .await
        });
        let token = CancellationHandle::new();

        let running = tokio::spawn({
            let command = command.clone();
            let token = token.clone();
            async move { command.execute(token).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(command.is_executing());

        token.cancel();
        let result = running.await.unwrap();
        assert!(matches!(result, Err(RefreshError::Cancelled)));
        assert!(!command.is_executing());
    }

    #[test]
    fn test_predicate_guards_execution() {
        let allowed = Arc::new(AtomicBool::new(false));
        let gate = allowed.clone();
        let command = RefreshCommand::with_can_execute(
            |_token| async { Ok(()) },
            move |_token| gate.load(Ordering::SeqCst),
        );
        let token = CancellationHandle::new();

        assert!(!command.can_execute(&token));
        assert!(!command.can_execute_ignoring_execution(&token));
        allowed.store(true, Ordering::SeqCst);
        assert!(command.can_execute(&token));
    }
}
