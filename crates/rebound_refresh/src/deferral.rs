//! Event-style refresh requests and deferrals
//!
//! A refresh-requested handler receives [`RefreshRequestedArgs`]. Handlers
//! that finish synchronously just return. Handlers that keep working after
//! returning take a [`Deferral`] and complete it when done. All deferrals
//! handed out for one request share a single completion, so several parts of
//! a page can each hold one and the first `complete` wins.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::cancel::CancellationHandle;
use crate::error::{RefreshError, Result};

#[derive(Debug)]
struct DeferralState {
    sender: Mutex<Option<oneshot::Sender<()>>>,
}

/// Completion handle for an event-style refresh
#[derive(Clone, Debug)]
pub struct Deferral {
    state: Arc<DeferralState>,
}

impl Deferral {
    /// Create a deferral and the future that resolves when it completes
    pub fn new() -> (Self, DeferralCompletion) {
        let (sender, receiver) = oneshot::channel();
        let deferral = Self {
            state: Arc::new(DeferralState {
                sender: Mutex::new(Some(sender)),
            }),
        };
        (deferral, DeferralCompletion { receiver })
    }

    /// Signal completion. Only the first call across all clones counts.
    pub fn complete(&self) -> bool {
        let sender = self.state.sender.lock().take();
        match sender {
            Some(sender) => {
                let _ = sender.send(());
                true
            }
            None => {
                tracing::debug!("deferral completed more than once");
                false
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state.sender.lock().is_none()
    }

    /// Complete the deferral when the returned guard goes out of scope
    pub fn complete_on_drop(self) -> DeferralGuard {
        DeferralGuard { deferral: self }
    }
}

/// Completes its deferral when dropped
#[derive(Debug)]
pub struct DeferralGuard {
    deferral: Deferral,
}

impl Drop for DeferralGuard {
    fn drop(&mut self) {
        self.deferral.complete();
    }
}

/// Resolves when a deferral completes or every clone of it is gone
#[derive(Debug)]
pub struct DeferralCompletion {
    receiver: oneshot::Receiver<()>,
}

impl DeferralCompletion {
    pub async fn wait(self) -> Result<()> {
        self.receiver
            .await
            .map_err(|_| RefreshError::DeferralAbandoned)
    }
}

/// Arguments passed to a refresh-requested handler
#[derive(Debug)]
pub struct RefreshRequestedArgs {
    deferral: Deferral,
    cancellation: CancellationHandle,
    deferred: Mutex<bool>,
}

impl RefreshRequestedArgs {
    pub(crate) fn new(deferral: Deferral, cancellation: CancellationHandle) -> Self {
        Self {
            deferral,
            cancellation,
            deferred: Mutex::new(false),
        }
    }

    /// Take a deferral; the refresh stays in progress until it completes
    pub fn get_deferral(&self) -> Deferral {
        *self.deferred.lock() = true;
        self.deferral.clone()
    }

    /// Cancellation handle of this refresh
    pub fn cancellation(&self) -> &CancellationHandle {
        &self.cancellation
    }

    pub(crate) fn was_deferred(&self) -> bool {
        *self.deferred.lock()
    }

    /// Complete on behalf of a handler that never deferred
    pub(crate) fn complete_if_not_deferred(self) {
        if !self.was_deferred() {
            self.deferral.complete();
        }
    }
}
