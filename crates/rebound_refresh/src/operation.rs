//! The refresh operation a committed pull invokes

use std::fmt;
use std::sync::Arc;

use crate::cancel::CancellationHandle;
use crate::command::RefreshCommand;
use crate::deferral::{Deferral, RefreshRequestedArgs};
use crate::error::Result;

/// Handler for event-style refresh requests
pub type RefreshRequestedHandler = Arc<dyn Fn(&RefreshRequestedArgs) + Send + Sync>;

/// The two ways a host can supply refresh work
#[derive(Clone)]
pub enum RefreshOperation {
    /// Async callback that observes the cancellation handle
    Command(RefreshCommand),
    /// Notification completed through a deferral
    Event(RefreshRequestedHandler),
}

impl RefreshOperation {
    pub fn event<F>(handler: F) -> Self
    where
        F: Fn(&RefreshRequestedArgs) + Send + Sync + 'static,
    {
        RefreshOperation::Event(Arc::new(handler))
    }

    /// Run the operation to completion
    pub async fn invoke(&self, token: CancellationHandle) -> Result<()> {
        match self {
            RefreshOperation::Command(command) => {
                if !command.can_execute_ignoring_execution(&token) {
                    tracing::debug!("refresh command declined to run");
                    return Ok(());
                }
                command.execute(token).await
            }
            RefreshOperation::Event(handler) => {
                let (deferral, completion) = Deferral::new();
                let args = RefreshRequestedArgs::new(deferral, token);
                handler(&args);
                args.complete_if_not_deferred();
                completion.wait().await
            }
        }
    }
}

impl From<RefreshCommand> for RefreshOperation {
    fn from(command: RefreshCommand) -> Self {
        RefreshOperation::Command(command)
    }
}

impl fmt::Debug for RefreshOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshOperation::Command(command) => f.debug_tuple("Command").field(command).finish(),
            RefreshOperation::Event(_) => f.write_str("Event(..)"),
        }
    }
}
