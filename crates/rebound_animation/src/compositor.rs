//! Compositor capability
//!
//! The operations a host compositor must offer to animate visuals: bind
//! expressions, run key frames, stop bindings, read values and group key
//! frames into scoped batches that signal when they are done.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use slotmap::new_key_type;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::expression::ExpressionAnimation;
use crate::keyframe::ScalarKeyframeAnimation;

new_key_type! {
    /// A visual owned by the compositor
    pub struct VisualId;
    /// A scoped animation batch
    pub struct BatchId;
}

/// Animatable scalar properties of a visual
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnimatedProperty {
    Opacity,
    OffsetY,
    RotationDegrees,
}

impl AnimatedProperty {
    /// Value a fresh visual reports before anything animates it
    pub fn default_value(self) -> f32 {
        match self {
            AnimatedProperty::Opacity => 1.0,
            AnimatedProperty::OffsetY | AnimatedProperty::RotationDegrees => 0.0,
        }
    }
}

/// Compositor errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositorError {
    /// The visual was never created or has been removed
    #[error("unknown visual {0:?}")]
    UnknownVisual(VisualId),

    /// The batch was never created or has already completed
    #[error("unknown batch {0:?}")]
    UnknownBatch(BatchId),

    /// The batch was already ended
    #[error("batch {0:?} is already closed")]
    BatchClosed(BatchId),
}

/// Result type for compositor operations
pub type Result<T> = std::result::Result<T, CompositorError>;

/// The compositor capability the refresh controller drives
pub trait Compositor: Send + 'static {
    /// Publish a scalar on the scroll manipulation property set
    fn insert_manipulation_scalar(&mut self, name: &str, value: f32);

    /// Bind a property to an expression, replacing any running animation
    fn start_expression(
        &mut self,
        visual: VisualId,
        property: AnimatedProperty,
        expression: &ExpressionAnimation,
    ) -> Result<()>;

    /// Run key frames on a property, starting from its current value
    fn start_keyframes(
        &mut self,
        visual: VisualId,
        property: AnimatedProperty,
        animation: &ScalarKeyframeAnimation,
    ) -> Result<()>;

    /// Detach whatever drives the property, leaving it at its last value
    fn stop_animation(&mut self, visual: VisualId, property: AnimatedProperty) -> Result<()>;

    /// Current value of a property
    fn property_value(&self, visual: VisualId, property: AnimatedProperty) -> Result<f32>;

    /// Open a scoped batch. Key frames started while it is open belong to it.
    fn begin_batch(&mut self) -> BatchId;

    /// Close a batch. Completion fires once every animation in it has
    /// finished or been stopped, immediately if it is empty.
    fn end_batch(&mut self, batch: BatchId) -> Result<BatchCompletion>;
}

/// A compositor shared between the host and the refresh controller
pub type SharedCompositor<C> = Arc<Mutex<C>>;

/// Resolves when a scoped batch completes
#[derive(Debug)]
pub struct BatchCompletion {
    receiver: oneshot::Receiver<()>,
    done: bool,
}

impl BatchCompletion {
    /// Create a completion handle and the sender that resolves it
    pub fn channel() -> (oneshot::Sender<()>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { receiver, done: false })
    }

    /// An already completed batch
    pub fn ready() -> Self {
        let (sender, completion) = Self::channel();
        let _ = sender.send(());
        completion
    }

    /// Non-blocking check used by tick-driven hosts
    pub fn try_complete(&mut self) -> bool {
        if !self.done {
            self.done = !matches!(
                self.receiver.try_recv(),
                Err(oneshot::error::TryRecvError::Empty)
            );
        }
        self.done
    }
}

impl Future for BatchCompletion {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.done {
            return Poll::Ready(());
        }
        // A dropped sender means the compositor went away; nothing left to wait for
        let polled = Pin::new(&mut self.receiver).poll(cx).map(|_| ());
        if polled.is_ready() {
            self.done = true;
        }
        polled
    }
}
