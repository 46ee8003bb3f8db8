//! Rebound Animation System
//!
//! The compositor capability a refresh indicator animates through, and an
//! in-process implementation of it.
//!
//! # Features
//!
//! - **Expression Bindings**: Properties that continuously track manipulation inputs
//! - **Key-frame Animations**: Absolute or start-relative key frames with easing and repeats
//! - **Scoped Batches**: Completion signals once a group of key frames has settled
//! - **Reference Compositor**: [`AnimationScheduler`], ticked by the host every frame

pub mod compositor;
pub mod easing;
pub mod expression;
pub mod keyframe;
pub mod presets;
pub mod scheduler;

pub use compositor::{
    AnimatedProperty, BatchCompletion, BatchId, Compositor, CompositorError, SharedCompositor,
    VisualId,
};
pub use easing::Easing;
pub use expression::{ExpressionAnimation, PropertySet};
pub use keyframe::{IterationBehavior, Keyframe, KeyframePlayback, KeyframeValue, ScalarKeyframeAnimation};
pub use presets::AnimationPreset;
pub use scheduler::{AnimationScheduler, BindingKind};
