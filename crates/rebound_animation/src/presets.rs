//! Animation presets for refresh indicators
//!
//! Pre-built key-frame animations for the loading and reset phases of a
//! refresh indicator.

use crate::easing::Easing;
use crate::keyframe::ScalarKeyframeAnimation;

/// Pre-built animation presets
pub struct AnimationPreset;

impl AnimationPreset {
    /// One full turn per `period_ms`, relative to the current angle, until stopped
    pub fn spin(period_ms: u32) -> ScalarKeyframeAnimation {
        ScalarKeyframeAnimation::new(period_ms)
            .keyframe_from_start(0.0, 0.0, Easing::Linear)
            .keyframe_from_start(1.0, 360.0, Easing::Linear)
            .forever()
    }

    /// Animate from the current value down to zero
    pub fn collapse(duration_ms: u32) -> ScalarKeyframeAnimation {
        ScalarKeyframeAnimation::new(duration_ms).keyframe(1.0, 0.0, Easing::STANDARD)
    }
}
