//! Refresh indicator visuals
//!
//! Owns the animations applied to the refresh icon and the list border and
//! applies them through the injected compositor. Every call takes the
//! compositor lock briefly and releases it before returning.

use rebound_animation::expression::manipulation;
use rebound_animation::{
    AnimatedProperty, AnimationPreset, BatchCompletion, Compositor, ExpressionAnimation,
    ScalarKeyframeAnimation, SharedCompositor, VisualId,
};

use crate::config::{PullDirection, RefreshConfiguration};
use crate::error::Result;
use crate::pull::PullModel;

/// The icon and border visuals and the animations that drive them
pub struct RefreshVisuals<C> {
    compositor: SharedCompositor<C>,
    icon: VisualId,
    border: VisualId,
    direction: PullDirection,
    rotation: ExpressionAnimation,
    opacity: ExpressionAnimation,
    offset: ExpressionAnimation,
    spin: ScalarKeyframeAnimation,
    collapse: ScalarKeyframeAnimation,
}

impl<C: Compositor> RefreshVisuals<C> {
    pub fn new(
        compositor: SharedCompositor<C>,
        icon: VisualId,
        border: VisualId,
        config: &RefreshConfiguration,
    ) -> Self {
        let model = PullModel::new(config);
        Self {
            compositor,
            icon,
            border,
            direction: config.direction,
            rotation: model.rotation_expression(),
            opacity: model.opacity_expression(),
            offset: model.offset_expression(),
            spin: AnimationPreset::spin(config.spin_period_ms),
            collapse: AnimationPreset::collapse(config.reset_duration_ms),
        }
    }

    pub fn compositor(&self) -> &SharedCompositor<C> {
        &self.compositor
    }

    pub fn icon(&self) -> VisualId {
        self.icon
    }

    pub fn border(&self) -> VisualId {
        self.border
    }

    /// Bind the pull expressions. Rotation is left alone while a loading spin owns it.
    pub fn start_expressions(&self, include_rotation: bool) -> Result<()> {
        let mut compositor = self.compositor.lock();
        if include_rotation {
            compositor.start_expression(self.icon, AnimatedProperty::RotationDegrees, &self.rotation)?;
        }
        compositor.start_expression(self.icon, AnimatedProperty::Opacity, &self.opacity)?;
        compositor.start_expression(self.icon, AnimatedProperty::OffsetY, &self.offset)?;
        compositor.start_expression(self.border, AnimatedProperty::OffsetY, &self.offset)?;
        Ok(())
    }

    pub fn stop_expressions(&self, include_rotation: bool) -> Result<()> {
        let mut compositor = self.compositor.lock();
        if include_rotation {
            compositor.stop_animation(self.icon, AnimatedProperty::RotationDegrees)?;
        }
        compositor.stop_animation(self.icon, AnimatedProperty::Opacity)?;
        compositor.stop_animation(self.icon, AnimatedProperty::OffsetY)?;
        compositor.stop_animation(self.border, AnimatedProperty::OffsetY)?;
        Ok(())
    }

    /// Hand the icon rotation over to the endless loading spin
    pub fn start_loading_spin(&self) -> Result<()> {
        self.compositor
            .lock()
            .start_keyframes(self.icon, AnimatedProperty::RotationDegrees, &self.spin)?;
        Ok(())
    }

    /// Read the icon offset for this tick.
    ///
    /// Reading detaches the offset binding on some compositors, so the
    /// binding is stopped, read and bound again every time.
    pub fn sample_icon_offset(&self) -> Result<f32> {
        let mut compositor = self.compositor.lock();
        compositor.stop_animation(self.icon, AnimatedProperty::OffsetY)?;
        let offset = compositor.property_value(self.icon, AnimatedProperty::OffsetY)?;
        compositor.start_expression(self.icon, AnimatedProperty::OffsetY, &self.offset)?;
        Ok(offset)
    }

    /// Freeze the icon opacity and the list border at full pull
    pub fn hold_at_max(&self) -> Result<()> {
        let mut compositor = self.compositor.lock();
        compositor.stop_animation(self.icon, AnimatedProperty::Opacity)?;
        compositor.stop_animation(self.border, AnimatedProperty::OffsetY)?;
        Ok(())
    }

    /// Fade the icon and collapse the border in one scoped batch
    pub fn begin_reset(&self) -> Result<BatchCompletion> {
        let mut compositor = self.compositor.lock();
        let batch = compositor.begin_batch();
        compositor.start_keyframes(self.border, AnimatedProperty::OffsetY, &self.collapse)?;
        compositor.start_keyframes(self.icon, AnimatedProperty::Opacity, &self.collapse)?;
        Ok(compositor.end_batch(batch)?)
    }

    /// Publish the scrollable height for bottom-up pulls
    pub fn update_scrollable_height(&self, height: f32) {
        if self.direction == PullDirection::BottomUp {
            self.compositor
                .lock()
                .insert_manipulation_scalar(manipulation::SCROLLABLE_HEIGHT, height);
        }
    }
}
