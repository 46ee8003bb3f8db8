//! Pull-distance model
//!
//! Maps the raw over-scroll translation of the scrollable surface to the
//! three properties the refresh icon shows: rotation, opacity and offset.
//!
//! ```text
//! distance = max(0, top-down ? t : -t - scrollable_height)
//! rotation = min(distance * degree_multiplier, max_rotation_degrees)
//! opacity  = min(distance / pull_threshold, 1)
//! offset   = opacity * max_pulled_distance * direction sign
//! ```
//!
//! At the bottom edge of a list the surface reports a translation of
//! `-scrollable_height`, which is why bottom-up pulls subtract it.

use rebound_animation::expression::manipulation;
use rebound_animation::{ExpressionAnimation, PropertySet};

use crate::config::{PullDirection, RefreshConfiguration};

/// Derived values for one translation sample
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PullVisuals {
    pub distance: f32,
    pub rotation_degrees: f32,
    pub opacity: f32,
    pub icon_offset_y: f32,
}

/// Labels of the expression bindings, as reported by the compositor
pub mod labels {
    pub const ROTATION: &str = "pull.rotation";
    pub const OPACITY: &str = "pull.opacity";
    pub const OFFSET: &str = "pull.offset";
}

/// The continuous pull-distance model for one configuration
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PullModel {
    direction: PullDirection,
    max_pulled_distance: f32,
    max_rotation_degrees: f32,
    pull_threshold: f32,
    degree_multiplier: f32,
}

impl PullModel {
    pub fn new(config: &RefreshConfiguration) -> Self {
        Self {
            direction: config.direction,
            max_pulled_distance: config.max_pulled_distance,
            max_rotation_degrees: config.max_rotation_degrees,
            pull_threshold: config.pull_threshold,
            degree_multiplier: config.degree_multiplier,
        }
    }

    pub fn direction(&self) -> PullDirection {
        self.direction
    }

    /// Over-scroll distance, never negative
    pub fn pull_distance(&self, translation_y: f32, scrollable_height: f32) -> f32 {
        let raw = match self.direction {
            PullDirection::TopDown => translation_y,
            PullDirection::BottomUp => -translation_y - scrollable_height,
        };
        raw.max(0.0)
    }

    pub fn rotation_degrees(&self, distance: f32) -> f32 {
        (distance * self.degree_multiplier).min(self.max_rotation_degrees)
    }

    pub fn opacity(&self, distance: f32) -> f32 {
        (distance / self.pull_threshold).min(1.0)
    }

    /// Signed icon offset; negative when pulling up from the bottom
    pub fn icon_offset_y(&self, distance: f32) -> f32 {
        self.opacity(distance) * self.max_pulled_distance * self.direction.sign()
    }

    pub fn evaluate(&self, translation_y: f32, scrollable_height: f32) -> PullVisuals {
        let distance = self.pull_distance(translation_y, scrollable_height);
        PullVisuals {
            distance,
            rotation_degrees: self.rotation_degrees(distance),
            opacity: self.opacity(distance),
            icon_offset_y: self.icon_offset_y(distance),
        }
    }

    fn distance_from(&self, inputs: &PropertySet) -> f32 {
        self.pull_distance(
            inputs.scalar(manipulation::TRANSLATION_Y),
            inputs.scalar(manipulation::SCROLLABLE_HEIGHT),
        )
    }

    pub fn rotation_expression(&self) -> ExpressionAnimation {
        let model = *self;
        ExpressionAnimation::new(labels::ROTATION, move |inputs| {
            model.rotation_degrees(model.distance_from(inputs))
        })
    }

    pub fn opacity_expression(&self) -> ExpressionAnimation {
        let model = *self;
        ExpressionAnimation::new(labels::OPACITY, move |inputs| {
            model.opacity(model.distance_from(inputs))
        })
    }

    /// Drives both the icon offset and the list border offset
    pub fn offset_expression(&self) -> ExpressionAnimation {
        let model = *self;
        ExpressionAnimation::new(labels::OFFSET, move |inputs| {
            model.icon_offset_y(model.distance_from(inputs))
        })
    }
}
