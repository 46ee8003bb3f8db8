//! Expression bindings
//!
//! An [`ExpressionAnimation`] drives a property from a formula over a
//! [`PropertySet`]. The compositor evaluates it whenever the property is read,
//! so the property tracks its inputs continuously instead of animating
//! towards a fixed target.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

/// Well-known scalars published by a scroll manipulation
pub mod manipulation {
    /// Current over-scroll translation along Y (signed, logical pixels)
    pub const TRANSLATION_Y: &str = "Translation.Y";
    /// Height of the scrollable content beyond the viewport
    pub const SCROLLABLE_HEIGHT: &str = "ScrollableHeight";
}

/// Named scalar inputs for expressions
#[derive(Clone, Debug, Default)]
pub struct PropertySet {
    scalars: FxHashMap<String, f32>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_scalar(&mut self, name: impl Into<String>, value: f32) {
        self.scalars.insert(name.into(), value);
    }

    /// Read a scalar. Missing names read as 0.0.
    pub fn scalar(&self, name: &str) -> f32 {
        self.scalars.get(name).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scalars.contains_key(name)
    }
}

type Formula = dyn Fn(&PropertySet) -> f32 + Send + Sync;

/// A continuously evaluated formula bound to a property
#[derive(Clone)]
pub struct ExpressionAnimation {
    label: &'static str,
    formula: Arc<Formula>,
}

impl ExpressionAnimation {
    pub fn new<F>(label: &'static str, formula: F) -> Self
    where
        F: Fn(&PropertySet) -> f32 + Send + Sync + 'static,
    {
        Self {
            label,
            formula: Arc::new(formula),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn evaluate(&self, inputs: &PropertySet) -> f32 {
        (self.formula)(inputs)
    }
}

impl fmt::Debug for ExpressionAnimation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionAnimation")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_tracks_inputs() {
        let doubled = ExpressionAnimation::new("doubled", |p| {
            p.scalar(manipulation::TRANSLATION_Y) * 2.0
        });
        let mut inputs = PropertySet::new();

        assert_eq!(doubled.evaluate(&inputs), 0.0);
        inputs.insert_scalar(manipulation::TRANSLATION_Y, 21.0);
        assert_eq!(doubled.evaluate(&inputs), 42.0);
        assert_eq!(doubled.label(), "doubled");
    }

    #[test]
    fn test_missing_scalar_reads_zero() {
        let inputs = PropertySet::new();
        assert!(!inputs.contains(manipulation::SCROLLABLE_HEIGHT));
        assert_eq!(inputs.scalar(manipulation::SCROLLABLE_HEIGHT), 0.0);
    }
}
