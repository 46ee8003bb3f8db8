//! Animation scheduler
//!
//! A tick-driven in-process compositor. It owns visuals, evaluates
//! expression bindings on read, advances key frames each frame and resolves
//! scoped batches once their key frames are done.

use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use tokio::sync::oneshot;

use crate::compositor::{
    AnimatedProperty, BatchCompletion, BatchId, Compositor, CompositorError, Result, VisualId,
};
use crate::expression::{ExpressionAnimation, PropertySet};
use crate::keyframe::{KeyframePlayback, ScalarKeyframeAnimation};

/// What currently drives a property
#[derive(Clone, Debug)]
enum Binding {
    Expression(ExpressionAnimation),
    Keyframes {
        playback: KeyframePlayback,
        batch: Option<BatchId>,
    },
}

/// Kind of binding attached to a property, for inspection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingKind {
    Expression(&'static str),
    Keyframes,
}

#[derive(Debug, Default)]
struct VisualState {
    values: FxHashMap<AnimatedProperty, f32>,
    bindings: FxHashMap<AnimatedProperty, Binding>,
}

impl VisualState {
    fn static_value(&self, property: AnimatedProperty) -> f32 {
        self.values
            .get(&property)
            .copied()
            .unwrap_or_else(|| property.default_value())
    }
}

#[derive(Debug)]
struct BatchState {
    open: bool,
    pending: usize,
    completion: Option<oneshot::Sender<()>>,
}

/// The animation scheduler that ticks all active animations
pub struct AnimationScheduler {
    visuals: SlotMap<VisualId, VisualState>,
    batches: SlotMap<BatchId, BatchState>,
    open_batch: Option<BatchId>,
    manipulation: PropertySet,
    elapsed_ms: f64,
}

impl AnimationScheduler {
    pub fn new() -> Self {
        Self {
            visuals: SlotMap::with_key(),
            batches: SlotMap::with_key(),
            open_batch: None,
            manipulation: PropertySet::new(),
            elapsed_ms: 0.0,
        }
    }

    pub fn create_visual(&mut self) -> VisualId {
        self.visuals.insert(VisualState::default())
    }

    pub fn remove_visual(&mut self, visual: VisualId) -> bool {
        let Some(state) = self.visuals.remove(visual) else {
            return false;
        };
        for (_, binding) in state.bindings {
            self.release(binding);
        }
        true
    }

    /// Assign a static value, detaching any animation on the property
    pub fn set_property(
        &mut self,
        visual: VisualId,
        property: AnimatedProperty,
        value: f32,
    ) -> Result<()> {
        let state = self
            .visuals
            .get_mut(visual)
            .ok_or(CompositorError::UnknownVisual(visual))?;
        state.values.insert(property, value);
        let previous = state.bindings.remove(&property);
        if let Some(binding) = previous {
            self.release(binding);
        }
        Ok(())
    }

    /// The scroll manipulation inputs expressions read from
    pub fn manipulation(&self) -> &PropertySet {
        &self.manipulation
    }

    /// Convenience for hosts feeding over-scroll translation
    pub fn set_translation_y(&mut self, y: f32) {
        self.manipulation
            .insert_scalar(crate::expression::manipulation::TRANSLATION_Y, y);
    }

    /// Kind of binding on a property, if any
    pub fn binding(&self, visual: VisualId, property: AnimatedProperty) -> Option<BindingKind> {
        let binding = self.visuals.get(visual)?.bindings.get(&property)?;
        Some(match binding {
            Binding::Expression(expr) => BindingKind::Expression(expr.label()),
            Binding::Keyframes { .. } => BindingKind::Keyframes,
        })
    }

    /// Number of bindings attached to a visual
    pub fn binding_count(&self, visual: VisualId) -> usize {
        self.visuals
            .get(visual)
            .map_or(0, |state| state.bindings.len())
    }

    /// Batches that have not completed yet
    pub fn pending_batches(&self) -> usize {
        self.batches.len()
    }

    /// Total time ticked so far, in milliseconds
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    /// Check if any key frames are still running
    pub fn has_active_animations(&self) -> bool {
        self.visuals.values().any(|state| {
            state
                .bindings
                .values()
                .any(|b| matches!(b, Binding::Keyframes { .. }))
        })
    }

    /// Advance all key frames by `dt_ms` and settle the ones that finished
    pub fn tick(&mut self, dt_ms: f32) {
        self.elapsed_ms += dt_ms as f64;

        let mut finished = Vec::new();
        for (visual, state) in self.visuals.iter_mut() {
            for (property, binding) in state.bindings.iter_mut() {
                if let Binding::Keyframes { playback, .. } = binding {
                    playback.tick(dt_ms);
                    if playback.is_finished() {
                        finished.push((visual, *property));
                    }
                }
            }
        }

        for (visual, property) in finished {
            let Some(state) = self.visuals.get_mut(visual) else {
                continue;
            };
            let Some(binding) = state.bindings.remove(&property) else {
                continue;
            };
            if let Binding::Keyframes { playback, .. } = &binding {
                state.values.insert(property, playback.value());
            }
            self.release(binding);
        }
    }

    fn current_value(&self, state: &VisualState, property: AnimatedProperty) -> f32 {
        match state.bindings.get(&property) {
            Some(Binding::Expression(expr)) => expr.evaluate(&self.manipulation),
            Some(Binding::Keyframes { playback, .. }) => playback.value(),
            None => state.static_value(property),
        }
    }

    /// Replace the binding on a property, freezing the outgoing value first
    fn bind(&mut self, visual: VisualId, property: AnimatedProperty, binding: Binding) -> Result<()> {
        let state = self
            .visuals
            .get(visual)
            .ok_or(CompositorError::UnknownVisual(visual))?;
        let frozen = self.current_value(state, property);

        let state = self
            .visuals
            .get_mut(visual)
            .ok_or(CompositorError::UnknownVisual(visual))?;
        state.values.insert(property, frozen);
        let previous = state.bindings.insert(property, binding);
        if let Some(previous) = previous {
            self.release(previous);
        }
        Ok(())
    }

    /// Account for a binding that stopped driving its property
    fn release(&mut self, binding: Binding) {
        let Binding::Keyframes {
            batch: Some(batch), ..
        } = binding
        else {
            return;
        };
        let Some(state) = self.batches.get_mut(batch) else {
            return;
        };
        state.pending = state.pending.saturating_sub(1);
        if state.pending == 0 && !state.open {
            self.complete_batch(batch);
        }
    }

    fn complete_batch(&mut self, batch: BatchId) {
        if let Some(mut state) = self.batches.remove(batch) {
            tracing::trace!(?batch, "batch completed");
            if let Some(sender) = state.completion.take() {
                let _ = sender.send(());
            }
        }
    }
}

impl Default for AnimationScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compositor for AnimationScheduler {
    fn insert_manipulation_scalar(&mut self, name: &str, value: f32) {
        self.manipulation.insert_scalar(name, value);
    }

    fn start_expression(
        &mut self,
        visual: VisualId,
        property: AnimatedProperty,
        expression: &ExpressionAnimation,
    ) -> Result<()> {
        self.bind(visual, property, Binding::Expression(expression.clone()))
    }

    fn start_keyframes(
        &mut self,
        visual: VisualId,
        property: AnimatedProperty,
        animation: &ScalarKeyframeAnimation,
    ) -> Result<()> {
        let state = self
            .visuals
            .get(visual)
            .ok_or(CompositorError::UnknownVisual(visual))?;
        let starting_value = self.current_value(state, property);

        // Infinite animations never settle, so they never hold a batch open
        let batch = self.open_batch.filter(|_| animation.is_finite());
        if let Some(batch) = batch {
            if let Some(state) = self.batches.get_mut(batch) {
                state.pending += 1;
            }
        }

        self.bind(
            visual,
            property,
            Binding::Keyframes {
                playback: animation.play(starting_value),
                batch,
            },
        )
    }

    fn stop_animation(&mut self, visual: VisualId, property: AnimatedProperty) -> Result<()> {
        let state = self
            .visuals
            .get(visual)
            .ok_or(CompositorError::UnknownVisual(visual))?;
        let frozen = self.current_value(state, property);

        let state = self
            .visuals
            .get_mut(visual)
            .ok_or(CompositorError::UnknownVisual(visual))?;
        state.values.insert(property, frozen);
        let previous = state.bindings.remove(&property);
        if let Some(previous) = previous {
            self.release(previous);
        }
        Ok(())
    }

    fn property_value(&self, visual: VisualId, property: AnimatedProperty) -> Result<f32> {
        let state = self
            .visuals
            .get(visual)
            .ok_or(CompositorError::UnknownVisual(visual))?;
        Ok(self.current_value(state, property))
    }

    fn begin_batch(&mut self) -> BatchId {
        let batch = self.batches.insert(BatchState {
            open: true,
            pending: 0,
            completion: None,
        });
        self.open_batch = Some(batch);
        batch
    }

    fn end_batch(&mut self, batch: BatchId) -> Result<BatchCompletion> {
        let state = self
            .batches
            .get_mut(batch)
            .ok_or(CompositorError::UnknownBatch(batch))?;
        if !state.open {
            return Err(CompositorError::BatchClosed(batch));
        }

        let (sender, completion) = BatchCompletion::channel();
        state.open = false;
        state.completion = Some(sender);
        let empty = state.pending == 0;

        if self.open_batch == Some(batch) {
            self.open_batch = None;
        }
        if empty {
            self.complete_batch(batch);
        }
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::easing::Easing;
    use crate::expression::manipulation;

    fn collapse() -> ScalarKeyframeAnimation {
        ScalarKeyframeAnimation::new(100).keyframe(1.0, 0.0, Easing::Linear)
    }

    fn follow_translation() -> ExpressionAnimation {
        ExpressionAnimation::new("follow", |p| p.scalar(manipulation::TRANSLATION_Y))
    }

    #[test]
    fn test_expression_is_evaluated_on_read() {
        let mut scheduler = AnimationScheduler::new();
        let visual = scheduler.create_visual();

        scheduler
            .start_expression(visual, AnimatedProperty::OffsetY, &follow_translation())
            .unwrap();
        scheduler.set_translation_y(12.0);
        assert_eq!(
            scheduler.property_value(visual, AnimatedProperty::OffsetY).unwrap(),
            12.0
        );

        scheduler.set_translation_y(30.0);
        assert_eq!(
            scheduler.property_value(visual, AnimatedProperty::OffsetY).unwrap(),
            30.0
        );
    }

    #[test]
    fn test_stop_freezes_last_value() {
        let mut scheduler = AnimationScheduler::new();
        let visual = scheduler.create_visual();
        scheduler
            .start_expression(visual, AnimatedProperty::OffsetY, &follow_translation())
            .unwrap();
        scheduler.set_translation_y(20.0);

        scheduler.stop_animation(visual, AnimatedProperty::OffsetY).unwrap();
        scheduler.set_translation_y(0.0);

        assert_eq!(
            scheduler.property_value(visual, AnimatedProperty::OffsetY).unwrap(),
            20.0
        );
        assert_eq!(scheduler.binding(visual, AnimatedProperty::OffsetY), None);
    }

    #[test]
    fn test_rebinding_replaces_instead_of_stacking() {
        let mut scheduler = AnimationScheduler::new();
        let visual = scheduler.create_visual();
        let expr = follow_translation();

        for _ in 0..5 {
            scheduler
                .start_expression(visual, AnimatedProperty::OffsetY, &expr)
                .unwrap();
        }

        assert_eq!(scheduler.binding_count(visual), 1);
        assert_eq!(
            scheduler.binding(visual, AnimatedProperty::OffsetY),
            Some(BindingKind::Expression("follow"))
        );
    }

    #[test]
    fn test_keyframes_start_from_current_value() {
        let mut scheduler = AnimationScheduler::new();
        let visual = scheduler.create_visual();
        scheduler
            .set_property(visual, AnimatedProperty::OffsetY, 36.0)
            .unwrap();

        scheduler
            .start_keyframes(visual, AnimatedProperty::OffsetY, &collapse())
            .unwrap();
        scheduler.tick(50.0);
        assert!(
            (scheduler.property_value(visual, AnimatedProperty::OffsetY).unwrap() - 18.0).abs()
                < 0.01
        );

        scheduler.tick(50.0);
        assert_eq!(
            scheduler.property_value(visual, AnimatedProperty::OffsetY).unwrap(),
            0.0
        );
        assert!(!scheduler.has_active_animations());
    }

    #[tokio::test]
    async fn test_batch_completes_after_keyframes_finish() {
        let mut scheduler = AnimationScheduler::new();
        let visual = scheduler.create_visual();

        let batch = scheduler.begin_batch();
        scheduler
            .start_keyframes(visual, AnimatedProperty::Opacity, &collapse())
            .unwrap();
        scheduler
            .start_keyframes(visual, AnimatedProperty::OffsetY, &collapse())
            .unwrap();
        let mut completion = scheduler.end_batch(batch).unwrap();

        scheduler.tick(60.0);
        assert!(!completion.try_complete());
        scheduler.tick(60.0);
        assert!(completion.try_complete());
        assert_eq!(scheduler.pending_batches(), 0);

        // Awaiting an already observed completion resolves immediately
        completion.await;
    }

    #[test]
    fn test_empty_batch_completes_immediately() {
        let mut scheduler = AnimationScheduler::new();
        let batch = scheduler.begin_batch();
        let mut completion = scheduler.end_batch(batch).unwrap();
        assert!(completion.try_complete());
        assert_eq!(
            scheduler.end_batch(batch).unwrap_err(),
            CompositorError::UnknownBatch(batch)
        );
    }

    #[test]
    fn test_stopping_batched_keyframes_completes_batch() {
        let mut scheduler = AnimationScheduler::new();
        let visual = scheduler.create_visual();

        let batch = scheduler.begin_batch();
        scheduler
            .start_keyframes(visual, AnimatedProperty::Opacity, &collapse())
            .unwrap();
        let mut completion = scheduler.end_batch(batch).unwrap();

        scheduler.stop_animation(visual, AnimatedProperty::Opacity).unwrap();
        assert!(completion.try_complete());
    }

    #[test]
    fn test_infinite_keyframes_do_not_join_batch() {
        let mut scheduler = AnimationScheduler::new();
        let visual = scheduler.create_visual();
        let spin = ScalarKeyframeAnimation::new(100)
            .keyframe_from_start(1.0, 360.0, Easing::Linear)
            .forever();

        let batch = scheduler.begin_batch();
        scheduler
            .start_keyframes(visual, AnimatedProperty::RotationDegrees, &spin)
            .unwrap();
        let mut completion = scheduler.end_batch(batch).unwrap();

        assert!(completion.try_complete());
        scheduler.tick(1_000.0);
        assert!(scheduler.has_active_animations());
    }

    #[test]
    fn test_unknown_visual_is_rejected() {
        let mut scheduler = AnimationScheduler::new();
        let visual = scheduler.create_visual();
        assert!(scheduler.remove_visual(visual));

        assert_eq!(
            scheduler.stop_animation(visual, AnimatedProperty::Opacity),
            Err(CompositorError::UnknownVisual(visual))
        );
    }
}
