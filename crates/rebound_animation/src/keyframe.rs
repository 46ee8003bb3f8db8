//! Scalar key-frame animations
//!
//! A [`ScalarKeyframeAnimation`] is a description: key frames at normalized
//! progress, a duration and an iteration count. Starting it on a property
//! produces a [`KeyframePlayback`] that remembers the property's value at the
//! moment it started, so key frames can be expressed relative to it.

use crate::easing::Easing;

/// Value of a key frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum KeyframeValue {
    /// An absolute value
    Fixed(f32),
    /// The property's starting value plus an offset
    FromStart(f32),
}

impl KeyframeValue {
    fn resolve(self, starting_value: f32) -> f32 {
        match self {
            KeyframeValue::Fixed(value) => value,
            KeyframeValue::FromStart(delta) => starting_value + delta,
        }
    }
}

/// A single key frame
#[derive(Clone, Copy, Debug)]
pub struct Keyframe {
    /// Normalized position within one iteration (0.0 to 1.0)
    pub progress: f32,
    pub value: KeyframeValue,
    /// Easing used when transitioning TO this key frame
    pub easing: Easing,
}

/// How many times an animation plays
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IterationBehavior {
    #[default]
    Once,
    Count(u32),
    Forever,
}

/// A key-frame animation over a single scalar property
#[derive(Clone, Debug)]
pub struct ScalarKeyframeAnimation {
    keyframes: Vec<Keyframe>,
    duration_ms: u32,
    iterations: IterationBehavior,
}

impl ScalarKeyframeAnimation {
    pub fn new(duration_ms: u32) -> Self {
        Self {
            keyframes: Vec::new(),
            duration_ms: duration_ms.max(1),
            iterations: IterationBehavior::Once,
        }
    }

    /// Insert a key frame with an absolute value
    pub fn keyframe(self, progress: f32, value: f32, easing: Easing) -> Self {
        self.insert(progress, KeyframeValue::Fixed(value), easing)
    }

    /// Insert a key frame relative to the property's starting value
    pub fn keyframe_from_start(self, progress: f32, delta: f32, easing: Easing) -> Self {
        self.insert(progress, KeyframeValue::FromStart(delta), easing)
    }

    pub fn iterations(mut self, iterations: IterationBehavior) -> Self {
        self.iterations = iterations;
        self
    }

    /// Repeat until stopped
    pub fn forever(self) -> Self {
        self.iterations(IterationBehavior::Forever)
    }

    pub fn duration_ms(&self) -> u32 {
        self.duration_ms
    }

    pub fn iteration_behavior(&self) -> IterationBehavior {
        self.iterations
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// Whether playback ever finishes on its own
    pub fn is_finite(&self) -> bool {
        self.iterations != IterationBehavior::Forever
    }

    fn insert(mut self, progress: f32, value: KeyframeValue, easing: Easing) -> Self {
        let progress = progress.clamp(0.0, 1.0);
        // A later insert at the same progress replaces the earlier one
        self.keyframes
            .retain(|kf| (kf.progress - progress).abs() > f32::EPSILON);
        let at = self.keyframes.partition_point(|kf| kf.progress < progress);
        self.keyframes.insert(
            at,
            Keyframe {
                progress,
                value,
                easing,
            },
        );
        self
    }

    /// Sample one iteration at `progress`. Segments before the first key frame
    /// start from `starting_value`.
    pub fn sample(&self, progress: f32, starting_value: f32) -> f32 {
        let progress = progress.clamp(0.0, 1.0);

        let Some(first) = self.keyframes.first() else {
            return starting_value;
        };

        let mut prev_progress = 0.0;
        let mut prev_value = starting_value;
        if first.progress <= 0.0 {
            prev_value = first.value.resolve(starting_value);
        }

        for kf in &self.keyframes {
            let value = kf.value.resolve(starting_value);
            if kf.progress >= progress {
                let span = kf.progress - prev_progress;
                if span <= f32::EPSILON {
                    return value;
                }
                let local = (progress - prev_progress) / span;
                return prev_value + (value - prev_value) * kf.easing.apply(local);
            }
            prev_progress = kf.progress;
            prev_value = value;
        }

        prev_value
    }

    /// Begin playing from `starting_value`
    pub fn play(&self, starting_value: f32) -> KeyframePlayback {
        KeyframePlayback {
            animation: self.clone(),
            starting_value,
            elapsed_ms: 0.0,
            iteration: 0,
            finished: false,
        }
    }
}

/// A running key-frame animation bound to one property
#[derive(Clone, Debug)]
pub struct KeyframePlayback {
    animation: ScalarKeyframeAnimation,
    starting_value: f32,
    elapsed_ms: f32,
    iteration: u32,
    finished: bool,
}

impl KeyframePlayback {
    pub fn starting_value(&self) -> f32 {
        self.starting_value
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Completed iterations
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Progress within the current iteration (0.0 to 1.0)
    pub fn progress(&self) -> f32 {
        if self.finished {
            return 1.0;
        }
        self.elapsed_ms / self.animation.duration_ms as f32
    }

    /// Current interpolated value
    pub fn value(&self) -> f32 {
        self.animation.sample(self.progress(), self.starting_value)
    }

    /// Advance by `dt_ms` milliseconds
    pub fn tick(&mut self, dt_ms: f32) {
        if self.finished {
            return;
        }

        let duration = self.animation.duration_ms as f32;
        self.elapsed_ms += dt_ms.max(0.0);

        while self.elapsed_ms >= duration {
            self.elapsed_ms -= duration;
            self.iteration += 1;

            let done = match self.animation.iterations {
                IterationBehavior::Once => true,
                IterationBehavior::Count(n) => self.iteration >= n.max(1),
                IterationBehavior::Forever => false,
            };
            if done {
                self.elapsed_ms = duration;
                self.finished = true;
                return;
            }
        }
    }
}
