//! Scenario replay against the reference compositor
//!
//! The replay drives frames itself: each frame writes the surface translation,
//! samples the controller, then sleeps one tick and advances the compositor.
//! Run it on a runtime with a paused clock to get the same report every time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use rebound_animation::{AnimationScheduler, SharedCompositor};
use rebound_refresh::{
    CancellationHandle, GestureResolution, PullDirection, PullToRefresh, RefreshCommand,
    RefreshConfiguration, RefreshOutcome,
};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use crate::report::{ReportStatus, ResolutionRecord, ScenarioReport};
use crate::scenario::{Scenario, ScenarioStep};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config: RefreshConfiguration,
    /// How long the simulated refresh takes
    pub refresh_ms: u64,
    pub tick_ms: u64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            config: RefreshConfiguration::default(),
            refresh_ms: 2000,
            tick_ms: 16,
        }
    }
}

impl RunOptions {
    pub fn validate(&self) -> Result<()> {
        if self.tick_ms == 0 {
            bail!("tick_ms must be > 0");
        }
        self.config.validate()?;
        Ok(())
    }
}

enum Task {
    Refresh(JoinHandle<rebound_refresh::Result<RefreshOutcome>>),
    Reset(JoinHandle<rebound_refresh::Result<()>>),
}

struct Replay {
    compositor: SharedCompositor<AnimationScheduler>,
    controller: PullToRefresh<AnimationScheduler>,
    direction: PullDirection,
    tick: Duration,
    height: f32,
    pull: f32,
    refreshes: Arc<AtomicUsize>,
    items: Arc<Mutex<Vec<String>>>,
    tasks: Vec<(usize, Task)>,
    resolutions: Vec<ResolutionRecord>,
    started_at: Instant,
}

/// Replay `scenario` and report how every gesture resolved.
pub async fn run(scenario: &Scenario, options: &RunOptions) -> Result<ScenarioReport> {
    options.validate()?;
    let mut replay = Replay::new(scenario, options)?;
    tracing::info!(
        scenario = scenario.name.as_deref().unwrap_or("unnamed"),
        steps = scenario.steps.len(),
        direction = ?options.config.direction,
        "replaying scenario"
    );

    for (index, step) in scenario.steps.iter().enumerate() {
        tracing::debug!(index, step = step.name(), "step");
        if let Some(message) = replay.step(index, step).await? {
            tracing::warn!(index, %message, "expectation failed");
            return Ok(replay
                .finish(ReportStatus::Failed, Some((index, step.name(), message)))
                .await);
        }
    }

    Ok(replay.finish(ReportStatus::Passed, None).await)
}

impl Replay {
    fn new(scenario: &Scenario, options: &RunOptions) -> Result<Self> {
        let mut scheduler = AnimationScheduler::new();
        let icon = scheduler.create_visual();
        let border = scheduler.create_visual();
        let compositor = Arc::new(Mutex::new(scheduler));

        let controller = PullToRefresh::new(
            compositor.clone(),
            icon,
            border,
            options.config.clone(),
            scenario.scrollable_height,
        )
        .context("failed to create pull-to-refresh controller")?;

        let refreshes = Arc::new(AtomicUsize::new(0));
        let items = Arc::new(Mutex::new(Vec::new()));
        controller.set_command(simulated_refresh(
            Arc::clone(&refreshes),
            Arc::clone(&items),
            Duration::from_millis(options.refresh_ms),
        ));

        let replay = Self {
            compositor,
            controller,
            direction: options.config.direction,
            tick: Duration::from_millis(options.tick_ms),
            height: scenario.scrollable_height,
            pull: 0.0,
            refreshes,
            items,
            tasks: Vec::new(),
            resolutions: Vec::new(),
            started_at: Instant::now(),
        };
        replay
            .compositor
            .lock()
            .set_translation_y(replay.translation());
        Ok(replay)
    }

    /// Surface translation for the current pull distance
    fn translation(&self) -> f32 {
        match self.direction {
            PullDirection::TopDown => self.pull,
            PullDirection::BottomUp => -(self.height + self.pull),
        }
    }

    fn frames(&self, ms: u64) -> u64 {
        ms.div_ceil(self.tick.as_millis() as u64)
    }

    fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    async fn frame(&mut self) -> Result<()> {
        let translation = self.translation();
        self.compositor.lock().set_translation_y(translation);
        self.controller
            .on_rendering()
            .context("failed to sample frame")?;
        sleep(self.tick).await;
        self.compositor.lock().tick(self.tick.as_millis() as f32);
        Ok(())
    }

    /// Run one step. Returns a message when an expectation does not hold.
    async fn step(&mut self, index: usize, step: &ScenarioStep) -> Result<Option<String>> {
        match *step {
            ScenarioStep::Press => self.controller.on_manipulation_started(),
            ScenarioStep::Drag { to, over_ms } => {
                let from = self.pull;
                let frames = self.frames(over_ms).max(1);
                for frame in 1..=frames {
                    self.pull = from + (to - from) * frame as f32 / frames as f32;
                    self.frame().await?;
                }
            }
            ScenarioStep::Hold { ms } | ScenarioStep::Wait { ms } => {
                for _ in 0..self.frames(ms) {
                    self.frame().await?;
                }
            }
            ScenarioStep::Release => {
                self.pull = 0.0;
                let translation = self.translation();
                self.compositor.lock().set_translation_y(translation);
                let resolution = self
                    .controller
                    .on_manipulation_completed()
                    .context("failed to resolve gesture")?;
                self.resolve(index, resolution);
            }
            ScenarioStep::ResizeContent { height } => {
                self.height = height;
                self.controller.on_scrollable_height_changed(height);
            }
            ScenarioStep::ExpectPhase { phase } => {
                let actual = self.controller.phase();
                if actual != phase {
                    return Ok(Some(format!(
                        "expected phase {}, found {}",
                        phase.as_str(),
                        actual.as_str()
                    )));
                }
            }
            ScenarioStep::ExpectRefreshes { count } => {
                let actual = self.refreshes.load(Ordering::SeqCst);
                if actual != count {
                    return Ok(Some(format!(
                        "expected {count} refreshes, found {actual}"
                    )));
                }
            }
        }
        Ok(None)
    }

    fn resolve(&mut self, step_index: usize, resolution: GestureResolution) {
        let record = ResolutionRecord {
            step_index,
            at_ms: self.elapsed_ms(),
            classification: resolution.classification(),
        };
        tracing::info!(at_ms = record.at_ms, classification = ?record.classification, "gesture resolved");
        self.resolutions.push(record);

        match resolution {
            GestureResolution::Ignored => {}
            GestureResolution::Cancelled(task) => self.tasks.push((step_index, Task::Reset(task))),
            GestureResolution::Committed(task) => {
                self.tasks.push((step_index, Task::Refresh(task)))
            }
        }
    }

    /// Collect errors from finished tasks, drop the rest, and build the report
    async fn finish(
        self,
        status: ReportStatus,
        failure: Option<(usize, &str, String)>,
    ) -> ScenarioReport {
        let mut errors = Vec::new();
        for (step_index, task) in self.tasks {
            let error = match task {
                Task::Refresh(handle) if handle.is_finished() => match handle.await {
                    Ok(Ok(outcome)) => {
                        tracing::debug!(step_index, ?outcome, "refresh finished");
                        None
                    }
                    Ok(Err(err)) => Some(err.to_string()),
                    Err(err) => Some(err.to_string()),
                },
                Task::Reset(handle) if handle.is_finished() => match handle.await {
                    Ok(Ok(())) => None,
                    Ok(Err(err)) => Some(err.to_string()),
                    Err(err) => Some(err.to_string()),
                },
                Task::Refresh(handle) => {
                    handle.abort();
                    None
                }
                Task::Reset(handle) => {
                    handle.abort();
                    None
                }
            };
            if let Some(error) = error {
                errors.push(format!("step {step_index}: {error}"));
            }
        }

        let (failed_step_index, failed_step, message) = match failure {
            Some((index, step, message)) => (Some(index), Some(step.to_string()), Some(message)),
            None => (None, None, None),
        };

        ScenarioReport {
            status,
            failed_step_index,
            failed_step,
            message,
            resolutions: self.resolutions,
            refresh_count: self.refreshes.load(Ordering::SeqCst),
            items: self.items.lock().clone(),
            phase_history: self.controller.orchestrator().phase_history(),
            errors,
            elapsed_ms: self.started_at.elapsed().as_millis() as u64,
        }
    }
}

/// A cancellable refresh that prepends one item to the list
fn simulated_refresh(
    refreshes: Arc<AtomicUsize>,
    items: Arc<Mutex<Vec<String>>>,
    duration: Duration,
) -> RefreshCommand {
    RefreshCommand::new(move |token: CancellationHandle| {
        let refreshes = Arc::clone(&refreshes);
        let items = Arc::clone(&items);
        async move {
            token.run_until_cancelled(sleep(duration)).await?;
            let count = refreshes.fetch_add(1, Ordering::SeqCst) + 1;
            items.lock().insert(0, format!("item {count}"));
            tracing::info!(count, "refresh completed");
            Ok(())
        }
    })
}
