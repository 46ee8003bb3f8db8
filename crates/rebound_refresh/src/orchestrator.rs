//! Refresh orchestration
//!
//! Sequences the loading spin, the refresh operation and the reset animation
//! around a committed gesture.
//!
//! At most one refresh is pending. The current one sits in a single-slot
//! register; a newer refresh swaps itself in, cancels the previous occupant
//! and waits for it to settle before invoking its own operation. Every commit
//! takes a generation number, and a refresh whose generation is no longer the
//! latest finishes as [`RefreshOutcome::Superseded`] without touching the
//! visuals.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rebound_animation::Compositor;
use rebound_core::fsm::StateMachine;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::cancel::CancellationHandle;
use crate::config::RefreshConfiguration;
use crate::error::{RefreshError, Result};
use crate::operation::RefreshOperation;
use crate::visuals::RefreshVisuals;

/// Phase of the refresh indicator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPhase {
    /// Pull expressions armed, nothing pending
    Idle,
    /// Spinner running, operation pending
    Loading,
    /// A newer commit is waiting for the previous refresh to settle
    Cancelling,
    /// Fade-out and collapse running
    Resetting,
}

impl RefreshPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            RefreshPhase::Idle => "idle",
            RefreshPhase::Loading => "loading",
            RefreshPhase::Cancelling => "cancelling",
            RefreshPhase::Resetting => "resetting",
        }
    }
}

/// Events driving [`RefreshPhase`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseEvent {
    Commit,
    Supersede,
    PriorSettled,
    Reset,
    ResetCompleted,
}

/// How a refresh task ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The operation finished and the indicator was reset
    Completed,
    /// The operation was cancelled while current; the indicator was reset
    Cancelled,
    /// A newer refresh took over; nothing was reset on this one's behalf
    Superseded,
}

struct Ticket {
    generation: u64,
    cancellation: CancellationHandle,
    settled: oneshot::Receiver<()>,
}

#[derive(Default)]
struct Register {
    latest: u64,
    current: Option<Ticket>,
}

struct Shared<C> {
    visuals: RefreshVisuals<C>,
    settle_delay: Duration,
    operation: Mutex<Option<RefreshOperation>>,
    register: Mutex<Register>,
    phases: Mutex<StateMachine<RefreshPhase, PhaseEvent>>,
    phase_tx: Arc<watch::Sender<RefreshPhase>>,
}

/// Drives the loading, refresh and reset sequence
pub struct RefreshOrchestrator<C> {
    shared: Arc<Shared<C>>,
}

impl<C> Clone for RefreshOrchestrator<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

fn phase_machine(phase_tx: &Arc<watch::Sender<RefreshPhase>>) -> StateMachine<RefreshPhase, PhaseEvent> {
    use PhaseEvent::*;
    use RefreshPhase::*;

    let mut builder = StateMachine::builder(Idle)
        .on_any(&[Idle, Resetting], Commit, Loading)
        .on_any(&[Loading, Cancelling], Supersede, Cancelling)
        .on(Cancelling, PriorSettled, Loading)
        .on_any(&[Idle, Loading, Resetting], Reset, Resetting)
        .on(Resetting, ResetCompleted, Idle);

    for phase in [Idle, Loading, Cancelling, Resetting] {
        let tx = Arc::clone(phase_tx);
        builder = builder.on_enter(phase, move || {
            tx.send_replace(phase);
        });
    }
    builder.build()
}

impl<C: Compositor> RefreshOrchestrator<C> {
    pub fn new(visuals: RefreshVisuals<C>, config: &RefreshConfiguration) -> Self {
        let (phase_tx, _) = watch::channel(RefreshPhase::Idle);
        let phase_tx = Arc::new(phase_tx);
        Self {
            shared: Arc::new(Shared {
                visuals,
                settle_delay: config.settle_delay(),
                operation: Mutex::new(None),
                register: Mutex::new(Register::default()),
                phases: Mutex::new(phase_machine(&phase_tx)),
                phase_tx,
            }),
        }
    }

    pub fn visuals(&self) -> &RefreshVisuals<C> {
        &self.shared.visuals
    }

    pub fn set_operation(&self, operation: Option<RefreshOperation>) {
        *self.shared.operation.lock() = operation;
    }

    pub fn phase(&self) -> RefreshPhase {
        self.shared.phases.lock().current_state()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<RefreshPhase> {
        self.shared.phase_tx.subscribe()
    }

    /// Phases entered so far, oldest first (bounded)
    pub fn phase_history(&self) -> Vec<RefreshPhase> {
        self.shared
            .phases
            .lock()
            .history()
            .iter()
            .map(|&(_, _, to)| to)
            .collect()
    }

    /// Whether a refresh currently holds the register
    pub fn is_pending(&self) -> bool {
        self.shared.register.lock().current.is_some()
    }

    /// Cancel the pending refresh, if any. It still resets once it unwinds.
    pub fn cancel_pending(&self) -> bool {
        let register = self.shared.register.lock();
        match &register.current {
            Some(ticket) => {
                tracing::debug!(generation = ticket.generation, "pending refresh cancelled by host");
                ticket.cancellation.cancel()
            }
            None => false,
        }
    }

    /// Commit a refresh and run it on the current tokio runtime
    pub fn spawn_refresh(&self) -> Result<JoinHandle<Result<RefreshOutcome>>> {
        let runtime = Handle::try_current().map_err(|_| RefreshError::RuntimeUnavailable)?;
        let generation = self.commit();
        let this = self.clone();
        Ok(runtime.spawn(async move { this.refresh(generation).await }))
    }

    /// Run the reset for a cancelled gesture on the current tokio runtime
    pub fn spawn_cancel_reset(&self) -> Result<JoinHandle<Result<()>>> {
        let runtime = Handle::try_current().map_err(|_| RefreshError::RuntimeUnavailable)?;
        let this = self.clone();
        Ok(runtime.spawn(async move { this.reset_after_cancel().await }))
    }

    fn send(&self, event: PhaseEvent) -> RefreshPhase {
        self.shared.phases.lock().send(event)
    }

    fn is_latest(&self, generation: u64) -> bool {
        self.shared.register.lock().latest == generation
    }

    /// Take a generation number and enter Loading, or Cancelling if another
    /// refresh is still in flight
    fn commit(&self) -> u64 {
        let generation = {
            let mut register = self.shared.register.lock();
            register.latest += 1;
            register.latest
        };
        // Decide and transition under one lock so a concurrent reset can't
        // slip in between
        let taken = self
            .shared
            .phases
            .lock()
            .send_first(&[PhaseEvent::Supersede, PhaseEvent::Commit]);
        tracing::debug!(generation, ?taken, "refresh committed");
        generation
    }

    async fn refresh(self, generation: u64) -> Result<RefreshOutcome> {
        // Let the rotation expression settle before the spin takes over
        tokio::time::sleep(self.shared.settle_delay).await;
        if !self.is_latest(generation) {
            tracing::debug!(generation, "refresh superseded before loading");
            return Ok(RefreshOutcome::Superseded);
        }
        self.shared.visuals.start_loading_spin()?;

        let token = CancellationHandle::new();
        let (settled_tx, settled_rx) = oneshot::channel::<()>();
        let previous = self.shared.register.lock().current.replace(Ticket {
            generation,
            cancellation: token.clone(),
            settled: settled_rx,
        });

        if let Some(previous) = previous {
            tracing::debug!(
                previous = previous.generation,
                generation,
                "cancelling previous refresh"
            );
            previous.cancellation.cancel();
            // A dropped sender means the previous refresh has settled too
            let _ = previous.settled.await;
        }
        if self.is_latest(generation) && self.phase() == RefreshPhase::Cancelling {
            self.send(PhaseEvent::PriorSettled);
        }

        let operation = self.shared.operation.lock().clone();
        let result = match operation {
            _ if token.is_cancelled() => Err(RefreshError::Cancelled),
            Some(operation) => operation.invoke(token.clone()).await,
            None => Ok(()),
        };
        drop(settled_tx);

        let released = {
            let mut register = self.shared.register.lock();
            let current = register.latest == generation
                && register
                    .current
                    .as_ref()
                    .is_some_and(|ticket| ticket.generation == generation);
            if current {
                register.current = None;
            }
            current
        };

        match result {
            Ok(()) | Err(RefreshError::Cancelled) => {}
            Err(RefreshError::DeferralAbandoned) => {
                tracing::warn!(
                    generation,
                    "refresh deferral dropped without completing; indicator stays loading"
                );
                return Err(RefreshError::DeferralAbandoned);
            }
            Err(err) => return Err(err),
        }
        if !released {
            tracing::warn!(generation, "ignoring completion of superseded refresh");
            return Ok(RefreshOutcome::Superseded);
        }

        let cancelled = token.is_cancelled();
        self.reset().await?;
        Ok(if cancelled {
            RefreshOutcome::Cancelled
        } else {
            RefreshOutcome::Completed
        })
    }

    /// Stop the spin and pull bindings, fade and collapse, then re-arm.
    ///
    /// Bindings are re-armed only after the batch completes. If a new refresh
    /// entered Loading meanwhile, its spin keeps the rotation.
    pub async fn reset(&self) -> Result<()> {
        self.send(PhaseEvent::Reset);
        let visuals = &self.shared.visuals;
        visuals.stop_expressions(true)?;
        let completion = visuals.begin_reset()?;
        completion.await;

        let rearm_rotation = self.phase() == RefreshPhase::Resetting;
        visuals.start_expressions(rearm_rotation)?;
        if rearm_rotation {
            self.send(PhaseEvent::ResetCompleted);
            tracing::debug!("reset complete; pull bindings re-armed");
        } else {
            tracing::debug!("refresh committed during reset; keeping its spin");
        }
        Ok(())
    }

    /// Reset after a cancelled gesture. A pending refresh keeps its spin and phase.
    pub async fn reset_after_cancel(&self) -> Result<()> {
        if !matches!(
            self.phase(),
            RefreshPhase::Loading | RefreshPhase::Cancelling
        ) {
            return self.reset().await;
        }

        tracing::debug!("gesture cancelled while a refresh is pending");
        let visuals = &self.shared.visuals;
        visuals.stop_expressions(false)?;
        let completion = visuals.begin_reset()?;
        completion.await;
        visuals.start_expressions(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::RefreshCommand;
    use rebound_animation::{AnimatedProperty, AnimationScheduler, BindingKind, SharedCompositor};

    fn setup() -> (
        SharedCompositor<AnimationScheduler>,
        RefreshOrchestrator<AnimationScheduler>,
    ) {
        let mut scheduler = AnimationScheduler::new();
        let icon = scheduler.create_visual();
        let border = scheduler.create_visual();
        let compositor = Arc::new(Mutex::new(scheduler));
        let config = RefreshConfiguration::default();
        let visuals = RefreshVisuals::new(compositor.clone(), icon, border, &config);
        visuals.start_expressions(true).unwrap();
        (compositor, RefreshOrchestrator::new(visuals, &config))
    }

    fn drive(compositor: &SharedCompositor<AnimationScheduler>) -> JoinHandle<()> {
        let compositor = compositor.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(16)).await;
                compositor.lock().tick(16.0);
            }
        })
    }

    #[test]
    fn test_phase_table() {
        let tx = Arc::new(watch::channel(RefreshPhase::Idle).0);
        let mut fsm = phase_machine(&tx);

        assert_eq!(fsm.send(PhaseEvent::Commit), RefreshPhase::Loading);
        assert_eq!(fsm.send(PhaseEvent::Supersede), RefreshPhase::Cancelling);
        assert_eq!(fsm.send(PhaseEvent::Reset), RefreshPhase::Cancelling);
        assert_eq!(fsm.send(PhaseEvent::PriorSettled), RefreshPhase::Loading);
        assert_eq!(fsm.send(PhaseEvent::Reset), RefreshPhase::Resetting);
        assert_eq!(fsm.send(PhaseEvent::Commit), RefreshPhase::Loading);
        assert_eq!(fsm.send(PhaseEvent::ResetCompleted), RefreshPhase::Loading);
        assert_eq!(*tx.borrow(), RefreshPhase::Loading);
    }

    #[test]
    fn test_commit_follows_phase_under_lock() {
        let (_compositor, orchestrator) = setup();

        assert_eq!(orchestrator.commit(), 1);
        assert_eq!(orchestrator.phase(), RefreshPhase::Loading);
        assert_eq!(orchestrator.commit(), 2);
        assert_eq!(orchestrator.phase(), RefreshPhase::Cancelling);

        // A previous refresh starts its reset just before the next commit
        orchestrator.send(PhaseEvent::PriorSettled);
        orchestrator.send(PhaseEvent::Reset);
        assert_eq!(orchestrator.commit(), 3);
        assert_eq!(orchestrator.phase(), RefreshPhase::Loading);
        assert_eq!(
            orchestrator.shared.phases.lock().history().last().copied(),
            Some((RefreshPhase::Resetting, PhaseEvent::Commit, RefreshPhase::Loading))
        );

        // Its completion no longer reaches Idle under the new refresh
        orchestrator.send(PhaseEvent::ResetCompleted);
        assert_eq!(orchestrator.phase(), RefreshPhase::Loading);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_commits_racing_resets_never_strand_phase() {
        let (_compositor, orchestrator) = setup();

        for _ in 0..200 {
            orchestrator.send(PhaseEvent::Commit);
            let resetting = orchestrator.clone();
            let reset = tokio::spawn(async move {
                resetting.send(PhaseEvent::Reset);
            });
            orchestrator.commit();
            reset.await.unwrap();

            // Whichever landed first, the latest commit is always loading or
            // waiting on its predecessor
            let phase = orchestrator.phase();
            assert!(
                matches!(phase, RefreshPhase::Loading | RefreshPhase::Cancelling),
                "commit stranded in {phase:?}"
            );
            orchestrator.send(PhaseEvent::PriorSettled);
            orchestrator.send(PhaseEvent::Reset);
            orchestrator.send(PhaseEvent::ResetCompleted);
            assert_eq!(orchestrator.phase(), RefreshPhase::Idle);
        }
    }

    #[test]
    fn test_spawn_without_runtime() {
        let (_compositor, orchestrator) = setup();
        assert!(matches!(
            orchestrator.spawn_refresh(),
            Err(RefreshError::RuntimeUnavailable)
        ));
        assert_eq!(orchestrator.phase(), RefreshPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_without_operation_completes() {
        let (compositor, orchestrator) = setup();
        let ticker = drive(&compositor);

        let outcome = orchestrator.spawn_refresh().unwrap().await.unwrap().unwrap();
        assert_eq!(outcome, RefreshOutcome::Completed);
        assert_eq!(orchestrator.phase(), RefreshPhase::Idle);
        assert_eq!(
            orchestrator.phase_history(),
            vec![RefreshPhase::Loading, RefreshPhase::Resetting, RefreshPhase::Idle]
        );
        assert!(!orchestrator.is_pending());
        ticker.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_spin_runs_while_loading() {
        let (compositor, orchestrator) = setup();
        let ticker = drive(&compositor);
        orchestrator.set_operation(Some(RefreshOperation::from(RefreshCommand::new(
            |token: CancellationHandle| async move {
                token
                    .run_until_cancelled(tokio::time::sleep(Duration::from_secs(2)))
                    .await
            },
        ))));

        let refresh = orchestrator.spawn_refresh().unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        let icon = orchestrator.visuals().icon();
        assert_eq!(orchestrator.phase(), RefreshPhase::Loading);
        assert_eq!(
            compositor.lock().binding(icon, AnimatedProperty::RotationDegrees),
            Some(BindingKind::Keyframes)
        );

        assert!(orchestrator.cancel_pending());
        assert_eq!(refresh.await.unwrap().unwrap(), RefreshOutcome::Cancelled);
        assert_eq!(orchestrator.phase(), RefreshPhase::Idle);
        assert_eq!(
            compositor.lock().binding(icon, AnimatedProperty::RotationDegrees),
            Some(BindingKind::Expression(crate::pull::labels::ROTATION))
        );
        ticker.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_error_propagates_without_reset() {
        let (compositor, orchestrator) = setup();
        let ticker = drive(&compositor);
        orchestrator.set_operation(Some(RefreshOperation::from(RefreshCommand::new(
            |_token| async { Err(RefreshError::operation("backend unreachable")) },
        ))));

        let err = orchestrator.spawn_refresh().unwrap().await.unwrap().unwrap_err();
        assert!(matches!(err, RefreshError::Operation(_)));
        assert_eq!(orchestrator.phase(), RefreshPhase::Loading);
        assert!(!orchestrator.is_pending());

        orchestrator.reset().await.unwrap();
        assert_eq!(orchestrator.phase(), RefreshPhase::Idle);
        ticker.abort();
    }
}
