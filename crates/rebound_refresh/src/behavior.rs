//! The pull-to-refresh controller
//!
//! [`PullToRefresh`] ties the sampler, classifier and orchestrator to a
//! scrollable surface. Hosts either call the `on_*` methods from their event
//! loop or [`attach`](PullToRefresh::attach) it to an [`EventDispatcher`].

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rebound_animation::{Compositor, SharedCompositor, VisualId};
use rebound_core::events::event_types;
use rebound_core::{EventDispatcher, HandlerId, SurfaceEvent, SurfaceId};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::classifier::{Classification, GestureClassifier, SnapBackClassifier};
use crate::command::RefreshCommand;
use crate::config::RefreshConfiguration;
use crate::deferral::RefreshRequestedArgs;
use crate::error::Result;
use crate::operation::RefreshOperation;
use crate::orchestrator::{RefreshOrchestrator, RefreshOutcome, RefreshPhase};
use crate::sampler::GestureSampler;
use crate::visuals::RefreshVisuals;

/// What happened when a manipulation completed
#[derive(Debug)]
pub enum GestureResolution {
    /// The pull never reached its maximum
    Ignored,
    /// The pull was dragged back; the reset runs on the returned task
    Cancelled(JoinHandle<Result<()>>),
    /// The pull was released; the refresh runs on the returned task
    Committed(JoinHandle<Result<RefreshOutcome>>),
}

impl GestureResolution {
    pub fn classification(&self) -> Classification {
        match self {
            GestureResolution::Ignored => Classification::Ignored,
            GestureResolution::Cancelled(_) => Classification::Cancel,
            GestureResolution::Committed(_) => Classification::Commit,
        }
    }
}

/// Dispatcher registrations made by [`PullToRefresh::attach`]
#[derive(Debug)]
pub struct Attachment {
    surface: SurfaceId,
    handlers: Vec<HandlerId>,
}

impl Attachment {
    pub fn surface(&self) -> SurfaceId {
        self.surface
    }
}

/// Pull-to-refresh controller for one scrollable surface
pub struct PullToRefresh<C> {
    config: RefreshConfiguration,
    sampler: Mutex<GestureSampler>,
    classifier: Box<dyn GestureClassifier>,
    orchestrator: RefreshOrchestrator<C>,
}

impl<C: Compositor> PullToRefresh<C> {
    /// Create a controller and arm the pull bindings on `icon` and `border`
    pub fn new(
        compositor: SharedCompositor<C>,
        icon: VisualId,
        border: VisualId,
        config: RefreshConfiguration,
        scrollable_height: f32,
    ) -> Result<Self> {
        config.validate()?;

        let visuals = RefreshVisuals::new(compositor, icon, border, &config);
        visuals.update_scrollable_height(scrollable_height);
        visuals.start_expressions(true)?;

        Ok(Self {
            sampler: Mutex::new(GestureSampler::new(&config)),
            classifier: Box::new(SnapBackClassifier::from_config(&config)),
            orchestrator: RefreshOrchestrator::new(visuals, &config),
            config,
        })
    }

    /// Replace the commit/cancel heuristic
    pub fn with_classifier<G>(mut self, classifier: G) -> Self
    where
        G: GestureClassifier + 'static,
    {
        self.classifier = Box::new(classifier);
        self
    }

    pub fn config(&self) -> &RefreshConfiguration {
        &self.config
    }

    pub fn orchestrator(&self) -> &RefreshOrchestrator<C> {
        &self.orchestrator
    }

    pub fn visuals(&self) -> &RefreshVisuals<C> {
        self.orchestrator.visuals()
    }

    pub fn phase(&self) -> RefreshPhase {
        self.orchestrator.phase()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<RefreshPhase> {
        self.orchestrator.subscribe_phase()
    }

    pub fn set_operation(&self, operation: Option<RefreshOperation>) {
        self.orchestrator.set_operation(operation);
    }

    pub fn set_command(&self, command: RefreshCommand) {
        self.set_operation(Some(RefreshOperation::Command(command)));
    }

    /// Use an event-style handler as the refresh operation
    pub fn on_refresh_requested<F>(&self, handler: F)
    where
        F: Fn(&RefreshRequestedArgs) + Send + Sync + 'static,
    {
        self.set_operation(Some(RefreshOperation::event(handler)));
    }

    /// Cancel the pending refresh; it still resets once it unwinds
    pub fn cancel_pending(&self) -> bool {
        self.orchestrator.cancel_pending()
    }

    pub fn is_sampling(&self) -> bool {
        self.sampler.lock().is_active()
    }

    pub fn on_manipulation_started(&self) {
        self.sampler.lock().begin(Instant::now());
    }

    /// Sample the icon offset for this frame
    pub fn on_rendering(&self) -> Result<()> {
        if !self.is_sampling() {
            return Ok(());
        }

        let visuals = self.visuals();
        let offset = visuals.sample_icon_offset()?;
        let flags = self.sampler.lock().record(offset, Instant::now());
        if flags.at_max {
            visuals.hold_at_max()?;
        }
        Ok(())
    }

    /// Classify the finished gesture and start the matching sequence
    pub fn on_manipulation_completed(&self) -> Result<GestureResolution> {
        let Some(session) = self.sampler.lock().finish() else {
            return Ok(GestureResolution::Ignored);
        };

        let resolution = match self.classifier.classify(&session) {
            Classification::Ignored => Ok(GestureResolution::Ignored),
            Classification::Cancel => {
                tracing::debug!("refresh cancelled");
                self.orchestrator
                    .spawn_cancel_reset()
                    .map(GestureResolution::Cancelled)
            }
            Classification::Commit => {
                tracing::debug!("refresh now");
                self.orchestrator
                    .spawn_refresh()
                    .map(GestureResolution::Committed)
            }
        };

        // Full pull froze opacity and the border; without a reset to re-arm
        // them they would stay frozen for every later gesture
        let spawned = matches!(
            resolution,
            Ok(GestureResolution::Cancelled(_) | GestureResolution::Committed(_))
        );
        if session.pulled_down_at.is_some() && !spawned {
            self.release_hold()?;
        }
        resolution
    }

    /// Re-arm the bindings `hold_at_max` stopped. A pending refresh or reset
    /// re-arms them itself when it finishes.
    fn release_hold(&self) -> Result<()> {
        if self.phase() != RefreshPhase::Idle {
            return Ok(());
        }
        tracing::debug!("gesture left full pull without a reset; re-arming pull bindings");
        self.visuals().start_expressions(false)
    }

    pub fn on_scrollable_height_changed(&self, height: f32) {
        self.visuals().update_scrollable_height(height);
    }

    /// Route a surface event to the matching `on_*` method
    pub fn handle_event(&self, event: &SurfaceEvent) {
        match event.event_type {
            event_types::MANIPULATION_STARTED => self.on_manipulation_started(),
            event_types::RENDERING => {
                if let Err(err) = self.on_rendering() {
                    tracing::error!(%err, "failed to sample pull offset");
                }
            }
            event_types::MANIPULATION_COMPLETED => match self.on_manipulation_completed() {
                Ok(GestureResolution::Ignored) => {}
                Ok(GestureResolution::Cancelled(task)) => log_failure(task),
                Ok(GestureResolution::Committed(task)) => log_failure(task),
                Err(err) => tracing::error!(%err, "failed to resolve gesture"),
            },
            event_types::SCROLLABLE_HEIGHT_CHANGED => {
                if let Some(height) = event.scrollable_height() {
                    self.on_scrollable_height_changed(height);
                }
            }
            other => tracing::trace!(event_type = other, "unhandled surface event"),
        }
    }
}

impl<C: Compositor> PullToRefresh<C> {
    /// Register for the surface's manipulation, rendering and height signals
    pub fn attach(self: &Arc<Self>, dispatcher: &mut EventDispatcher, surface: SurfaceId) -> Attachment {
        let handlers = [
            event_types::MANIPULATION_STARTED,
            event_types::MANIPULATION_COMPLETED,
            event_types::RENDERING,
            event_types::SCROLLABLE_HEIGHT_CHANGED,
        ]
        .into_iter()
        .map(|event_type| {
            let controller: Weak<Self> = Arc::downgrade(self);
            dispatcher.register(surface, event_type, move |event| {
                if let Some(controller) = controller.upgrade() {
                    controller.handle_event(event);
                }
            })
        })
        .collect();

        Attachment { surface, handlers }
    }

    /// Remove the registrations made by [`attach`](Self::attach)
    pub fn detach(&self, dispatcher: &mut EventDispatcher, attachment: Attachment) {
        if self.sampler.lock().finish().is_some() {
            tracing::debug!("detached during a manipulation");
        }
        for handler in attachment.handlers {
            dispatcher.unregister(handler);
        }
    }
}

fn log_failure<T: Send + 'static>(task: JoinHandle<Result<T>>) {
    let Ok(runtime) = Handle::try_current() else {
        return;
    };
    runtime.spawn(async move {
        match task.await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => tracing::error!(%err, "refresh sequence failed"),
            Err(err) => tracing::error!(%err, "refresh task panicked or was aborted"),
        }
    });
}
