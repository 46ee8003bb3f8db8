//! Rebound pull-to-refresh
//!
//! A gesture and animation state machine for pull-to-refresh on a scrollable
//! list. The icon's rotation, opacity and offset follow the over-scroll
//! through compositor expressions; a released full pull runs a refresh
//! operation behind a loading spin and then resets the indicator.
//!
//! # Components
//!
//! - **Gesture Sampler** ([`sampler`]): samples the icon offset every frame of a manipulation
//! - **Pull-Distance Model** ([`pull`]): maps over-scroll to rotation, opacity and offset
//! - **Commit/Cancel Classifier** ([`classifier`]): decides what a finished gesture meant
//! - **Refresh Orchestrator** ([`orchestrator`]): loading, refresh and reset sequencing
//!
//! [`PullToRefresh`] wires them to a scrollable surface.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use rebound_animation::AnimationScheduler;
//! use rebound_refresh::{PullToRefresh, RefreshCommand, RefreshConfiguration};
//!
//! # async fn run() -> rebound_refresh::Result<()> {
//! let mut scheduler = AnimationScheduler::new();
//! let icon = scheduler.create_visual();
//! let border = scheduler.create_visual();
//! let compositor = Arc::new(Mutex::new(scheduler));
//!
//! let controller = PullToRefresh::new(
//!     compositor.clone(),
//!     icon,
//!     border,
//!     RefreshConfiguration::default(),
//!     0.0,
//! )?;
//! controller.set_command(RefreshCommand::new(|token| async move { token.check() }));
//!
//! controller.on_manipulation_started();
//! compositor.lock().set_translation_y(60.0);
//! controller.on_rendering()?;
//! let _resolution = controller.on_manipulation_completed()?;
//! # Ok(())
//! # }
//! ```

pub mod behavior;
pub mod cancel;
pub mod classifier;
pub mod command;
pub mod config;
pub mod deferral;
pub mod error;
pub mod operation;
pub mod orchestrator;
pub mod pull;
pub mod sampler;
pub mod visuals;

pub use behavior::{Attachment, GestureResolution, PullToRefresh};
pub use cancel::CancellationHandle;
pub use classifier::{Classification, GestureClassifier, SnapBackClassifier};
pub use command::RefreshCommand;
pub use config::{PullDirection, RefreshConfiguration};
pub use deferral::{Deferral, DeferralCompletion, DeferralGuard, RefreshRequestedArgs};
pub use error::{ConfigError, RefreshError, Result};
pub use operation::{RefreshOperation, RefreshRequestedHandler};
pub use orchestrator::{PhaseEvent, RefreshOrchestrator, RefreshOutcome, RefreshPhase};
pub use pull::{PullModel, PullVisuals};
pub use sampler::{GestureSampler, GestureSession, SampleFlags};
pub use visuals::RefreshVisuals;
