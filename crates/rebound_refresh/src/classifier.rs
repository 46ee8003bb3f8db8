//! Commit/cancel classification
//!
//! The manipulation-completed signal arrives after the list has already
//! sprung back and carries no velocity, so a release at full pull cannot be
//! told apart from dragging back up directly. The default classifier looks at
//! how fast the offset returned to zero after last sitting at its maximum: the
//! surface's own rubber-band animation is quick, a manual drag back is not.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::RefreshConfiguration;
use crate::sampler::GestureSession;

/// Outcome of a finished gesture
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Never reached full pull
    Ignored,
    /// Reached full pull but was dragged back
    Cancel,
    /// Released at full pull
    Commit,
}

/// Decides what a finished gesture means
pub trait GestureClassifier: Send + Sync {
    fn classify(&self, session: &GestureSession) -> Classification;
}

/// Timing heuristic on the snap-back after full pull
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnapBackClassifier {
    window: Duration,
}

impl SnapBackClassifier {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn from_config(config: &RefreshConfiguration) -> Self {
        Self::new(config.commit_cancel_window())
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Default for SnapBackClassifier {
    fn default() -> Self {
        Self::from_config(&RefreshConfiguration::default())
    }
}

impl GestureClassifier for SnapBackClassifier {
    fn classify(&self, session: &GestureSession) -> Classification {
        let Some(pulled_down_at) = session.pulled_down_at.filter(|_| session.committed) else {
            return Classification::Ignored;
        };

        // No restore, or one older than the last max, counts as an instant snap-back
        let gap = session
            .restored_at
            .map(|restored| restored.saturating_duration_since(pulled_down_at))
            .unwrap_or_default();

        let classification = if gap > self.window {
            Classification::Cancel
        } else {
            Classification::Commit
        };
        tracing::debug!(gap_ms = gap.as_millis() as u64, ?classification, "gesture classified");
        classification
    }
}

impl<F> GestureClassifier for F
where
    F: Fn(&GestureSession) -> Classification + Send + Sync,
{
    fn classify(&self, session: &GestureSession) -> Classification {
        self(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn session(gap_ms: Option<u64>) -> GestureSession {
        let start = Instant::now();
        let pulled = start + Duration::from_millis(50);
        GestureSession {
            started_at: start,
            sampled_offset: 0.0,
            committed: true,
            pulled_down_at: Some(pulled),
            restored_at: gap_ms.map(|ms| pulled + Duration::from_millis(ms)),
            samples: 10,
        }
    }

    #[test]
    fn test_uncommitted_is_ignored() {
        let mut s = session(Some(10));
        s.committed = false;
        assert_eq!(
            SnapBackClassifier::default().classify(&s),
            Classification::Ignored
        );
        assert_eq!(
            SnapBackClassifier::default().classify(&GestureSession::new(Instant::now())),
            Classification::Ignored
        );
    }

    #[test]
    fn test_window_boundary() {
        let c = SnapBackClassifier::default();
        assert_eq!(c.classify(&session(Some(249))), Classification::Commit);
        assert_eq!(c.classify(&session(Some(250))), Classification::Commit);
        assert_eq!(c.classify(&session(Some(251))), Classification::Cancel);
    }

    #[test]
    fn test_missing_restore_commits() {
        let c = SnapBackClassifier::default();
        assert_eq!(c.classify(&session(None)), Classification::Commit);
    }

    #[test]
    fn test_restore_before_last_max_commits() {
        let mut s = session(None);
        s.restored_at = Some(s.started_at);
        assert_eq!(
            SnapBackClassifier::default().classify(&s),
            Classification::Commit
        );
    }

    #[test]
    fn test_custom_window_and_closure() {
        let c = SnapBackClassifier::new(Duration::from_millis(100));
        assert_eq!(c.classify(&session(Some(150))), Classification::Cancel);

        let always = |_: &GestureSession| Classification::Commit;
        assert_eq!(always.classify(&session(Some(10_000))), Classification::Commit);
    }
}
