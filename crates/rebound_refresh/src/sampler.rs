//! Gesture sampler
//!
//! Records the icon offset once per rendering tick while a manipulation is
//! active and remembers when the pull reached its maximum and when the list
//! snapped back.

use tokio::time::Instant;

use crate::config::RefreshConfiguration;

/// One manipulation, from start to end
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureSession {
    pub started_at: Instant,
    /// Last sampled icon offset (signed)
    pub sampled_offset: f32,
    /// Set once the offset reaches its maximum; never cleared mid-session
    pub committed: bool,
    /// Latest tick at which the offset sat at its maximum
    pub pulled_down_at: Option<Instant>,
    /// Latest tick at which a committed pull was back near zero
    pub restored_at: Option<Instant>,
    pub samples: u32,
}

impl GestureSession {
    pub fn new(started_at: Instant) -> Self {
        Self {
            started_at,
            sampled_offset: 0.0,
            committed: false,
            pulled_down_at: None,
            restored_at: None,
            samples: 0,
        }
    }
}

/// What a single sample observed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SampleFlags {
    pub at_max: bool,
    pub restored: bool,
}

/// Samples the icon offset during a manipulation
#[derive(Debug)]
pub struct GestureSampler {
    max_offset: f32,
    tolerance: f32,
    restored_threshold: f32,
    session: Option<GestureSession>,
}

impl GestureSampler {
    pub fn new(config: &RefreshConfiguration) -> Self {
        Self {
            max_offset: config.max_pulled_offset_y(),
            tolerance: config.max_offset_tolerance,
            restored_threshold: config.restored_threshold,
            session: None,
        }
    }

    /// Start a new session, discarding any unfinished one
    pub fn begin(&mut self, now: Instant) {
        if self.session.is_some() {
            tracing::debug!("manipulation restarted before the previous one completed");
        }
        self.session = Some(GestureSession::new(now));
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&GestureSession> {
        self.session.as_ref()
    }

    /// Record one tick. Ticks outside a session are ignored.
    pub fn record(&mut self, offset: f32, now: Instant) -> SampleFlags {
        let Some(session) = self.session.as_mut() else {
            return SampleFlags::default();
        };

        session.sampled_offset = offset;
        session.samples += 1;

        let at_max = (offset - self.max_offset).abs() < self.tolerance;
        if at_max {
            session.committed = true;
            session.pulled_down_at = Some(now);
        }

        // Bounces overwrite the restore time; only the last one counts
        let restored = session.committed && offset.abs() <= self.restored_threshold;
        if restored {
            session.restored_at = Some(now);
        }

        tracing::trace!(offset, at_max, restored, "gesture sample");
        SampleFlags { at_max, restored }
    }

    /// End the session and hand it over for classification
    pub fn finish(&mut self) -> Option<GestureSession> {
        self.session.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PullDirection;
    use std::time::Duration;

    fn sampler(direction: PullDirection) -> GestureSampler {
        GestureSampler::new(&RefreshConfiguration::for_direction(direction))
    }

    #[test]
    fn test_records_only_inside_session() {
        let mut s = sampler(PullDirection::TopDown);
        let t0 = Instant::now();

        assert_eq!(s.record(36.0, t0), SampleFlags::default());
        assert!(s.finish().is_none());

        s.begin(t0);
        assert!(s.is_active());
        s.record(10.0, t0);
        let session = s.finish().unwrap();
        assert!(!session.committed);
        assert_eq!(session.samples, 1);
        assert!(!s.is_active());
    }

    #[test]
    fn test_commit_and_restore_timestamps() {
        let mut s = sampler(PullDirection::TopDown);
        let t0 = Instant::now();
        let at = |ms| t0 + Duration::from_millis(ms);

        s.begin(t0);
        s.record(20.0, at(16));
        assert!(s.record(36.0, at(32)).at_max);
        s.record(36.0, at(48));
        s.record(18.0, at(64));
        assert!(s.record(0.5, at(80)).restored);
        s.record(0.0, at(96));

        let session = s.finish().unwrap();
        assert!(session.committed);
        assert_eq!(session.pulled_down_at, Some(at(48)));
        assert_eq!(session.restored_at, Some(at(96)));
    }

    #[test]
    fn test_commit_survives_pulling_back() {
        let mut s = sampler(PullDirection::TopDown);
        let t0 = Instant::now();

        s.begin(t0);
        s.record(36.0, t0);
        s.record(5.0, t0 + Duration::from_millis(500));
        let session = s.finish().unwrap();
        assert!(session.committed);
        assert_eq!(session.restored_at, None);
    }

    #[test]
    fn test_restore_before_commit_is_ignored() {
        let mut s = sampler(PullDirection::TopDown);
        let t0 = Instant::now();

        s.begin(t0);
        assert!(!s.record(0.0, t0).restored);
        assert_eq!(s.session().unwrap().restored_at, None);
    }

    #[test]
    fn test_bottom_up_uses_negative_max() {
        let mut s = sampler(PullDirection::BottomUp);
        let t0 = Instant::now();

        s.begin(t0);
        assert!(!s.record(36.0, t0).at_max);
        assert!(s.record(-36.0, t0).at_max);
        assert!(s.record(-0.5, t0).restored);
    }

    #[test]
    fn test_near_max_outside_tolerance() {
        let mut s = sampler(PullDirection::TopDown);
        s.begin(Instant::now());
        assert!(!s.record(35.98, Instant::now()).at_max);
        assert!(s.record(35.995, Instant::now()).at_max);
    }
}
