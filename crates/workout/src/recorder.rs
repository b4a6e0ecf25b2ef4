use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::accumulator::WorkoutAccumulator;
use crate::admission::{AdmissionFilter, FilterStatistics, FilterVerdict};
use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::coverage::{CoverageAggregator, ObservedVisit, VisitCollector};
use crate::errors::{WorkoutError, WorkoutResult};
use crate::kalman::KalmanSmoother;
use crate::models::{
    ActivitySnapshot, ActivityType, RawFix, SmoothedFix, Split, WorkoutMetrics, WorkoutState,
};
use crate::store::ActivityStore;

/// Outcome of feeding one raw fix through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessedFix {
    pub verdict: FilterVerdict,
    /// Present only when the fix was accepted while recording.
    pub smoothed: Option<SmoothedFix>,
    /// The split this fix closed, if any.
    pub split: Option<Split>,
}

/// Per-session pipeline state, exclusively owned by one recorder.
#[derive(Debug)]
struct Session {
    filter: AdmissionFilter,
    smoother: KalmanSmoother,
    accumulator: WorkoutAccumulator,
    visits: VisitCollector,
}

/// Runs one workout session at a time: filter, smoother, accumulator, and
/// the coverage visits collected along the way.
///
/// A stopped session is kept until [`Recorder::hand_off`] persists it.
pub struct Recorder {
    config: TrackerConfig,
    clock: Arc<dyn Clock>,
    coverage: Arc<CoverageAggregator>,
    session: Option<Session>,
}

impl Recorder {
    pub fn new(
        config: TrackerConfig,
        clock: Arc<dyn Clock>,
        coverage: Arc<CoverageAggregator>,
    ) -> Self {
        Self {
            config,
            clock,
            coverage,
            session: None,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn coverage(&self) -> &Arc<CoverageAggregator> {
        &self.coverage
    }

    /// State of the current session, `None` when there is none.
    pub fn state(&self) -> Option<WorkoutState> {
        self.session.as_ref().map(|s| s.accumulator.state())
    }

    fn session(&self) -> WorkoutResult<&Session> {
        self.session.as_ref().ok_or(WorkoutError::NoActiveWorkout)
    }

    fn session_mut(&mut self) -> WorkoutResult<&mut Session> {
        self.session.as_mut().ok_or(WorkoutError::NoActiveWorkout)
    }

    pub fn start(&mut self, activity_type: ActivityType) -> WorkoutResult<()> {
        if let Some(session) = &self.session {
            if session.accumulator.state() != WorkoutState::Stopped {
                return Err(WorkoutError::WorkoutAlreadyActive);
            }
            warn!(
                workout = %session.accumulator.id(),
                "discarding stopped workout that was never handed off"
            );
        }

        let now = self.clock.now();
        self.session = Some(Session {
            filter: AdmissionFilter::new(self.config.filter_for(activity_type)),
            smoother: KalmanSmoother::new(self.config.smoother_for(activity_type)),
            accumulator: WorkoutAccumulator::new(activity_type, self.config.accumulator, now),
            visits: VisitCollector::new(self.config.coverage_precision),
        });
        Ok(())
    }

    /// Feeds one raw sample through admission, smoothing and accumulation.
    ///
    /// While paused, fixes are still judged by the filter so its reference
    /// stays current, but nothing is smoothed or accumulated.
    pub fn process_fix(&mut self, raw: RawFix) -> WorkoutResult<ProcessedFix> {
        let now = self.clock.now();
        let session = self.session_mut()?;

        let state = session.accumulator.state();
        if state == WorkoutState::Stopped {
            return Err(WorkoutError::invalid_transition(state, "process a fix"));
        }

        let verdict = session.filter.should_accept(&raw, now);
        if !verdict.is_accepted() || state == WorkoutState::Paused {
            return Ok(ProcessedFix {
                verdict,
                smoothed: None,
                split: None,
            });
        }

        let smoothed = session.smoother.smooth(&raw);
        let split = session.accumulator.add_location(&smoothed, now)?;
        if let Err(err) = session
            .visits
            .record(smoothed.latitude, smoothed.longitude, smoothed.timestamp)
        {
            warn!(%err, "fix left out of coverage");
        }

        Ok(ProcessedFix {
            verdict,
            smoothed: Some(smoothed),
            split,
        })
    }

    pub fn metrics_snapshot(&self) -> WorkoutResult<WorkoutMetrics> {
        let session = self.session()?;
        Ok(session.accumulator.metrics(self.clock.now()))
    }

    pub fn statistics(&self) -> WorkoutResult<FilterStatistics> {
        Ok(self.session()?.filter.statistics())
    }

    pub fn pause(&mut self) -> WorkoutResult<()> {
        let now = self.clock.now();
        let session = self.session_mut()?;
        let was_recording = session.accumulator.state() == WorkoutState::Recording;

        session.accumulator.pause(now)?;
        if was_recording {
            // Movement during the pause must not drag the estimate or count as a cell stay.
            session.smoother.reset();
            session.visits.interrupt();
        }
        Ok(())
    }

    pub fn resume(&mut self) -> WorkoutResult<()> {
        let now = self.clock.now();
        self.session_mut()?.accumulator.resume(now)
    }

    /// Ends the session, merges its coverage visits, and returns the finished record.
    pub fn stop(&mut self) -> WorkoutResult<ActivitySnapshot> {
        let now = self.clock.now();
        let session = self.session_mut()?;
        session.accumulator.stop(now)?;

        let visits = session.visits.drain();
        let snapshot = session.accumulator.to_activity_snapshot()?;
        self.coverage.upsert(&visits)?;

        info!(
            workout = %snapshot.id,
            distance = snapshot.distance,
            moving_time = snapshot.moving_time,
            cells = visits.len(),
            "workout recorded"
        );
        Ok(snapshot)
    }

    /// Persists the stopped session and releases it.
    ///
    /// On failure the stopped session is kept untouched so the hand-off can be retried.
    pub fn hand_off(&mut self, store: &dyn ActivityStore) -> WorkoutResult<ActivitySnapshot> {
        let session = self.session()?;
        let state = session.accumulator.state();
        if state != WorkoutState::Stopped {
            return Err(WorkoutError::invalid_transition(state, "hand off"));
        }

        let snapshot = session.accumulator.to_activity_snapshot()?;
        if let Err(err) = store.save_activity(&snapshot) {
            warn!(workout = %snapshot.id, %err, "hand-off failed, keeping workout");
            return Err(err.into());
        }

        debug!(workout = %snapshot.id, "workout handed off");
        self.session = None;
        Ok(snapshot)
    }

    /// Merges externally observed visits into the shared coverage.
    pub fn upsert_tiles(&self, visits: &[ObservedVisit]) -> WorkoutResult<()> {
        self.coverage.upsert(visits)?;
        Ok(())
    }
}
