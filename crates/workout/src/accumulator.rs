use time::{Duration, OffsetDateTime};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AccumulatorConfig;
use crate::errors::{WorkoutError, WorkoutResult};
use crate::metrics::{DistanceMetric, ElevationMetric, PaceWindow, TrackMetric, pace_from_speed};
use crate::models::{
    ActivitySnapshot, ActivityType, PausedInterval, SmoothedFix, Split, WorkoutMetrics,
    WorkoutState, average_pace, average_speed,
};

/// Totals captured when the previous split closed.
#[derive(Debug, Clone, Copy, Default)]
struct SplitMark {
    distance: f64,
    moving_time: Duration,
    elevation_gain: f64,
}

/// Running totals for one workout session.
///
/// Starts in [`WorkoutState::Recording`]. Moving time is kept as an exact
/// [`Duration`] so that moving time plus paused time always equals elapsed
/// time.
#[derive(Debug, Clone)]
pub struct WorkoutAccumulator {
    id: Uuid,
    activity_type: ActivityType,
    config: AccumulatorConfig,
    state: WorkoutState,
    start_time: OffsetDateTime,
    stopped_at: Option<OffsetDateTime>,
    /// Start of the current recording segment, `None` unless Recording.
    segment_start: Option<OffsetDateTime>,
    completed_moving_time: Duration,
    paused_intervals: Vec<PausedInterval>,

    distance: DistanceMetric,
    elevation: ElevationMetric,
    pace: PaceWindow,
    current_speed: Option<f64>,
    max_speed: f64,

    locations: Vec<SmoothedFix>,
    splits: Vec<Split>,
    split_mark: SplitMark,
    next_split_at: f64,
}

impl WorkoutAccumulator {
    pub fn new(activity_type: ActivityType, config: AccumulatorConfig, start: OffsetDateTime) -> Self {
        info!(%activity_type, "workout started");
        Self {
            id: Uuid::new_v4(),
            activity_type,
            config,
            state: WorkoutState::Recording,
            start_time: start,
            stopped_at: None,
            segment_start: Some(start),
            completed_moving_time: Duration::ZERO,
            paused_intervals: Vec::new(),
            distance: DistanceMetric::default(),
            elevation: ElevationMetric::new(config.elevation_noise_floor_m),
            pace: PaceWindow::new(
                Duration::saturating_seconds_f64(config.pace_window_secs),
                config.pace_window_min_distance_m,
            ),
            current_speed: None,
            max_speed: 0.0,
            locations: Vec::new(),
            splits: Vec::new(),
            split_mark: SplitMark::default(),
            next_split_at: config.split_distance_m,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn activity_type(&self) -> ActivityType {
        self.activity_type
    }

    pub fn state(&self) -> WorkoutState {
        self.state
    }

    pub fn start_time(&self) -> OffsetDateTime {
        self.start_time
    }

    pub fn locations(&self) -> &[SmoothedFix] {
        &self.locations
    }

    pub fn splits(&self) -> &[Split] {
        &self.splits
    }

    pub fn paused_intervals(&self) -> &[PausedInterval] {
        &self.paused_intervals
    }

    pub fn distance(&self) -> f64 {
        self.distance.score()
    }

    /// Meters covered since the last split closed.
    pub fn current_split_progress(&self) -> f64 {
        self.distance() - self.split_mark.distance
    }

    /// Once stopped, time is frozen at the stop instant.
    fn effective_now(&self, now: OffsetDateTime) -> OffsetDateTime {
        self.stopped_at.unwrap_or(now)
    }

    pub fn elapsed_time(&self, now: OffsetDateTime) -> Duration {
        self.effective_now(now) - self.start_time
    }

    pub fn moving_time(&self, now: OffsetDateTime) -> Duration {
        match self.segment_start {
            Some(segment_start) => self.completed_moving_time + (now - segment_start),
            None => self.completed_moving_time,
        }
    }

    pub fn paused_time(&self, now: OffsetDateTime) -> Duration {
        let now = self.effective_now(now);
        self.paused_intervals
            .iter()
            .map(|interval| interval.duration(now))
            .fold(Duration::ZERO, |total, d| total + d)
    }

    fn close_segment(&mut self, now: OffsetDateTime) {
        if let Some(segment_start) = self.segment_start.take() {
            self.completed_moving_time += now - segment_start;
        }
    }

    fn close_pause(&mut self, now: OffsetDateTime) {
        if let Some(interval) = self.paused_intervals.last_mut()
            && interval.is_open()
        {
            interval.end_time = Some(now);
        }
    }

    pub fn pause(&mut self, now: OffsetDateTime) -> WorkoutResult<()> {
        match self.state {
            WorkoutState::Recording => {
                self.close_segment(now);
                self.paused_intervals.push(PausedInterval::open(now));
                self.distance.break_stretch();
                self.elevation.break_stretch();
                self.pace.break_stretch();
                self.current_speed = None;
                self.state = WorkoutState::Paused;
                info!(workout = %self.id, "workout paused");
                Ok(())
            }
            WorkoutState::Paused => {
                debug!(workout = %self.id, "pause ignored, already paused");
                Ok(())
            }
            WorkoutState::Stopped => Err(WorkoutError::invalid_transition(self.state, "pause")),
        }
    }

    pub fn resume(&mut self, now: OffsetDateTime) -> WorkoutResult<()> {
        match self.state {
            WorkoutState::Paused => {
                self.close_pause(now);
                self.segment_start = Some(now);
                self.state = WorkoutState::Recording;
                info!(workout = %self.id, "workout resumed");
                Ok(())
            }
            WorkoutState::Recording => {
                debug!(workout = %self.id, "resume ignored, already recording");
                Ok(())
            }
            WorkoutState::Stopped => Err(WorkoutError::invalid_transition(self.state, "resume")),
        }
    }

    pub fn stop(&mut self, now: OffsetDateTime) -> WorkoutResult<()> {
        match self.state {
            WorkoutState::Recording => self.close_segment(now),
            WorkoutState::Paused => self.close_pause(now),
            WorkoutState::Stopped => {
                return Err(WorkoutError::invalid_transition(self.state, "stop"));
            }
        }
        self.stopped_at = Some(now);
        self.state = WorkoutState::Stopped;
        info!(
            workout = %self.id,
            distance = self.distance(),
            splits = self.splits.len(),
            "workout stopped"
        );
        Ok(())
    }

    /// Folds a smoothed fix into the totals, returning the split it closed, if any.
    ///
    /// Fixes delivered while paused are ignored.
    pub fn add_location(&mut self, fix: &SmoothedFix, now: OffsetDateTime) -> WorkoutResult<Option<Split>> {
        match self.state {
            WorkoutState::Recording => {}
            WorkoutState::Paused => {
                debug!(workout = %self.id, "location ignored while paused");
                return Ok(None);
            }
            WorkoutState::Stopped => {
                return Err(WorkoutError::invalid_transition(self.state, "add a location"));
            }
        }

        self.distance.next_point(fix);
        self.elevation.next_point(fix);
        self.pace.next_point(fix);
        self.locations.push(*fix);

        self.current_speed = fix.reported_speed().or_else(|| self.pace.score());
        if let Some(speed) = self.current_speed {
            self.max_speed = self.max_speed.max(speed);
        }

        Ok(self.close_split_if_due(now))
    }

    fn close_split_if_due(&mut self, now: OffsetDateTime) -> Option<Split> {
        let split_distance = self.config.split_distance_m;
        if !(split_distance > 0.0 && split_distance.is_finite()) {
            return None;
        }

        let total = self.distance();
        if total < self.next_split_at {
            return None;
        }

        let moving_time = self.moving_time(now);
        let (gain, _) = self.elevation.score();
        let distance = total - self.split_mark.distance;
        let duration = (moving_time - self.split_mark.moving_time).as_seconds_f64();

        let split = Split {
            index: self.splits.len(),
            distance,
            duration,
            pace: average_pace(distance, duration),
            elevation_gain: gain - self.split_mark.elevation_gain,
            end_distance: total,
        };
        info!(
            workout = %self.id,
            index = split.index,
            distance = split.distance,
            pace = split.pace,
            "split completed"
        );

        self.splits.push(split);
        self.split_mark = SplitMark {
            distance: total,
            moving_time,
            elevation_gain: gain,
        };
        // A gap spanning several boundaries still closes only one split.
        self.next_split_at = ((total / split_distance).floor() + 1.0) * split_distance;
        Some(split)
    }

    pub fn metrics(&self, now: OffsetDateTime) -> WorkoutMetrics {
        let distance = self.distance();
        let moving_time = self.moving_time(now).as_seconds_f64();
        let (elevation_gain, elevation_loss) = self.elevation.score();

        WorkoutMetrics {
            state: self.state,
            distance,
            elapsed_time: self.elapsed_time(now).as_seconds_f64(),
            moving_time,
            current_pace: self.current_speed.and_then(pace_from_speed),
            average_pace: average_pace(distance, moving_time),
            current_speed: self.current_speed,
            average_speed: average_speed(distance, moving_time),
            max_speed: self.max_speed,
            elevation_gain,
            elevation_loss,
            split_count: self.splits.len(),
            sample_count: self.locations.len(),
        }
    }

    /// Immutable record of the finished workout. Only available once stopped.
    pub fn to_activity_snapshot(&self) -> WorkoutResult<ActivitySnapshot> {
        let Some(end_date) = self.stopped_at else {
            return Err(WorkoutError::invalid_transition(self.state, "take a snapshot"));
        };

        let distance = self.distance();
        let moving_time = self.completed_moving_time.as_seconds_f64();
        let (elevation_gain, elevation_loss) = self.elevation.score();

        Ok(ActivitySnapshot {
            id: self.id,
            activity_type: self.activity_type,
            start_date: self.start_time,
            end_date,
            distance,
            duration: (end_date - self.start_time).as_seconds_f64(),
            moving_time,
            elevation_gain,
            elevation_loss,
            average_pace: average_pace(distance, moving_time),
            locations: self.locations.clone(),
            splits: self.splits.clone(),
            paused_intervals: self.paused_intervals.clone(),
        })
    }
}
