//! End-to-end workout sessions driven through the [`Recorder`] with a manual clock.

use std::sync::Arc;

use time::macros::datetime;
use time::{Duration, OffsetDateTime};
use workout::distance::offset_meters;
use workout::{
    AccumulatorConfig, ActivityType, CoverageAggregator, FilterConfig, InMemoryActivityStore,
    ManualClock, RawFix, Recorder, SmootherConfig, TrackerConfig, WorkoutError, WorkoutState,
};

const T0: OffsetDateTime = datetime!(2024-05-18 06:30:00 UTC);

fn fix(north_m: f64, secs: i64, horizontal_accuracy: f64) -> RawFix {
    let (latitude, longitude) = offset_meters(40.015, -105.27, north_m, 0.0);
    RawFix {
        latitude,
        longitude,
        altitude: 1655.0,
        horizontal_accuracy,
        vertical_accuracy: 8.0,
        timestamp: T0 + Duration::seconds(secs),
        speed: -1.0,
    }
}

fn recorder(config: TrackerConfig) -> (Recorder, ManualClock) {
    let clock = ManualClock::new(T0);
    let recorder = Recorder::new(
        config,
        Arc::new(clock.clone()),
        Arc::new(CoverageAggregator::new()),
    );
    (recorder, clock)
}

#[test]
fn test_ten_fixes_hundred_meters_apart() {
    // 100 m/s is far beyond a runner, so the speed gate and smoothing are relaxed.
    let config = TrackerConfig {
        filter: Some(FilterConfig {
            max_speed: 150.0,
            ..FilterConfig::for_activity(ActivityType::Running)
        }),
        smoother: Some(SmootherConfig::disabled()),
        accumulator: AccumulatorConfig {
            split_distance_m: 500.0,
            ..AccumulatorConfig::default()
        },
        ..TrackerConfig::default()
    };
    let (mut recorder, clock) = recorder(config);
    recorder.start(ActivityType::Running).unwrap();

    let mut splits = Vec::new();
    for i in 0..10 {
        clock.set(T0 + Duration::seconds(i));
        let processed = recorder.process_fix(fix(i as f64 * 100.0, i, 10.0)).unwrap();
        assert!(processed.verdict.is_accepted(), "fix {i}: {:?}", processed.verdict);
        splits.extend(processed.split);
    }

    let metrics = recorder.metrics_snapshot().unwrap();
    assert!((metrics.distance - 900.0).abs() < 9.0, "distance {}", metrics.distance);
    assert_eq!(metrics.moving_time, 9.0);
    assert_eq!(metrics.sample_count, 10);
    assert_eq!(splits.len(), 1);
    assert!(splits[0].distance >= 500.0 && splits[0].distance < 600.0);

    let snapshot = recorder.stop().unwrap();
    assert_eq!(snapshot.splits, splits);
    assert_eq!(snapshot.locations.len(), 10);
    assert_eq!(recorder.statistics().unwrap().accepted, 10);
}

#[test]
fn test_default_run_preset_rejects_teleporting_fixes() {
    let (mut recorder, clock) = recorder(TrackerConfig::default());
    recorder.start(ActivityType::Running).unwrap();

    let mut accepted = 0;
    for i in 0..10 {
        clock.set(T0 + Duration::seconds(i));
        if recorder
            .process_fix(fix(i as f64 * 100.0, i, 10.0))
            .unwrap()
            .verdict
            .is_accepted()
        {
            accepted += 1;
        }
    }

    // Only the first fix passes: every later one implies 100 m/s or more.
    assert_eq!(accepted, 1);
    assert_eq!(recorder.statistics().unwrap().rejected_by_speed, 9);
}

#[test]
fn test_realistic_run_with_pause() {
    let (mut recorder, clock) = recorder(TrackerConfig::default());
    recorder.start(ActivityType::Running).unwrap();

    // 3 m/s for two minutes, a 30 s pause, then another two minutes.
    let mut secs = 0;
    let mut north = 0.0;
    for _ in 0..40 {
        clock.set(T0 + Duration::seconds(secs));
        recorder.process_fix(fix(north, secs, 6.0)).unwrap();
        secs += 3;
        north += 9.0;
    }
    secs -= 3;
    north -= 9.0;

    recorder.pause().unwrap();
    secs += 30;
    clock.set(T0 + Duration::seconds(secs));
    recorder.resume().unwrap();

    for _ in 0..40 {
        secs += 3;
        north += 9.0;
        clock.set(T0 + Duration::seconds(secs));
        recorder.process_fix(fix(north, secs, 6.0)).unwrap();
    }

    let metrics = recorder.metrics_snapshot().unwrap();
    assert_eq!(metrics.state, WorkoutState::Recording);
    assert_eq!(metrics.moving_time, 237.0);
    assert_eq!(metrics.elapsed_time, metrics.moving_time + 30.0);
    assert!(metrics.distance > 500.0 && metrics.distance < 720.0, "distance {}", metrics.distance);
    assert!(metrics.current_speed.is_some());

    let snapshot = recorder.stop().unwrap();
    assert_eq!(snapshot.paused_intervals.len(), 1);
    assert_eq!(snapshot.duration, 267.0);
}

#[test]
fn test_pause_scenario() {
    let config = TrackerConfig {
        smoother: Some(SmootherConfig::disabled()),
        ..TrackerConfig::default()
    };
    let (mut recorder, clock) = recorder(config);
    recorder.start(ActivityType::Walking).unwrap();

    for (north, secs) in [(0.0, 0), (15.0, 10)] {
        clock.set(T0 + Duration::seconds(secs));
        recorder.process_fix(fix(north, secs, 5.0)).unwrap();
    }

    recorder.pause().unwrap();
    clock.advance(Duration::seconds(30));
    recorder.resume().unwrap();

    for (north, secs) in [(45.0, 45), (60.0, 55)] {
        clock.set(T0 + Duration::seconds(secs));
        let processed = recorder.process_fix(fix(north, secs, 5.0)).unwrap();
        assert!(processed.verdict.is_accepted());
    }

    let metrics = recorder.metrics_snapshot().unwrap();
    assert_eq!(metrics.moving_time, 25.0);
    assert_eq!(metrics.elapsed_time, 55.0);
    assert_eq!(metrics.elapsed_time, metrics.moving_time + 30.0);
    // Two recording stretches of 15 m each; the gap across the pause is not counted.
    assert!((metrics.distance - 30.0).abs() < 0.5, "distance {}", metrics.distance);
}

#[test]
fn test_error_kinds() {
    let (mut recorder, clock) = recorder(TrackerConfig::default());
    assert_eq!(recorder.stop(), Err(WorkoutError::NoActiveWorkout));

    recorder.start(ActivityType::Hiking).unwrap();
    assert_eq!(
        recorder.start(ActivityType::Hiking),
        Err(WorkoutError::WorkoutAlreadyActive)
    );

    clock.advance(Duration::minutes(5));
    recorder.stop().unwrap();
    assert!(matches!(
        recorder.resume(),
        Err(WorkoutError::InvalidStateTransition {
            state: WorkoutState::Stopped,
            action: "resume"
        })
    ));
    assert!(matches!(
        recorder.stop(),
        Err(WorkoutError::InvalidStateTransition { .. })
    ));

    // A stopped workout that was handed off frees the recorder for a new one.
    let store = InMemoryActivityStore::new();
    recorder.hand_off(&store).unwrap();
    assert_eq!(recorder.metrics_snapshot(), Err(WorkoutError::NoActiveWorkout));
    recorder.start(ActivityType::Running).unwrap();
}

#[test]
fn test_coverage_accumulates_across_sessions() {
    let coverage = Arc::new(CoverageAggregator::new());
    let clock = ManualClock::new(T0);
    let config = TrackerConfig {
        smoother: Some(SmootherConfig::disabled()),
        ..TrackerConfig::default()
    };
    let store = InMemoryActivityStore::new();
    let mut recorder = Recorder::new(config, Arc::new(clock.clone()), coverage.clone());

    let mut first_pass = 0;
    for session in 0..2 {
        let offset = session * 3600;
        clock.set(T0 + Duration::seconds(offset));
        recorder.start(ActivityType::Walking).unwrap();
        for i in 0..30 {
            let secs = offset + i * 10;
            clock.set(T0 + Duration::seconds(secs));
            recorder.process_fix(fix(i as f64 * 15.0, secs, 5.0)).unwrap();
        }
        recorder.stop().unwrap();
        recorder.hand_off(&store).unwrap();
        if session == 0 {
            first_pass = coverage.total_visits();
        }
    }

    // Same route twice: same cells, doubled visits.
    assert!(first_pass > 0);
    assert_eq!(coverage.total_visits(), first_pass * 2);
    assert_eq!(coverage.len() as u64, first_pass);
    for tile in coverage.tiles() {
        assert_eq!(tile.visit_count, 2);
        assert!(tile.last_visited - tile.first_visited >= Duration::hours(1) - Duration::seconds(300));
    }
    assert_eq!(workout::ActivityStore::list_activities(&store).unwrap().len(), 2);
}
