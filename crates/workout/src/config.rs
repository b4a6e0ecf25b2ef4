//! Tunables for every pipeline stage, with per-activity presets.

use std::path::Path;

use serde::{Deserialize, Serialize};
use time::Duration;

use crate::geohash::MAX_PRECISION;
use crate::models::ActivityType;

/// Thresholds used by the admission filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Largest acceptable horizontal accuracy radius in meters.
    pub accuracy_threshold: f64,
    /// Vertical accuracy beyond this is counted but never rejects.
    pub vertical_accuracy_threshold: f64,
    /// Oldest acceptable fix, in seconds relative to now.
    pub max_age_secs: f64,
    /// Minimum movement in meters since the last accepted fix.
    pub min_displacement: f64,
    /// Fastest plausible movement in meters per second.
    pub max_speed: f64,
}

impl FilterConfig {
    pub fn for_activity(activity: ActivityType) -> Self {
        let (accuracy_threshold, min_displacement, max_speed) = match activity {
            ActivityType::Walking => (20.0, 2.0, 4.0),
            ActivityType::Hiking => (25.0, 2.0, 4.0),
            ActivityType::Running => (20.0, 3.0, 12.0),
            ActivityType::Cycling => (25.0, 5.0, 30.0),
            ActivityType::MountainBiking => (25.0, 4.0, 25.0),
            ActivityType::Unknown => (30.0, 2.0, 50.0),
        };
        Self {
            accuracy_threshold,
            vertical_accuracy_threshold: 30.0,
            max_age_secs: 10.0,
            min_displacement,
            max_speed,
        }
    }

    pub fn max_age(&self) -> Duration {
        Duration::saturating_seconds_f64(self.max_age_secs)
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::for_activity(ActivityType::Unknown)
    }
}

/// Noise parameters for the per-axis Kalman smoother.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmootherConfig {
    /// When false the smoother passes fixes through untouched.
    pub enabled: bool,
    /// Variance added to the estimate on every step. Higher tracks faster.
    pub process_noise: f64,
    /// Lower bound on the measurement variance.
    pub measurement_noise_floor: f64,
}

impl SmootherConfig {
    /// Faster activities get more process noise, so less smoothing.
    pub fn for_activity(activity: ActivityType) -> Self {
        let (process_noise, measurement_noise_floor) = match activity {
            ActivityType::Walking | ActivityType::Hiking => (0.5, 9.0),
            ActivityType::Running => (1.5, 9.0),
            ActivityType::Cycling => (4.0, 16.0),
            ActivityType::MountainBiking => (3.0, 16.0),
            ActivityType::Unknown => (2.0, 9.0),
        };
        Self {
            enabled: true,
            process_noise,
            measurement_noise_floor,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self::for_activity(ActivityType::Unknown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorConfig {
    pub split_distance_m: f64,
    /// Altitude changes at or below this are treated as noise.
    pub elevation_noise_floor_m: f64,
    pub pace_window_secs: f64,
    /// The live pace window must span at least this many meters.
    pub pace_window_min_distance_m: f64,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            split_distance_m: 1000.0,
            elevation_noise_floor_m: 3.0,
            pace_window_secs: 30.0,
            pace_window_min_distance_m: 20.0,
        }
    }
}

pub const DEFAULT_COVERAGE_PRECISION: usize = 7;

/// Top-level configuration for a [`Recorder`](crate::recorder::Recorder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Overrides the activity preset when set.
    pub filter: Option<FilterConfig>,
    /// Overrides the activity preset when set.
    pub smoother: Option<SmootherConfig>,
    pub accumulator: AccumulatorConfig,
    pub coverage_precision: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            filter: None,
            smoother: None,
            accumulator: AccumulatorConfig::default(),
            coverage_precision: DEFAULT_COVERAGE_PRECISION,
        }
    }
}

impl TrackerConfig {
    pub fn filter_for(&self, activity: ActivityType) -> FilterConfig {
        self.filter
            .unwrap_or_else(|| FilterConfig::for_activity(activity))
    }

    pub fn smoother_for(&self, activity: ActivityType) -> SmootherConfig {
        self.smoother
            .unwrap_or_else(|| SmootherConfig::for_activity(activity))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values no pipeline stage can work with: non-finite numbers,
    /// non-positive thresholds and windows, windows longer than a day, and
    /// geohash precisions outside 1..=12.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(filter) = &self.filter {
            positive("filter.accuracy_threshold", filter.accuracy_threshold)?;
            positive(
                "filter.vertical_accuracy_threshold",
                filter.vertical_accuracy_threshold,
            )?;
            window("filter.max_age_secs", filter.max_age_secs)?;
            non_negative("filter.min_displacement", filter.min_displacement)?;
            positive("filter.max_speed", filter.max_speed)?;
        }
        if let Some(smoother) = &self.smoother {
            non_negative("smoother.process_noise", smoother.process_noise)?;
            non_negative(
                "smoother.measurement_noise_floor",
                smoother.measurement_noise_floor,
            )?;
        }

        let accumulator = &self.accumulator;
        positive("accumulator.split_distance_m", accumulator.split_distance_m)?;
        non_negative(
            "accumulator.elevation_noise_floor_m",
            accumulator.elevation_noise_floor_m,
        )?;
        window("accumulator.pace_window_secs", accumulator.pace_window_secs)?;
        non_negative(
            "accumulator.pace_window_min_distance_m",
            accumulator.pace_window_min_distance_m,
        )?;

        anyhow::ensure!(
            (1..=MAX_PRECISION).contains(&self.coverage_precision),
            "coverage_precision must be between 1 and {MAX_PRECISION}, got {}",
            self.coverage_precision
        );
        Ok(())
    }

    /// Loads `WORKOUT_CONFIG` (a JSON file) when set, then applies the
    /// `WORKOUT_SPLIT_DISTANCE_M` and `WORKOUT_COVERAGE_PRECISION` overrides.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = match std::env::var("WORKOUT_CONFIG") {
            Ok(path) => Self::from_json_file(path)?,
            Err(_) => Self::default(),
        };

        if let Ok(split) = std::env::var("WORKOUT_SPLIT_DISTANCE_M") {
            config.accumulator.split_distance_m = split.parse()?;
        }
        if let Ok(precision) = std::env::var("WORKOUT_COVERAGE_PRECISION") {
            config.coverage_precision = precision.parse()?;
        }

        config.validate()?;
        Ok(config)
    }
}

const MAX_WINDOW_SECS: f64 = 86_400.0;

fn positive(name: &str, value: f64) -> anyhow::Result<()> {
    anyhow::ensure!(
        value.is_finite() && value > 0.0,
        "{name} must be a positive number, got {value}"
    );
    Ok(())
}

fn non_negative(name: &str, value: f64) -> anyhow::Result<()> {
    anyhow::ensure!(
        value.is_finite() && value >= 0.0,
        "{name} must be zero or more, got {value}"
    );
    Ok(())
}

fn window(name: &str, secs: f64) -> anyhow::Result<()> {
    positive(name, secs)?;
    anyhow::ensure!(
        secs <= MAX_WINDOW_SECS,
        "{name} must be at most {MAX_WINDOW_SECS} seconds, got {secs}"
    );
    Ok(())
}
