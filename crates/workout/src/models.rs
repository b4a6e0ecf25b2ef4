use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::distance::haversine_distance;

/// One GPS sample as delivered by the sensor layer.
///
/// A negative `speed` means the device did not report an instantaneous speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawFix {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub horizontal_accuracy: f64,
    pub vertical_accuracy: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub speed: f64,
}

impl RawFix {
    /// Great-circle distance in meters to another fix.
    pub fn distance_to(&self, other: &RawFix) -> f64 {
        haversine_distance(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// A fix whose position has been replaced by the smoother's estimate.
///
/// Accuracy, speed and timestamp are carried through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothedFix {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub horizontal_accuracy: f64,
    pub vertical_accuracy: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub speed: f64,
}

impl SmoothedFix {
    pub fn distance_to(&self, other: &SmoothedFix) -> f64 {
        haversine_distance(self.latitude, self.longitude, other.latitude, other.longitude)
    }

    /// Instantaneous speed reported by the device, if any.
    pub fn reported_speed(&self) -> Option<f64> {
        (self.speed >= 0.0 && self.speed.is_finite()).then_some(self.speed)
    }
}

impl From<RawFix> for SmoothedFix {
    fn from(fix: RawFix) -> Self {
        Self {
            latitude: fix.latitude,
            longitude: fix.longitude,
            altitude: fix.altitude,
            horizontal_accuracy: fix.horizontal_accuracy,
            vertical_accuracy: fix.vertical_accuracy,
            timestamp: fix.timestamp,
            speed: fix.speed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Running,
    Cycling,
    MountainBiking,
    Walking,
    Hiking,
    Unknown,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Running => "running",
            ActivityType::Cycling => "cycling",
            ActivityType::MountainBiking => "mountainbiking",
            ActivityType::Walking => "walking",
            ActivityType::Hiking => "hiking",
            ActivityType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "running" | "run" => Ok(ActivityType::Running),
            "cycling" | "ride" | "bike" => Ok(ActivityType::Cycling),
            "mountainbiking" | "mtb" => Ok(ActivityType::MountainBiking),
            "walking" | "walk" => Ok(ActivityType::Walking),
            "hiking" | "hike" => Ok(ActivityType::Hiking),
            "unknown" | "other" => Ok(ActivityType::Unknown),
            other => Err(format!("unknown activity type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkoutState {
    Recording,
    Paused,
    Stopped,
}

impl fmt::Display for WorkoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkoutState::Recording => "recording",
            WorkoutState::Paused => "paused",
            WorkoutState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// A span of time during which the workout was paused.
///
/// `end_time` is `None` while the pause is still open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PausedInterval {
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub end_time: Option<OffsetDateTime>,
}

impl PausedInterval {
    pub fn open(start_time: OffsetDateTime) -> Self {
        Self {
            start_time,
            end_time: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Length of the pause, measuring open intervals up to `now`.
    pub fn duration(&self, now: OffsetDateTime) -> Duration {
        self.end_time.unwrap_or(now) - self.start_time
    }
}

/// Summary of one fixed-distance segment of a workout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Split {
    /// Zero-based position of the split within the workout.
    pub index: usize,
    /// Meters covered since the previous split.
    pub distance: f64,
    /// Moving seconds since the previous split.
    pub duration: f64,
    /// Seconds per kilometer over the split.
    pub pace: f64,
    pub elevation_gain: f64,
    /// Cumulative workout distance when the split closed.
    pub end_distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkoutMetrics {
    pub state: WorkoutState,
    /// Meters.
    pub distance: f64,
    /// Seconds since the workout started, paused time included.
    pub elapsed_time: f64,
    /// Seconds spent recording.
    pub moving_time: f64,
    /// Seconds per kilometer over the live window.
    pub current_pace: Option<f64>,
    pub average_pace: f64,
    /// Meters per second.
    pub current_speed: Option<f64>,
    pub average_speed: f64,
    pub max_speed: f64,
    pub elevation_gain: f64,
    pub elevation_loss: f64,
    pub split_count: usize,
    pub sample_count: usize,
}

/// Average pace in seconds per kilometer, zero when either input is zero.
pub fn average_pace(distance_m: f64, moving_time_s: f64) -> f64 {
    if distance_m > 0.0 && moving_time_s > 0.0 {
        moving_time_s / (distance_m / 1000.0)
    } else {
        0.0
    }
}

/// Average speed in meters per second, zero when either input is zero.
pub fn average_speed(distance_m: f64, moving_time_s: f64) -> f64 {
    if distance_m > 0.0 && moving_time_s > 0.0 {
        distance_m / moving_time_s
    } else {
        0.0
    }
}

/// Finished workout handed to the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySnapshot {
    pub id: Uuid,
    pub activity_type: ActivityType,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_date: OffsetDateTime,
    pub distance: f64,
    /// Seconds from start to stop, paused time included.
    pub duration: f64,
    pub moving_time: f64,
    pub elevation_gain: f64,
    pub elevation_loss: f64,
    pub average_pace: f64,
    pub locations: Vec<SmoothedFix>,
    pub splits: Vec<Split>,
    pub paused_intervals: Vec<PausedInterval>,
}
