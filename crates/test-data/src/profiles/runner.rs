//! Road and trail runners.

use workout::ActivityType;

use super::AthleteProfile;

/// Road or trail runner.
///
/// - Flat: 3.5 m/s, a little under 5:00/km
/// - Climbing: 15% slower per percent of grade, never below a fifth of base
/// - Descending: 8% faster per percent of grade, capped at 1.5x base
#[derive(Debug, Clone)]
pub struct RunnerProfile {
    /// Flat-ground speed in m/s.
    base_speed: f64,
    /// Coefficient of variation between days.
    variance: f64,
}

impl Default for RunnerProfile {
    fn default() -> Self {
        Self {
            base_speed: 3.5,
            variance: 0.08,
        }
    }
}

impl RunnerProfile {
    /// Runner holding `pace_min_per_km` minutes per kilometer on the flat.
    ///
    /// `with_pace(5.0)` is 3.33 m/s.
    pub fn with_pace(pace_min_per_km: f64) -> Self {
        Self {
            base_speed: 1000.0 / (pace_min_per_km * 60.0),
            ..Default::default()
        }
    }

    /// Competitive runner at 3:30/km.
    pub fn elite() -> Self {
        Self::with_pace(3.5)
    }

    /// Easy jogging pace of 6:00/km.
    pub fn recreational() -> Self {
        Self::with_pace(6.0)
    }
}

impl AthleteProfile for RunnerProfile {
    fn activity_type(&self) -> ActivityType {
        ActivityType::Running
    }

    fn base_speed_mps(&self) -> f64 {
        self.base_speed
    }

    fn grade_factor(&self, grade: f64) -> f64 {
        // 15% slower per percent of climb, 8% faster per percent of descent.
        if grade >= 0.0 {
            (1.0 - grade * 15.0).max(0.2)
        } else {
            (1.0 - grade * 8.0).min(1.5)
        }
    }

    fn variance(&self) -> f64 {
        self.variance
    }
}
