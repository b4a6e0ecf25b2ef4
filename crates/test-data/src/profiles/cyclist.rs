//! Road and mountain-bike riders.

use workout::ActivityType;

use super::AthleteProfile;

/// Road cyclist or mountain biker.
///
/// Gearing and momentum make grade matter much more than on foot:
/// - Flat: 8.0 m/s (about 28 km/h) on the road
/// - Climbing: 25% slower per percent of grade, never below 15% of base
/// - Descending: 15% faster per percent of grade, capped at 2.5x base
#[derive(Debug, Clone)]
pub struct CyclistProfile {
    /// Flat-ground speed in m/s.
    base_speed: f64,
    /// Coefficient of variation between days.
    variance: f64,
    /// Recorded as mountain biking instead of cycling.
    off_road: bool,
}

impl Default for CyclistProfile {
    fn default() -> Self {
        Self {
            base_speed: 8.0,
            variance: 0.10,
            off_road: false,
        }
    }
}

impl CyclistProfile {
    /// Road profile riding `speed_kmh` on the flat.
    pub fn with_speed(speed_kmh: f64) -> Self {
        Self {
            base_speed: speed_kmh / 3.6,
            ..Default::default()
        }
    }

    /// Racer holding about 35 km/h.
    pub fn elite() -> Self {
        Self::with_speed(35.0)
    }

    /// Commuter pace, about 22 km/h.
    pub fn recreational() -> Self {
        Self::with_speed(22.0)
    }

    /// Trail rider at about 18 km/h with wider day-to-day swings,
    /// recorded as mountain biking.
    pub fn mountain_biker() -> Self {
        Self {
            base_speed: 5.0,
            variance: 0.15,
            off_road: true,
        }
    }
}

impl AthleteProfile for CyclistProfile {
    fn activity_type(&self) -> ActivityType {
        if self.off_road {
            ActivityType::MountainBiking
        } else {
            ActivityType::Cycling
        }
    }

    fn base_speed_mps(&self) -> f64 {
        self.base_speed
    }

    fn grade_factor(&self, grade: f64) -> f64 {
        // Climbs hurt far more than on foot; descents are capped at 2.5x.
        if grade >= 0.0 {
            (1.0 - grade * 25.0).max(0.15)
        } else {
            (1.0 - grade * 15.0).min(2.5)
        }
    }

    fn variance(&self) -> f64 {
        self.variance
    }
}
