//! Walkers and hikers.

use workout::ActivityType;

use super::AthleteProfile;

/// Walker or hiker.
///
/// - Flat: 1.5 m/s (about 5.4 km/h)
/// - Climbing: 12% slower per percent of grade, never below a quarter of base
/// - Descending: 5% faster per percent of grade, capped at 1.3x base
#[derive(Debug, Clone)]
pub struct HikerProfile {
    /// Flat-ground speed in m/s.
    base_speed: f64,
    /// Coefficient of variation between days.
    variance: f64,
    /// Hiking by default; walking for [`HikerProfile::leisurely`].
    activity_type: ActivityType,
}

impl Default for HikerProfile {
    fn default() -> Self {
        Self {
            base_speed: 1.5,
            variance: 0.12,
            activity_type: ActivityType::Hiking,
        }
    }
}

impl HikerProfile {
    /// Hiker covering `speed_kmh` on the flat.
    pub fn with_speed(speed_kmh: f64) -> Self {
        Self {
            base_speed: speed_kmh / 3.6,
            ..Default::default()
        }
    }

    /// Fit hiker moving at 6.5 km/h.
    pub fn fast() -> Self {
        Self::with_speed(6.5)
    }

    /// A stroll, recorded as a walk rather than a hike.
    pub fn leisurely() -> Self {
        Self {
            activity_type: ActivityType::Walking,
            ..Self::with_speed(4.0)
        }
    }

    /// Carrying a full pack: slower, and less consistent from day to day.
    pub fn backpacker() -> Self {
        Self {
            base_speed: 1.2,
            variance: 0.15,
            ..Default::default()
        }
    }
}

impl AthleteProfile for HikerProfile {
    fn activity_type(&self) -> ActivityType {
        self.activity_type
    }

    fn base_speed_mps(&self) -> f64 {
        self.base_speed
    }

    fn grade_factor(&self, grade: f64) -> f64 {
        // Descents stay cautious on technical ground.
        if grade >= 0.0 {
            (1.0 - grade * 12.0).max(0.25)
        } else {
            (1.0 - grade * 5.0).min(1.3)
        }
    }

    fn variance(&self) -> f64 {
        self.variance
    }
}
