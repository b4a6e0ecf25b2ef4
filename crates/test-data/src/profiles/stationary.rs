//! Standing still with the receiver wandering around the true position.

use workout::ActivityType;

use super::AthleteProfile;

/// Near-zero movement with high variance.
///
/// Useful for exercising the admission filter's displacement gate: almost
/// every step is smaller than the receiver's own jitter.
#[derive(Debug, Clone)]
pub struct StationaryProfile {
    drift_speed: f64,
    variance: f64,
}

impl Default for StationaryProfile {
    fn default() -> Self {
        Self {
            drift_speed: 0.2,
            variance: 0.5,
        }
    }
}

impl AthleteProfile for StationaryProfile {
    fn activity_type(&self) -> ActivityType {
        ActivityType::Unknown
    }

    fn base_speed_mps(&self) -> f64 {
        self.drift_speed
    }

    fn grade_factor(&self, _grade: f64) -> f64 {
        1.0
    }

    fn variance(&self) -> f64 {
        self.variance
    }
}
