//! Athletic profiles that drive simulated movement.
//!
//! A profile sets how fast a simulated athlete moves over terrain. The
//! procedural source turns that speed into sensor samples.

mod cyclist;
mod hiker;
mod runner;
mod stationary;

pub use cyclist::CyclistProfile;
pub use hiker::HikerProfile;
pub use runner::RunnerProfile;
pub use stationary::StationaryProfile;

use rand_distr::{Distribution, Normal};
use workout::ActivityType;

pub trait AthleteProfile: Send + Sync {
    /// Activity the generated track should be recorded as.
    fn activity_type(&self) -> ActivityType;

    /// Base speed on flat terrain in meters per second.
    fn base_speed_mps(&self) -> f64;

    /// Speed multiplier for a grade expressed as a fraction (0.05 = 5%).
    ///
    /// Below 1.0 is slower than base (uphill), above is faster (downhill).
    fn grade_factor(&self, grade: f64) -> f64;

    /// Day-to-day variation as a coefficient of variation.
    fn variance(&self) -> f64;
}

/// Looks up a profile by activity name ("run", "ride", "mtb", "hike", "stationary", ...).
pub fn by_name(name: &str) -> Option<Box<dyn AthleteProfile>> {
    if name.eq_ignore_ascii_case("stationary") {
        return Some(Box::new(StationaryProfile::default()));
    }
    let profile: Box<dyn AthleteProfile> = match name.parse::<ActivityType>().ok()? {
        ActivityType::Running => Box::new(RunnerProfile::default()),
        ActivityType::Cycling => Box::new(CyclistProfile::default()),
        ActivityType::MountainBiking => Box::new(CyclistProfile::mountain_biker()),
        ActivityType::Walking => Box::new(HikerProfile::leisurely()),
        ActivityType::Hiking => Box::new(HikerProfile::default()),
        ActivityType::Unknown => return None,
    };
    Some(profile)
}

/// Speed in m/s at `grade`, scaled by a sampled variance factor.
pub fn speed_at_grade(profile: &dyn AthleteProfile, grade: f64, variance_factor: f64) -> f64 {
    let target = profile.base_speed_mps() * profile.grade_factor(grade);
    // Floor keeps every step moving forward.
    (target * variance_factor).max(0.1)
}

/// Samples a multiplier around 1.0 from the profile's variance.
pub fn sample_variance(profile: &dyn AthleteProfile, rng: &mut impl rand::Rng) -> f64 {
    match Normal::new(1.0, profile.variance()) {
        Ok(normal) if profile.variance() > 0.0 => normal.sample(rng).clamp(0.7, 1.4),
        _ => 1.0,
    }
}
