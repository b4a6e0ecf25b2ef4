//! Scalar Kalman smoothing applied independently to latitude, longitude
//! and altitude. No cross-axis covariance is modelled.

use tracing::debug;

use crate::config::SmootherConfig;
use crate::models::{ActivityType, RawFix, SmoothedFix};

/// Estimate and error covariance for one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisState {
    pub estimate: f64,
    pub error_covariance: f64,
}

impl AxisState {
    fn new(measurement: f64, accuracy: f64) -> Self {
        Self {
            estimate: measurement,
            error_covariance: accuracy,
        }
    }

    /// One predict/update step. Returns the gain that was applied.
    fn update(&mut self, measurement: f64, measurement_variance: f64, process_noise: f64) -> f64 {
        let predicted = self.error_covariance + process_noise;
        let gain = predicted / (predicted + measurement_variance);
        self.estimate += gain * (measurement - self.estimate);
        self.error_covariance = (1.0 - gain) * predicted;
        gain
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmootherState {
    pub latitude: AxisState,
    pub longitude: AxisState,
    pub altitude: AxisState,
}

#[derive(Debug, Clone)]
pub struct KalmanSmoother {
    config: SmootherConfig,
    state: Option<SmootherState>,
}

impl KalmanSmoother {
    pub fn new(config: SmootherConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }

    pub fn for_activity(activity: ActivityType) -> Self {
        Self::new(SmootherConfig::for_activity(activity))
    }

    pub fn config(&self) -> &SmootherConfig {
        &self.config
    }

    /// Current per-axis state, `None` until the first fix arrives.
    pub fn state(&self) -> Option<&SmootherState> {
        self.state.as_ref()
    }

    /// Squared accuracy, floored so a single over-confident fix cannot pin the estimate.
    fn measurement_variance(&self, accuracy: f64) -> f64 {
        (accuracy * accuracy).max(self.config.measurement_noise_floor)
    }

    pub fn smooth(&mut self, fix: &RawFix) -> SmoothedFix {
        if !self.config.enabled {
            return SmoothedFix::from(*fix);
        }

        let horizontal = self.measurement_variance(fix.horizontal_accuracy);
        let vertical = if fix.vertical_accuracy > 0.0 {
            self.measurement_variance(fix.vertical_accuracy)
        } else {
            horizontal
        };

        let Some(state) = &mut self.state else {
            // Covariance starts at the reported accuracy itself.
            let vertical_accuracy = if fix.vertical_accuracy > 0.0 {
                fix.vertical_accuracy
            } else {
                fix.horizontal_accuracy
            };
            self.state = Some(SmootherState {
                latitude: AxisState::new(fix.latitude, fix.horizontal_accuracy),
                longitude: AxisState::new(fix.longitude, fix.horizontal_accuracy),
                altitude: AxisState::new(fix.altitude, vertical_accuracy),
            });
            return SmoothedFix::from(*fix);
        };

        let q = self.config.process_noise;
        let gain = state.latitude.update(fix.latitude, horizontal, q);
        state.longitude.update(fix.longitude, horizontal, q);
        state.altitude.update(fix.altitude, vertical, q);

        debug!(
            gain,
            covariance = state.latitude.error_covariance,
            "smoothed fix"
        );

        SmoothedFix {
            latitude: state.latitude.estimate,
            longitude: state.longitude.estimate,
            altitude: state.altitude.estimate,
            ..SmoothedFix::from(*fix)
        }
    }

    pub fn reset(&mut self) {
        self.state = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;
    use time::macros::datetime;

    fn fix(latitude: f64, longitude: f64, altitude: f64, secs: i64) -> RawFix {
        RawFix {
            latitude,
            longitude,
            altitude,
            horizontal_accuracy: 5.0,
            vertical_accuracy: 10.0,
            timestamp: datetime!(2024-06-01 08:00:00 UTC) + Duration::seconds(secs),
            speed: 3.0,
        }
    }

    #[test]
    fn test_first_fix_passes_through() {
        let mut smoother = KalmanSmoother::for_activity(ActivityType::Running);
        let raw = fix(40.0, -105.3, 1650.0, 0);

        let smoothed = smoother.smooth(&raw);
        assert_eq!(smoothed, SmoothedFix::from(raw));

        let state = smoother.state().unwrap();
        assert_eq!(state.latitude.estimate, 40.0);
        assert_eq!(state.latitude.error_covariance, 5.0);
        assert_eq!(state.longitude.error_covariance, 5.0);
        assert_eq!(state.altitude.error_covariance, 10.0);
    }

    #[test]
    fn test_first_update_gain_from_reported_accuracy() {
        let mut smoother = KalmanSmoother::for_activity(ActivityType::Running);
        smoother.smooth(&fix(40.0, -105.3, 1650.0, 0));
        let smoothed = smoother.smooth(&fix(40.001, -105.3, 1650.0, 1));

        // (5 + 1.5) / (5 + 1.5 + 5^2)
        let gain = 6.5 / 31.5;
        assert!((smoothed.latitude - (40.0 + gain * 0.001)).abs() < 1e-12);
        let covariance = smoother.state().unwrap().latitude.error_covariance;
        assert!((covariance - (1.0 - gain) * 6.5).abs() < 1e-12);
    }

    #[test]
    fn test_missing_vertical_accuracy_uses_horizontal() {
        let mut smoother = KalmanSmoother::for_activity(ActivityType::Hiking);
        let mut raw = fix(40.0, -105.3, 1650.0, 0);
        raw.vertical_accuracy = -1.0;
        smoother.smooth(&raw);

        assert_eq!(smoother.state().unwrap().altitude.error_covariance, 5.0);
    }

    #[test]
    fn test_estimate_moves_part_way_toward_measurement() {
        let mut smoother = KalmanSmoother::for_activity(ActivityType::Running);
        smoother.smooth(&fix(40.0, -105.3, 1650.0, 0));
        let smoothed = smoother.smooth(&fix(40.001, -105.3, 1660.0, 1));

        assert!(smoothed.latitude > 40.0 && smoothed.latitude < 40.001);
        assert!(smoothed.altitude > 1650.0 && smoothed.altitude < 1660.0);
        assert_eq!(smoothed.longitude, -105.3);
    }

    #[test]
    fn test_pass_through_fields_unchanged() {
        let mut smoother = KalmanSmoother::for_activity(ActivityType::Cycling);
        smoother.smooth(&fix(40.0, -105.3, 1650.0, 0));
        let raw = fix(40.0002, -105.3001, 1651.0, 1);
        let smoothed = smoother.smooth(&raw);

        assert_eq!(smoothed.timestamp, raw.timestamp);
        assert_eq!(smoothed.speed, raw.speed);
        assert_eq!(smoothed.horizontal_accuracy, raw.horizontal_accuracy);
        assert_eq!(smoothed.vertical_accuracy, raw.vertical_accuracy);
    }

    #[test]
    fn test_covariance_never_increases_on_repeated_measurements() {
        let mut smoother = KalmanSmoother::for_activity(ActivityType::Walking);
        let mut previous = f64::INFINITY;

        for i in 0..200 {
            let noise = if i % 2 == 0 { 0.00005 } else { -0.00005 };
            smoother.smooth(&fix(40.0 + noise, -105.3, 1650.0, i));
            let covariance = smoother.state().unwrap().latitude.error_covariance;
            assert!(
                covariance <= previous + 1e-12,
                "covariance grew at step {i}: {previous} -> {covariance}"
            );
            previous = covariance;
        }
    }

    #[test]
    fn test_converges_without_process_noise() {
        let mut smoother = KalmanSmoother::new(SmootherConfig {
            enabled: true,
            process_noise: 0.0,
            measurement_noise_floor: 9.0,
        });

        let truth = 40.0;
        let mut smoothed = None;
        for i in 0..1000 {
            let noise = if i % 2 == 0 { 0.0002 } else { -0.0002 };
            smoothed = Some(smoother.smooth(&fix(truth + noise, -105.3, 1650.0, i)));
        }

        let error = (smoothed.unwrap().latitude - truth).abs();
        assert!(error < 1e-6, "error {error}");
    }

    #[test]
    fn test_reduces_jitter_with_preset() {
        let mut smoother = KalmanSmoother::for_activity(ActivityType::Running);
        let truth = 40.0;
        let mut raw_error = 0.0;
        let mut smoothed_error = 0.0;

        for i in 0..400 {
            // Deterministic pseudo-noise spanning roughly +-10 m.
            let noise = ((i * 7919) % 200) as f64 / 100.0 - 1.0;
            let measured = truth + noise * 0.0001;
            let smoothed = smoother.smooth(&fix(measured, -105.3, 1650.0, i));
            if i >= 100 {
                raw_error += (measured - truth).abs();
                smoothed_error += (smoothed.latitude - truth).abs();
            }
        }

        assert!(
            smoothed_error < raw_error * 0.6,
            "smoothed {smoothed_error} vs raw {raw_error}"
        );
    }

    #[test]
    fn test_disabled_is_identity() {
        let mut smoother = KalmanSmoother::new(SmootherConfig::disabled());
        smoother.smooth(&fix(40.0, -105.3, 1650.0, 0));
        let raw = fix(40.01, -105.31, 1700.0, 1);

        assert_eq!(smoother.smooth(&raw), SmoothedFix::from(raw));
        assert!(smoother.state().is_none());
    }

    #[test]
    fn test_reset_discards_state() {
        let mut smoother = KalmanSmoother::for_activity(ActivityType::Running);
        smoother.smooth(&fix(40.0, -105.3, 1650.0, 0));
        smoother.reset();
        assert!(smoother.state().is_none());

        let raw = fix(41.0, -106.0, 1000.0, 5);
        assert_eq!(smoother.smooth(&raw), SmoothedFix::from(raw));
    }
}
