use std::collections::VecDeque;

use time::Duration;

use crate::models::SmoothedFix;

/// An incrementally computed figure over a stream of smoothed fixes.
pub trait TrackMetric {
    type Score;
    fn next_point(&mut self, point: &SmoothedFix);
    fn score(&self) -> Self::Score;
    /// Forgets the previous point so the next one starts a new stretch.
    fn break_stretch(&mut self);
}

#[derive(Debug, Clone, Default)]
pub struct DistanceMetric {
    total_distance: f64,
    last_point: Option<SmoothedFix>,
}

impl TrackMetric for DistanceMetric {
    type Score = f64;

    fn next_point(&mut self, point: &SmoothedFix) {
        self.total_distance += self
            .last_point
            .map_or(0.0, |prev| prev.distance_to(point));
        self.last_point = Some(*point);
    }

    fn score(&self) -> f64 {
        self.total_distance
    }

    fn break_stretch(&mut self) {
        self.last_point = None;
    }
}

/// Gain and loss, ignoring altitude changes within the noise floor.
///
/// The reference altitude only moves when a change is counted, so slow
/// sub-threshold drift still adds up to a counted change eventually instead
/// of being discarded step by step.
#[derive(Debug, Clone)]
pub struct ElevationMetric {
    noise_floor: f64,
    gain: f64,
    loss: f64,
    reference: Option<f64>,
}

impl ElevationMetric {
    pub fn new(noise_floor: f64) -> Self {
        Self {
            noise_floor,
            gain: 0.0,
            loss: 0.0,
            reference: None,
        }
    }
}

impl TrackMetric for ElevationMetric {
    /// (gain, loss) in meters.
    type Score = (f64, f64);

    fn next_point(&mut self, point: &SmoothedFix) {
        let Some(reference) = self.reference else {
            self.reference = Some(point.altitude);
            return;
        };

        let delta = point.altitude - reference;
        if delta.abs() > self.noise_floor {
            if delta > 0.0 {
                self.gain += delta;
            } else {
                self.loss += -delta;
            }
            self.reference = Some(point.altitude);
        }
    }

    fn score(&self) -> (f64, f64) {
        (self.gain, self.loss)
    }

    fn break_stretch(&mut self) {
        self.reference = None;
    }
}

/// Speed over a trailing time window.
///
/// Yields nothing until the window covers enough ground to be meaningful.
#[derive(Debug, Clone)]
pub struct PaceWindow {
    span: Duration,
    min_distance: f64,
    /// (fix, distance travelled since the window's first entry was recorded)
    entries: VecDeque<(SmoothedFix, f64)>,
}

impl PaceWindow {
    pub fn new(span: Duration, min_distance: f64) -> Self {
        Self {
            span,
            min_distance,
            entries: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TrackMetric for PaceWindow {
    /// Meters per second.
    type Score = Option<f64>;

    fn next_point(&mut self, point: &SmoothedFix) {
        let travelled = self
            .entries
            .back()
            .map_or(0.0, |(prev, travelled)| travelled + prev.distance_to(point));
        self.entries.push_back((*point, travelled));

        let cutoff = point.timestamp - self.span;
        while self
            .entries
            .front()
            .is_some_and(|(fix, _)| fix.timestamp < cutoff)
        {
            self.entries.pop_front();
        }
    }

    fn score(&self) -> Option<f64> {
        let ((first, first_travelled), (last, last_travelled)) =
            (self.entries.front()?, self.entries.back()?);

        let distance = last_travelled - first_travelled;
        let elapsed = (last.timestamp - first.timestamp).as_seconds_f64();
        (distance >= self.min_distance && elapsed > 0.0).then(|| distance / elapsed)
    }

    fn break_stretch(&mut self) {
        self.entries.clear();
    }
}

/// Seconds per kilometer for a speed in meters per second.
pub fn pace_from_speed(speed: f64) -> Option<f64> {
    (speed > 0.0 && speed.is_finite()).then(|| 1000.0 / speed)
}
