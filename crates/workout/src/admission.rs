//! Gate that decides whether a raw fix is trustworthy enough to use.
//!
//! Checks run in a fixed order and stop at the first failure:
//! horizontal accuracy, age, displacement since the last accepted fix,
//! then implied speed. Only accepted fixes become the reference for the
//! displacement and speed checks.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;

use crate::config::FilterConfig;
use crate::models::{ActivityType, RawFix};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RejectionReason {
    /// Reported horizontal accuracy in meters.
    PoorAccuracy(f64),
    /// Age of the fix in seconds.
    StaleLocation(f64),
    /// Meters moved since the last accepted fix.
    InsufficientDisplacement(f64),
    /// Implied speed in meters per second.
    ImpossibleSpeed(f64),
}

impl RejectionReason {
    pub fn kind(&self) -> &'static str {
        match self {
            RejectionReason::PoorAccuracy(_) => "poor_accuracy",
            RejectionReason::StaleLocation(_) => "stale_location",
            RejectionReason::InsufficientDisplacement(_) => "insufficient_displacement",
            RejectionReason::ImpossibleSpeed(_) => "impossible_speed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum FilterVerdict {
    Accepted,
    Rejected(RejectionReason),
}

impl FilterVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, FilterVerdict::Accepted)
    }

    pub fn rejection(&self) -> Option<RejectionReason> {
        match self {
            FilterVerdict::Accepted => None,
            FilterVerdict::Rejected(reason) => Some(*reason),
        }
    }
}

/// Running tallies; every field only grows until [`AdmissionFilter::reset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStatistics {
    pub total: u64,
    pub accepted: u64,
    pub rejected_by_accuracy: u64,
    pub rejected_by_age: u64,
    pub rejected_by_displacement: u64,
    pub rejected_by_speed: u64,
    /// Fixes whose vertical accuracy was out of bounds, whatever their verdict.
    pub vertical_accuracy_breaches: u64,
}

impl FilterStatistics {
    pub fn rejected(&self) -> u64 {
        self.rejected_by_accuracy
            + self.rejected_by_age
            + self.rejected_by_displacement
            + self.rejected_by_speed
    }

    /// Fraction of fixes accepted so far, 1.0 before any fix arrives.
    pub fn acceptance_rate(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.accepted as f64 / self.total as f64
        }
    }

    fn record(&mut self, verdict: &FilterVerdict) {
        match verdict {
            FilterVerdict::Accepted => self.accepted += 1,
            FilterVerdict::Rejected(RejectionReason::PoorAccuracy(_)) => {
                self.rejected_by_accuracy += 1
            }
            FilterVerdict::Rejected(RejectionReason::StaleLocation(_)) => {
                self.rejected_by_age += 1
            }
            FilterVerdict::Rejected(RejectionReason::InsufficientDisplacement(_)) => {
                self.rejected_by_displacement += 1
            }
            FilterVerdict::Rejected(RejectionReason::ImpossibleSpeed(_)) => {
                self.rejected_by_speed += 1
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdmissionFilter {
    config: FilterConfig,
    last_accepted: Option<RawFix>,
    stats: FilterStatistics,
}

impl AdmissionFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            last_accepted: None,
            stats: FilterStatistics::default(),
        }
    }

    pub fn for_activity(activity: ActivityType) -> Self {
        Self::new(FilterConfig::for_activity(activity))
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn statistics(&self) -> FilterStatistics {
        self.stats
    }

    pub fn last_accepted(&self) -> Option<&RawFix> {
        self.last_accepted.as_ref()
    }

    /// Judges `fix` against the thresholds, with `now` as the reference
    /// instant for the age check. Counters move on every call.
    pub fn should_accept(&mut self, fix: &RawFix, now: OffsetDateTime) -> FilterVerdict {
        self.stats.total += 1;

        let verdict = self.evaluate(fix, now);
        self.stats.record(&verdict);

        match verdict {
            FilterVerdict::Accepted => {
                self.last_accepted = Some(*fix);
            }
            FilterVerdict::Rejected(reason) => {
                debug!(
                    reason = reason.kind(),
                    lat = fix.latitude,
                    lon = fix.longitude,
                    "rejected fix"
                );
            }
        }

        verdict
    }

    fn evaluate(&mut self, fix: &RawFix, now: OffsetDateTime) -> FilterVerdict {
        let accuracy = fix.horizontal_accuracy;
        if !(accuracy > 0.0 && accuracy <= self.config.accuracy_threshold) {
            return FilterVerdict::Rejected(RejectionReason::PoorAccuracy(accuracy));
        }

        if !(fix.vertical_accuracy >= 0.0
            && fix.vertical_accuracy <= self.config.vertical_accuracy_threshold)
        {
            self.stats.vertical_accuracy_breaches += 1;
        }

        let age = (now - fix.timestamp).abs();
        if age > self.config.max_age() {
            return FilterVerdict::Rejected(RejectionReason::StaleLocation(
                age.as_seconds_f64(),
            ));
        }

        let Some(previous) = &self.last_accepted else {
            return FilterVerdict::Accepted;
        };

        let distance = previous.distance_to(fix);
        if distance < self.config.min_displacement {
            return FilterVerdict::Rejected(RejectionReason::InsufficientDisplacement(distance));
        }

        let elapsed = (fix.timestamp - previous.timestamp).as_seconds_f64();
        let speed = if distance == 0.0 {
            0.0
        } else if elapsed > 0.0 {
            distance / elapsed
        } else {
            f64::INFINITY
        };
        if speed > self.config.max_speed {
            return FilterVerdict::Rejected(RejectionReason::ImpossibleSpeed(speed));
        }

        FilterVerdict::Accepted
    }

    /// Forgets the last accepted fix and zeroes every counter.
    pub fn reset(&mut self) {
        self.last_accepted = None;
        self.stats = FilterStatistics::default();
    }
}
