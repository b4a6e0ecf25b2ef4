//! Time-driven simulation of a GPS receiver following a moving athlete.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use time::macros::datetime;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use workout::distance::{haversine_distance, offset_meters};
use workout::{BoundingBox, RawFix};

use crate::config::{Region, random_point};
use crate::profiles::{self, AthleteProfile};
use crate::terrain::ElevationGenerator;

#[derive(Debug, Clone)]
pub struct TrackConfig {
    /// Ground to cover before the track ends, in meters.
    pub distance_meters: f64,
    /// Upper bound on the track's length in time, pauses included.
    pub max_duration_secs: f64,
    /// Random within `bounds` when `None`.
    pub start_point: Option<(f64, f64)>,
    pub start_time: OffsetDateTime,
    pub bounds: BoundingBox,
    /// Seconds between receiver samples.
    pub sample_interval_secs: f64,
    /// Standard deviation of horizontal position error per axis, in meters.
    pub gps_jitter_m: f64,
    pub elevation_jitter_m: f64,
    /// Range the receiver's self-reported horizontal accuracy is drawn from.
    pub accuracy_range_m: (f64, f64),
    /// Whether fixes carry the receiver's instantaneous speed.
    pub report_speed: bool,
    /// Chance per sample of the athlete stopping.
    pub pause_probability: f64,
    pub pause_duration_range: (f64, f64),
    /// Chance per sample of a degraded fix (huge accuracy radius or a position spike).
    pub outlier_probability: f64,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            distance_meters: 5000.0,
            max_duration_secs: 6.0 * 3600.0,
            start_point: None,
            start_time: datetime!(2024-06-01 07:00:00 UTC),
            bounds: Region::BOULDER,
            sample_interval_secs: 1.0,
            gps_jitter_m: 3.0,
            elevation_jitter_m: 2.0,
            accuracy_range_m: (3.0, 12.0),
            report_speed: true,
            pause_probability: 0.002,
            pause_duration_range: (30.0, 180.0),
            outlier_probability: 0.01,
        }
    }
}

/// A generated track together with the ground truth it was sampled from.
#[derive(Debug, Clone)]
pub struct GeneratedTrack {
    pub fixes: Vec<RawFix>,
    /// Distance actually covered by the simulated athlete.
    pub true_distance_m: f64,
    /// Seconds the athlete spent moving.
    pub moving_secs: f64,
    /// Stops as (start, end) instants.
    pub pauses: Vec<(OffsetDateTime, OffsetDateTime)>,
}

pub struct ProceduralGenerator {
    config: TrackConfig,
    elevation: ElevationGenerator,
}

struct Noise {
    position: Option<Normal<f64>>,
    elevation: Option<Normal<f64>>,
}

impl Noise {
    fn new(config: &TrackConfig) -> Self {
        Self {
            position: Normal::new(0.0, config.gps_jitter_m).ok(),
            elevation: Normal::new(0.0, config.elevation_jitter_m).ok(),
        }
    }

    fn position(&self, rng: &mut impl Rng) -> f64 {
        self.position.map_or(0.0, |n| n.sample(rng))
    }

    fn elevation(&self, rng: &mut impl Rng) -> f64 {
        self.elevation.map_or(0.0, |n| n.sample(rng))
    }
}

impl ProceduralGenerator {
    pub fn new(seed: u32) -> Self {
        Self {
            config: TrackConfig::default(),
            elevation: ElevationGenerator::boulder(seed),
        }
    }

    pub fn for_region(bounds: BoundingBox, seed: u32) -> Self {
        Self {
            config: TrackConfig {
                bounds,
                ..Default::default()
            },
            elevation: ElevationGenerator::for_region(&bounds, seed),
        }
    }

    pub fn with_config(mut self, config: TrackConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_distance(mut self, meters: f64) -> Self {
        self.config.distance_meters = meters;
        self
    }

    pub fn with_start(mut self, lat: f64, lon: f64) -> Self {
        self.config.start_point = Some((lat, lon));
        self
    }

    pub fn with_start_time(mut self, start_time: OffsetDateTime) -> Self {
        self.config.start_time = start_time;
        self
    }

    pub fn with_gps_jitter(mut self, meters: f64) -> Self {
        self.config.gps_jitter_m = meters;
        self
    }

    pub fn with_elevation(mut self, elevation: ElevationGenerator) -> Self {
        self.elevation = elevation;
        self
    }

    pub fn with_sample_interval(mut self, secs: f64) -> Self {
        self.config.sample_interval_secs = secs;
        self
    }

    pub fn with_pauses(mut self, probability: f64, min_sec: f64, max_sec: f64) -> Self {
        self.config.pause_probability = probability;
        self.config.pause_duration_range = (min_sec, max_sec);
        self
    }

    pub fn with_outliers(mut self, probability: f64) -> Self {
        self.config.outlier_probability = probability;
        self
    }

    pub fn config(&self) -> &TrackConfig {
        &self.config
    }

    pub fn generate_fixes(&self, profile: &dyn AthleteProfile, rng: &mut impl Rng) -> Vec<RawFix> {
        self.generate(profile, rng).fixes
    }

    /// Walks the athlete forward one sample interval at a time, emitting one
    /// fix per interval, until the distance or duration budget runs out.
    pub fn generate(&self, profile: &dyn AthleteProfile, rng: &mut impl Rng) -> GeneratedTrack {
        let config = &self.config;
        let noise = Noise::new(config);
        let dt = config.sample_interval_secs.max(0.1);
        let day_form = profiles::sample_variance(profile, rng);

        let mut position = config
            .start_point
            .unwrap_or_else(|| random_point(&config.bounds, rng));
        let mut heading = rng.gen_range(0.0..std::f64::consts::TAU);
        let mut now = config.start_time;
        let end = config.start_time + Duration::seconds_f64(config.max_duration_secs);

        let mut track = GeneratedTrack {
            fixes: Vec::new(),
            true_distance_m: 0.0,
            moving_secs: 0.0,
            pauses: Vec::new(),
        };
        let mut speed = 0.0;

        loop {
            // The first fix is never degraded.
            let degradable = !track.fixes.is_empty();
            track.fixes.push(self.observe(position, now, speed, degradable, &noise, rng));
            if track.true_distance_m >= config.distance_meters || now >= end {
                break;
            }

            if config.pause_probability > 0.0 && rng.gen_bool(config.pause_probability.min(1.0)) {
                let (min, max) = config.pause_duration_range;
                let pause_end = now + Duration::seconds_f64(rng.gen_range(min..=max.max(min)));
                let pause_start = now;
                while now + Duration::seconds_f64(dt) <= pause_end {
                    now += Duration::seconds_f64(dt);
                    track.fixes.push(self.observe(position, now, 0.0, true, &noise, rng));
                }
                track.pauses.push((pause_start, now));
            }

            heading += rng.gen_range(-0.15..0.15);
            let ahead = self.step(position, heading, 10.0);
            let grade = (self.elevation.elevation_at(ahead.0, ahead.1)
                - self.elevation.elevation_at(position.0, position.1))
                / 10.0;
            speed = profiles::speed_at_grade(profile, grade, day_form);

            let (next, bounced) = self.bounce(self.step(position, heading, speed * dt), heading);
            heading = bounced;
            track.true_distance_m += haversine_distance(position.0, position.1, next.0, next.1);
            track.moving_secs += dt;
            position = next;
            now += Duration::seconds_f64(dt);
        }

        debug!(
            fixes = track.fixes.len(),
            true_distance = track.true_distance_m,
            pauses = track.pauses.len(),
            "simulated track"
        );
        track
    }

    fn step(&self, (lat, lon): (f64, f64), heading: f64, meters: f64) -> (f64, f64) {
        offset_meters(lat, lon, meters * heading.cos(), meters * heading.sin())
    }

    /// Reflects the heading off the edges of the region, keeping the point inside.
    fn bounce(&self, (lat, lon): (f64, f64), heading: f64) -> ((f64, f64), f64) {
        let b = &self.config.bounds;
        let mut heading = heading;

        if lat < b.min_lat || lat > b.max_lat {
            heading = std::f64::consts::PI - heading;
        }
        if lon < b.min_lon || lon > b.max_lon {
            heading = -heading;
        }

        (
            (lat.clamp(b.min_lat, b.max_lat), lon.clamp(b.min_lon, b.max_lon)),
            heading,
        )
    }

    /// What the receiver reports for a true position.
    fn observe(
        &self,
        (lat, lon): (f64, f64),
        at: OffsetDateTime,
        speed: f64,
        degradable: bool,
        noise: &Noise,
        rng: &mut impl Rng,
    ) -> RawFix {
        let (min_acc, max_acc) = self.config.accuracy_range_m;
        let mut accuracy = rng.gen_range(min_acc..=max_acc.max(min_acc));
        let (mut north, mut east) = (noise.position(rng), noise.position(rng));

        if degradable
            && self.config.outlier_probability > 0.0
            && rng.gen_bool(self.config.outlier_probability.min(1.0))
        {
            if rng.gen_bool(0.5) {
                accuracy = rng.gen_range(50.0..150.0);
            } else {
                let spike = rng.gen_range(300.0..800.0);
                let direction = rng.gen_range(0.0..std::f64::consts::TAU);
                north += spike * direction.cos();
                east += spike * direction.sin();
            }
        }

        let (latitude, longitude) = offset_meters(lat, lon, north, east);
        let reported_speed = if self.config.report_speed {
            (speed + rng.gen_range(-0.2..0.2)).max(0.0)
        } else {
            -1.0
        };

        RawFix {
            latitude,
            longitude,
            altitude: self.elevation.elevation_at(lat, lon) + noise.elevation(rng),
            horizontal_accuracy: accuracy,
            vertical_accuracy: accuracy * 1.5,
            timestamp: at,
            speed: reported_speed,
        }
    }
}
