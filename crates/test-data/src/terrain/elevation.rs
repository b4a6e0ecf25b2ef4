//! Perlin-noise elevation.

use noise::{NoiseFn, Perlin};
use workout::BoundingBox;

use crate::config::Region;

/// Deterministic terrain height from fractal Perlin noise.
///
/// Several octaves are summed, each at double the frequency and half the
/// amplitude of the last, then scaled around a base elevation.
#[derive(Debug, Clone)]
pub struct ElevationGenerator {
    perlin: Perlin,
    base_elevation: f64,
    /// Maximum departure from the base, in meters.
    height_scale: f64,
    frequency: f64,
    octaves: u32,
}

impl ElevationGenerator {
    /// Generic hilly terrain around 1500 m. The same seed always yields
    /// the same heights.
    pub fn new(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
            base_elevation: 1500.0,
            height_scale: 500.0,
            frequency: 0.0001,
            octaves: 4,
        }
    }

    /// High Sierra terrain: base 1900 m, up to 800 m of relief and one
    /// extra octave of detail.
    pub fn reno_tahoe(seed: u32) -> Self {
        Self {
            base_elevation: 1900.0,
            height_scale: 800.0,
            frequency: 0.00008,
            octaves: 5,
            ..Self::new(seed)
        }
    }

    /// Front Range foothills around 1650 m.
    pub fn boulder(seed: u32) -> Self {
        Self {
            base_elevation: 1650.0,
            height_scale: 600.0,
            ..Self::new(seed)
        }
    }

    /// Gentle rolling hills near 300 m with at most 50 m of relief.
    pub fn flat(seed: u32) -> Self {
        Self {
            base_elevation: 300.0,
            height_scale: 50.0,
            frequency: 0.0002,
            octaves: 2,
            ..Self::new(seed)
        }
    }

    /// Terrain matching one of the predefined [`Region`]s, generic terrain elsewhere.
    pub fn for_region(bounds: &BoundingBox, seed: u32) -> Self {
        let (lat, lon) = bounds.center();
        if Region::RENO_TAHOE.contains(lat, lon) {
            Self::reno_tahoe(seed)
        } else if Region::BOULDER.contains(lat, lon) {
            Self::boulder(seed)
        } else {
            Self::new(seed)
        }
    }

    /// Moves the whole surface so it is centred on `elevation` meters.
    pub fn with_base_elevation(mut self, elevation: f64) -> Self {
        self.base_elevation = elevation;
        self
    }

    /// Sets how far, in meters, the surface may rise above or fall below
    /// the base.
    pub fn with_height_scale(mut self, scale: f64) -> Self {
        self.height_scale = scale;
        self
    }

    /// Height in meters at a coordinate, always within `height_scale` of the
    /// base elevation.
    pub fn elevation_at(&self, lat: f64, lon: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = self.frequency;
        let mut max_amplitude = 0.0;

        // Each octave: double the frequency, half the amplitude.
        for _ in 0..self.octaves {
            total += self.perlin.get([lat * frequency, lon * frequency]) * amplitude;
            max_amplitude += amplitude;
            amplitude *= 0.5;
            frequency *= 2.0;
        }

        // Normalised back to [-1, 1] before scaling.
        self.base_elevation + (total / max_amplitude) * self.height_scale
    }

    /// Heights along a path, one per coordinate.
    pub fn elevation_profile(&self, coords: &[(f64, f64)]) -> Vec<f64> {
        coords
            .iter()
            .map(|&(lat, lon)| self.elevation_at(lat, lon))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elevation_is_deterministic() {
        let terrain = ElevationGenerator::new(42);
        assert_eq!(terrain.elevation_at(39.5, -119.8), terrain.elevation_at(39.5, -119.8));
    }

    #[test]
    fn test_elevation_range() {
        let terrain = ElevationGenerator::flat(42);
        for (lat, lon) in [(39.5, -119.8), (40.0, -105.3), (-33.9, 151.2)] {
            let elevation = terrain.elevation_at(lat, lon);
            assert!((250.0..=350.0).contains(&elevation), "{elevation}");
        }
    }

    #[test]
    fn test_region_selection() {
        let tahoe = ElevationGenerator::for_region(&Region::RENO_TAHOE, 1);
        assert_eq!(tahoe.base_elevation, 1900.0);
        let boulder = ElevationGenerator::for_region(&Region::BOULDER, 1);
        assert_eq!(boulder.base_elevation, 1650.0);
    }

    #[test]
    fn test_profile_generation() {
        let terrain = ElevationGenerator::boulder(42)
            .with_base_elevation(1000.0)
            .with_height_scale(10.0);
        let profile = terrain.elevation_profile(&[(40.0, -105.3), (40.01, -105.29), (40.02, -105.28)]);
        assert_eq!(profile.len(), 3);
        assert!(profile.iter().all(|e| (990.0..=1010.0).contains(e)));
    }
}
