//! Regions that synthetic tracks are placed in.

use rand::Rng;
use workout::BoundingBox;

pub struct Region;

impl Region {
    /// Sierra Nevada trails with large climbs.
    pub const RENO_TAHOE: BoundingBox = BoundingBox::new(39.0, 39.6, -120.5, -119.5);

    /// Front Range foothills.
    pub const BOULDER: BoundingBox = BoundingBox::new(39.9, 40.1, -105.5, -105.2);
}

/// A uniformly random (lat, lon) inside `bounds`.
pub fn random_point(bounds: &BoundingBox, rng: &mut impl Rng) -> (f64, f64) {
    (
        rng.gen_range(bounds.min_lat..bounds.max_lat),
        rng.gen_range(bounds.min_lon..bounds.max_lon),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_random_point_inside() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let (lat, lon) = random_point(&Region::RENO_TAHOE, &mut rng);
            assert!(Region::RENO_TAHOE.contains(lat, lon));
        }
    }
}
