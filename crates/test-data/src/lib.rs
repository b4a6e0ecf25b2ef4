//! Synthetic GPS tracks for exercising the workout pipeline.
//!
//! Tracks are simulated one receiver sample at a time: an athlete profile
//! sets the speed over procedurally generated terrain, and the receiver
//! model adds position jitter, degraded fixes and stops.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_data::prelude::*;
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let track = ProceduralGenerator::for_region(Region::RENO_TAHOE, 7)
//!     .with_distance(5000.0)
//!     .generate(&RunnerProfile::default(), &mut rng);
//! let report = workout::replay::replay(&track.fixes, ActivityType::Running, Default::default())?;
//! ```

pub mod config;
pub mod profiles;
pub mod sources;
pub mod terrain;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::config::{Region, random_point};
    pub use crate::profiles::{
        AthleteProfile, CyclistProfile, HikerProfile, RunnerProfile, StationaryProfile,
        sample_variance, speed_at_grade,
    };
    pub use crate::sources::{GeneratedTrack, GpxLoader, ProceduralGenerator, TrackConfig};
    pub use crate::terrain::ElevationGenerator;
    pub use rand::SeedableRng;
    pub use rand::rngs::StdRng;
    pub use workout::{ActivityType, BoundingBox, RawFix};
}
