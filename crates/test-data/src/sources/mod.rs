//! Where synthetic and recorded fixes come from.
//!
//! - [`ProceduralGenerator`]: simulates a receiver following an athlete profile
//! - [`GpxLoader`]: reads and writes GPX files

mod gpx_files;
mod procedural;

pub use gpx_files::{GpxError, GpxLoader};
pub use procedural::{GeneratedTrack, ProceduralGenerator, TrackConfig};
