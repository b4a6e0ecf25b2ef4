//! Conversion between GPX files and raw receiver fixes.

use std::io::{BufReader, Cursor, Read, Write};
use std::path::Path;

use geo::Point;
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint, read};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;
use workout::RawFix;

/// Meters of horizontal error per unit of dilution of precision.
const METERS_PER_DOP: f64 = 5.0;
/// Accuracy assumed for points that carry no dilution of precision.
const DEFAULT_ACCURACY_M: f64 = 10.0;

#[derive(Debug, Error)]
pub enum GpxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("GPX parse error: {0}")]
    Parse(#[from] gpx::errors::GpxError),
    #[error("No tracks found in GPX file")]
    NoTracks,
    #[error("No track points found")]
    NoPoints,
    #[error("Track point {0} has no timestamp")]
    MissingTime(usize),
}

/// Loads and writes GPS tracks as GPX 1.1.
pub struct GpxLoader;

impl GpxLoader {
    /// Loads every point of every track and segment as one flat list of fixes.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Vec<RawFix>, GpxError> {
        let file = std::fs::File::open(path)?;
        Self::load_reader(BufReader::new(file))
    }

    pub fn load_bytes(data: &[u8]) -> Result<Vec<RawFix>, GpxError> {
        Self::load_reader(Cursor::new(data))
    }

    fn load_reader(reader: impl Read) -> Result<Vec<RawFix>, GpxError> {
        let gpx: Gpx = read(reader)?;
        Self::extract_fixes(&gpx)
    }

    fn extract_fixes(gpx: &Gpx) -> Result<Vec<RawFix>, GpxError> {
        if gpx.tracks.is_empty() {
            return Err(GpxError::NoTracks);
        }

        let waypoints = gpx
            .tracks
            .iter()
            .flat_map(|track| &track.segments)
            .flat_map(|segment| &segment.points);

        let mut fixes = Vec::new();
        for (index, waypoint) in waypoints.enumerate() {
            let timestamp = waypoint
                .time
                .map(OffsetDateTime::from)
                .ok_or(GpxError::MissingTime(index))?;
            let point = waypoint.point();
            let horizontal_accuracy = waypoint
                .hdop
                .map_or(DEFAULT_ACCURACY_M, |hdop| hdop * METERS_PER_DOP);

            fixes.push(RawFix {
                latitude: point.y(),
                longitude: point.x(),
                altitude: waypoint.elevation.unwrap_or(0.0),
                horizontal_accuracy,
                vertical_accuracy: waypoint
                    .vdop
                    .map_or(horizontal_accuracy * 1.5, |vdop| vdop * METERS_PER_DOP),
                timestamp,
                speed: waypoint.speed.unwrap_or(-1.0),
            });
        }

        if fixes.is_empty() {
            return Err(GpxError::NoPoints);
        }
        debug!(fixes = fixes.len(), tracks = gpx.tracks.len(), "loaded GPX");

        Ok(fixes)
    }

    /// Writes fixes as a single-segment track.
    ///
    /// GPX times are whole seconds, so sub-second parts are dropped.
    pub fn write_file(
        path: impl AsRef<Path>,
        fixes: &[RawFix],
        name: Option<&str>,
    ) -> Result<(), GpxError> {
        let file = std::fs::File::create(path)?;
        Self::write(file, fixes, name)
    }

    pub fn to_bytes(fixes: &[RawFix], name: Option<&str>) -> Result<Vec<u8>, GpxError> {
        let mut buffer = Vec::new();
        Self::write(&mut buffer, fixes, name)?;
        Ok(buffer)
    }

    fn write(writer: impl Write, fixes: &[RawFix], name: Option<&str>) -> Result<(), GpxError> {
        let waypoints: Vec<Waypoint> = fixes
            .iter()
            .map(|fix| {
                let mut wp = Waypoint::new(Point::new(fix.longitude, fix.latitude));
                wp.elevation = Some(fix.altitude);
                wp.hdop = Some(fix.horizontal_accuracy / METERS_PER_DOP);
                wp.vdop = Some(fix.vertical_accuracy / METERS_PER_DOP);
                if fix.speed >= 0.0 {
                    wp.speed = Some(fix.speed);
                }
                wp.time = OffsetDateTime::from_unix_timestamp(fix.timestamp.unix_timestamp())
                    .ok()
                    .map(gpx::Time::from);
                wp
            })
            .collect();

        let mut track = Track::new();
        track.name = name.map(String::from);
        track.segments = vec![TrackSegment { points: waypoints }];

        let gpx = Gpx {
            version: GpxVersion::Gpx11,
            tracks: vec![track],
            ..Default::default()
        };

        gpx::write(&gpx, writer)?;
        Ok(())
    }
}
