//! Geohash encoding, decoding and neighbour arithmetic.
//!
//! A geohash alternates longitude and latitude bisections, starting with
//! longitude, and packs five bits into each base-32 character. Cells are
//! half-open: a value exactly on a midpoint falls into the upper half.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::GeohashError;

pub const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";
pub const MAX_PRECISION: usize = 12;
/// Upper bound on the number of cells [`geohashes_in_bounding_box`] will enumerate.
pub const MAX_BOUNDING_BOX_CELLS: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub const fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    /// Inclusive on every edge.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }

    /// Latitude span in degrees.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Longitude span in degrees.
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Top,
    Bottom,
    Left,
    Right,
}

impl Direction {
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Top => Direction::Bottom,
            Direction::Bottom => Direction::Top,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Replacement characters, indexed by the position of the last character in BASE32.
    /// First entry is for even-length hashes, second for odd.
    fn neighbor_table(&self) -> [&'static [u8; 32]; 2] {
        match self {
            Direction::Top => [
                b"p0r21436x8zb9dcf5h7kjnmqesgutwvy",
                b"bc01fg45238967deuvhjyznpkmstqrwx",
            ],
            Direction::Bottom => [
                b"14365h7k9dcfesgujnmqp0r2twvyx8zb",
                b"238967debc01fg45kmstqrwxuvhjyznp",
            ],
            Direction::Right => [
                b"bc01fg45238967deuvhjyznpkmstqrwx",
                b"p0r21436x8zb9dcf5h7kjnmqesgutwvy",
            ],
            Direction::Left => [
                b"238967debc01fg45kmstqrwxuvhjyznp",
                b"14365h7k9dcfesgujnmqp0r2twvyx8zb",
            ],
        }
    }

    /// Characters on the edge of the parent cell in this direction.
    fn border_table(&self) -> [&'static [u8]; 2] {
        match self {
            Direction::Top => [b"prxz", b"bcfguvyz"],
            Direction::Bottom => [b"028b", b"0145hjnp"],
            Direction::Right => [b"bcfguvyz", b"prxz"],
            Direction::Left => [b"0145hjnp", b"028b"],
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Top => "top",
            Direction::Bottom => "bottom",
            Direction::Left => "left",
            Direction::Right => "right",
        };
        f.write_str(name)
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "top" | "n" | "north" => Ok(Direction::Top),
            "bottom" | "s" | "south" => Ok(Direction::Bottom),
            "left" | "w" | "west" => Ok(Direction::Left),
            "right" | "e" | "east" => Ok(Direction::Right),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

fn check_precision(precision: usize) -> Result<(), GeohashError> {
    if (1..=MAX_PRECISION).contains(&precision) {
        Ok(())
    } else {
        Err(GeohashError::InvalidPrecision(precision))
    }
}

fn char_index(c: char) -> Result<usize, GeohashError> {
    u8::try_from(c)
        .ok()
        .and_then(|b| BASE32.iter().position(|&x| x == b))
        .ok_or(GeohashError::InvalidCharacter(c))
}

pub fn encode(lat: f64, lon: f64, precision: usize) -> Result<String, GeohashError> {
    check_precision(precision)?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(GeohashError::InvalidCoordinate { lat, lon });
    }

    let mut lat_range = (-90.0, 90.0);
    let mut lon_range = (-180.0, 180.0);
    let mut hash = String::with_capacity(precision);
    let mut bits = 0usize;
    let mut bit_count = 0;
    let mut even_bit = true;

    while hash.len() < precision {
        let (value, range) = if even_bit {
            (lon, &mut lon_range)
        } else {
            (lat, &mut lat_range)
        };
        let mid = (range.0 + range.1) / 2.0;
        if value >= mid {
            bits = (bits << 1) | 1;
            range.0 = mid;
        } else {
            bits <<= 1;
            range.1 = mid;
        }
        even_bit = !even_bit;

        bit_count += 1;
        if bit_count == 5 {
            hash.push(BASE32[bits] as char);
            bits = 0;
            bit_count = 0;
        }
    }

    Ok(hash)
}

fn validate(hash: &str) -> Result<(), GeohashError> {
    if hash.is_empty() {
        return Err(GeohashError::Empty);
    }
    check_precision(hash.chars().count())?;
    hash.chars().try_for_each(|c| char_index(c).map(|_| ()))
}

pub fn decode(hash: &str) -> Result<BoundingBox, GeohashError> {
    validate(hash)?;

    let mut lat_range = (-90.0, 90.0);
    let mut lon_range = (-180.0, 180.0);
    let mut even_bit = true;

    for c in hash.chars() {
        let index = char_index(c)?;
        for shift in (0..5).rev() {
            let bit = (index >> shift) & 1;
            let range = if even_bit {
                &mut lon_range
            } else {
                &mut lat_range
            };
            let mid = (range.0 + range.1) / 2.0;
            if bit == 1 {
                range.0 = mid;
            } else {
                range.1 = mid;
            }
            even_bit = !even_bit;
        }
    }

    Ok(BoundingBox::new(
        lat_range.0,
        lat_range.1,
        lon_range.0,
        lon_range.1,
    ))
}

/// Center point (lat, lon) of a geohash cell.
pub fn decode_center(hash: &str) -> Result<(f64, f64), GeohashError> {
    decode(hash).map(|bbox| bbox.center())
}

/// The adjacent cell of the same precision. Wraps around the antimeridian;
/// at the poles it wraps onto the opposite edge of the grid.
pub fn neighbor(hash: &str, direction: Direction) -> Result<String, GeohashError> {
    validate(hash)?;

    // Validated hashes are ASCII, so byte offsets are character offsets.
    let parity = hash.len() % 2;
    let (parent, last) = hash.split_at(hash.len() - 1);
    let last_byte = last.as_bytes()[0];
    let mut parent = parent.to_string();

    if direction.border_table()[parity].contains(&last_byte) && !parent.is_empty() {
        parent = neighbor(&parent, direction)?;
    }

    let table = direction.neighbor_table()[parity];
    // Every table is a permutation of BASE32, so the lookup always succeeds.
    let position = table
        .iter()
        .position(|&b| b == last_byte)
        .ok_or(GeohashError::InvalidCharacter(last_byte as char))?;
    parent.push(BASE32[position] as char);
    Ok(parent)
}

/// All eight surrounding cells in the order top, top-right, right,
/// bottom-right, bottom, bottom-left, left, top-left.
pub fn neighbors(hash: &str) -> Result<[String; 8], GeohashError> {
    let top = neighbor(hash, Direction::Top)?;
    let bottom = neighbor(hash, Direction::Bottom)?;
    let right = neighbor(hash, Direction::Right)?;
    let left = neighbor(hash, Direction::Left)?;

    let top_right = neighbor(&top, Direction::Right)?;
    let bottom_right = neighbor(&bottom, Direction::Right)?;
    let bottom_left = neighbor(&bottom, Direction::Left)?;
    let top_left = neighbor(&top, Direction::Left)?;

    Ok([
        top,
        top_right,
        right,
        bottom_right,
        bottom,
        bottom_left,
        left,
        top_left,
    ])
}

/// Every cell of the given precision that intersects `bbox`.
///
/// Steps through the grid one reference cell at a time, starting from the
/// cell containing the south-west corner, and encodes each cell centre.
pub fn geohashes_in_bounding_box(
    bbox: &BoundingBox,
    precision: usize,
) -> Result<BTreeSet<String>, GeohashError> {
    check_precision(precision)?;
    for (lat, lon) in [(bbox.min_lat, bbox.min_lon), (bbox.max_lat, bbox.max_lon)] {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(GeohashError::InvalidCoordinate { lat, lon });
        }
    }
    // Boxes crossing the antimeridian must be split by the caller.
    if bbox.min_lat > bbox.max_lat || bbox.min_lon > bbox.max_lon {
        return Err(GeohashError::InvertedBoundingBox);
    }

    let reference = decode(&encode(bbox.min_lat, bbox.min_lon, precision)?)?;
    let cell_height = reference.height();
    let cell_width = reference.width();

    let rows = ((bbox.max_lat - reference.min_lat) / cell_height).floor() as usize + 1;
    let cols = ((bbox.max_lon - reference.min_lon) / cell_width).floor() as usize + 1;
    let cells = rows.saturating_mul(cols);
    if cells > MAX_BOUNDING_BOX_CELLS {
        return Err(GeohashError::TooManyCells {
            cells,
            limit: MAX_BOUNDING_BOX_CELLS,
        });
    }

    let (first_lat, first_lon) = reference.center();
    let mut hashes = BTreeSet::new();
    for row in 0..rows {
        let lat = (first_lat + row as f64 * cell_height).min(90.0);
        for col in 0..cols {
            let lon = (first_lon + col as f64 * cell_width).min(180.0);
            hashes.insert(encode(lat, lon, precision)?);
        }
    }

    Ok(hashes)
}

/// Suggested geohash precision for a map zoom level.
pub fn precision_for_zoom_level(zoom: u8) -> usize {
    match zoom {
        0..=2 => 1,
        3..=4 => 2,
        5..=7 => 3,
        8..=10 => 4,
        11..=12 => 5,
        13..=14 => 6,
        15..=16 => 7,
        17..=18 => 8,
        _ => 9,
    }
}

/// Approximate (width, height) of a cell in meters at the equator.
pub fn dimensions_for_precision(precision: usize) -> Result<(f64, f64), GeohashError> {
    const DIMENSIONS: [(f64, f64); MAX_PRECISION] = [
        (5_009_400.0, 4_992_600.0),
        (1_252_300.0, 624_100.0),
        (156_500.0, 156_000.0),
        (39_100.0, 19_500.0),
        (4_900.0, 4_900.0),
        (1_200.0, 609.4),
        (152.9, 152.4),
        (38.2, 19.0),
        (4.77, 4.77),
        (1.19, 0.596),
        (0.149, 0.149),
        (0.037, 0.019),
    ];
    check_precision(precision)?;
    Ok(DIMENSIONS[precision - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_encoding() {
        assert_eq!(encode(57.64911, 10.40744, 11).unwrap(), "u4pruydqqvj");
        assert_eq!(encode(0.0, 0.0, 5).unwrap(), "s0000");
        assert_eq!(encode(-90.0, -180.0, 3).unwrap(), "000");
        assert_eq!(encode(90.0, 180.0, 3).unwrap(), "zzz");
    }

    #[test]
    fn test_invalid_inputs() {
        assert_eq!(encode(0.0, 0.0, 0), Err(GeohashError::InvalidPrecision(0)));
        assert_eq!(encode(0.0, 0.0, 13), Err(GeohashError::InvalidPrecision(13)));
        assert!(matches!(
            encode(91.0, 0.0, 5),
            Err(GeohashError::InvalidCoordinate { .. })
        ));
        assert_eq!(decode(""), Err(GeohashError::Empty));
        assert_eq!(decode("u4pa"), Err(GeohashError::InvalidCharacter('a')));
        assert_eq!(
            neighbor("", Direction::Top),
            Err(GeohashError::Empty)
        );
        assert_eq!(
            neighbor("ui", Direction::Top),
            Err(GeohashError::InvalidCharacter('i'))
        );
    }

    #[test]
    fn test_decode_contains_encoded_point() {
        let points = [
            (57.64911, 10.40744),
            (-33.8688, 151.2093),
            (40.015, -105.2705),
            (0.0, 0.0),
            (-89.9999, -179.9999),
            (89.9999, 179.9999),
        ];
        for (lat, lon) in points {
            for precision in 1..=MAX_PRECISION {
                let hash = encode(lat, lon, precision).unwrap();
                let bbox = decode(&hash).unwrap();
                assert!(
                    bbox.contains(lat, lon),
                    "{hash} {bbox:?} does not contain ({lat}, {lon})"
                );
            }
        }
    }

    #[test]
    fn test_decode_first_character() {
        let bbox = decode("u").unwrap();
        assert_eq!(bbox, BoundingBox::new(45.0, 90.0, 0.0, 45.0));
        assert_eq!(decode_center("s").unwrap(), (22.5, 22.5));
    }

    #[test]
    fn test_known_neighbors() {
        assert_eq!(neighbor("u4pruydqqvj", Direction::Right).unwrap(), "u4pruydqqvn");
        assert_eq!(neighbor("gbsuv", Direction::Top).unwrap(), "gbsvj");
        assert_eq!(neighbor("s0000", Direction::Left).unwrap(), "ebpbp");
        assert_eq!(neighbor("s0000", Direction::Bottom).unwrap(), "kpbpb");
    }

    #[test]
    fn test_neighbors_order_and_geometry() {
        let hash = encode(40.015, -105.2705, 6).unwrap();
        let center = decode(&hash).unwrap().center();
        let all = neighbors(&hash).unwrap();

        let (h, w) = {
            let bbox = decode(&hash).unwrap();
            (bbox.height(), bbox.width())
        };
        let expected_offsets = [
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 1.0),
            (-1.0, 1.0),
            (-1.0, 0.0),
            (-1.0, -1.0),
            (0.0, -1.0),
            (1.0, -1.0),
        ];
        for (neighbor_hash, (dy, dx)) in all.iter().zip(expected_offsets) {
            let (lat, lon) = decode(neighbor_hash).unwrap().center();
            assert!((lat - (center.0 + dy * h)).abs() < 1e-9, "{neighbor_hash}");
            assert!((lon - (center.1 + dx * w)).abs() < 1e-9, "{neighbor_hash}");
        }
    }

    #[test]
    fn test_neighbor_symmetry_at_boundaries() {
        // Hemisphere, pole and antimeridian edges.
        let points = [
            (0.00001, 0.00001),
            (-0.00001, -0.00001),
            (0.00001, -0.00001),
            (89.99999, 179.99999),
            (-89.99999, -179.99999),
            (45.0, 179.99999),
            (-45.0, -179.99999),
            (89.99999, 0.0),
        ];
        for (lat, lon) in points {
            for precision in [1, 2, 3, 5, 8, 12] {
                let hash = encode(lat, lon, precision).unwrap();
                for direction in [
                    Direction::Top,
                    Direction::Bottom,
                    Direction::Left,
                    Direction::Right,
                ] {
                    let there = neighbor(&hash, direction).unwrap();
                    let back = neighbor(&there, direction.opposite()).unwrap();
                    assert_eq!(back, hash, "{hash} -> {direction} -> {there}");
                }
            }
        }
    }

    #[test]
    fn test_antimeridian_wraps() {
        let east = encode(10.0, 179.99, 4).unwrap();
        let wrapped = neighbor(&east, Direction::Right).unwrap();
        let (_, lon) = decode_center(&wrapped).unwrap();
        assert!(lon < -179.0, "{wrapped} centred at {lon}");
        assert_eq!(neighbor("z", Direction::Right).unwrap(), "b");
    }

    #[test]
    fn test_bounding_box_cover() {
        let bbox = BoundingBox::new(40.0, 40.02, -105.3, -105.27);
        let hashes = geohashes_in_bounding_box(&bbox, 6).unwrap();

        assert!(!hashes.is_empty());
        for (lat, lon) in [
            (40.0, -105.3),
            (40.02, -105.27),
            (40.01, -105.285),
            (40.0, -105.27),
            (40.02, -105.3),
        ] {
            let hash = encode(lat, lon, 6).unwrap();
            assert!(hashes.contains(&hash), "missing {hash}");
        }
        for hash in &hashes {
            let cell = decode(hash).unwrap();
            assert!(cell.max_lat >= bbox.min_lat && cell.min_lat <= bbox.max_lat);
            assert!(cell.max_lon >= bbox.min_lon && cell.min_lon <= bbox.max_lon);
        }
    }

    #[test]
    fn test_bounding_box_single_cell() {
        let bbox = BoundingBox::new(40.0101, 40.0102, -105.2801, -105.2800);
        let hashes = geohashes_in_bounding_box(&bbox, 4).unwrap();
        assert_eq!(hashes.len(), 1);
    }

    #[test]
    fn test_bounding_box_inverted() {
        let across_antimeridian = BoundingBox::new(-17.0, -16.0, 179.5, -179.5);
        assert_eq!(
            geohashes_in_bounding_box(&across_antimeridian, 4),
            Err(GeohashError::InvertedBoundingBox)
        );

        let upside_down = BoundingBox::new(40.1, 40.0, -105.3, -105.2);
        assert_eq!(
            geohashes_in_bounding_box(&upside_down, 6),
            Err(GeohashError::InvertedBoundingBox)
        );
    }

    #[test]
    fn test_bounding_box_limit() {
        let bbox = BoundingBox::new(-80.0, 80.0, -170.0, 170.0);
        assert!(matches!(
            geohashes_in_bounding_box(&bbox, 8),
            Err(GeohashError::TooManyCells { .. })
        ));
    }

    #[test]
    fn test_zoom_and_dimension_tables() {
        assert_eq!(precision_for_zoom_level(0), 1);
        assert_eq!(precision_for_zoom_level(12), 5);
        assert_eq!(precision_for_zoom_level(16), 7);
        assert_eq!(precision_for_zoom_level(22), 9);

        let mut last = f64::INFINITY;
        for precision in 1..=MAX_PRECISION {
            let (width, _) = dimensions_for_precision(precision).unwrap();
            assert!(width < last);
            last = width;
        }
        assert!(dimensions_for_precision(0).is_err());
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!("top".parse::<Direction>(), Ok(Direction::Top));
        assert_eq!("E".parse::<Direction>(), Ok(Direction::Right));
        assert!("up".parse::<Direction>().is_err());
    }
}
