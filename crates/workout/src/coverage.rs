//! Visit statistics per geohash cell.
//!
//! Merging is a monoid over (visit count, first visit, last visit): counts
//! add, first takes the minimum, last takes the maximum. Any batching or
//! ordering of the same observed visits yields the same tiles.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::errors::{CoverageError, GeohashError};
use crate::geohash::{self, BoundingBox};

/// One session's (or one batch's) view of a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedVisit {
    pub geohash: String,
    pub latitude: f64,
    pub longitude: f64,
    pub visit_count: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub first_visited: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_visited: OffsetDateTime,
}

impl ObservedVisit {
    fn validate(&self) -> Result<(), CoverageError> {
        geohash::decode(&self.geohash)?;
        let invalid = |reason: &str| CoverageError::InvalidVisit {
            geohash: self.geohash.clone(),
            reason: reason.to_string(),
        };
        if self.visit_count == 0 {
            return Err(invalid("visit count must be at least 1"));
        }
        if self.first_visited > self.last_visited {
            return Err(invalid("first visit is after last visit"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageTile {
    pub geohash: String,
    pub center_latitude: f64,
    pub center_longitude: f64,
    pub visit_count: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub first_visited: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_visited: OffsetDateTime,
}

impl CoverageTile {
    /// The tile centre comes from the cell itself, not the observed
    /// coordinate, so it does not depend on which visit arrived first.
    fn from_visit(visit: &ObservedVisit) -> Result<Self, GeohashError> {
        let (center_latitude, center_longitude) = geohash::decode_center(&visit.geohash)?;
        Ok(Self {
            geohash: visit.geohash.clone(),
            center_latitude,
            center_longitude,
            visit_count: visit.visit_count,
            first_visited: visit.first_visited,
            last_visited: visit.last_visited,
        })
    }

    /// Counts saturate at `u64::MAX`, so a merge never lowers them.
    pub fn merge(&mut self, visit: &ObservedVisit) {
        self.visit_count = self.visit_count.saturating_add(visit.visit_count);
        self.first_visited = self.first_visited.min(visit.first_visited);
        self.last_visited = self.last_visited.max(visit.last_visited);
    }
}

/// Cross-session store of coverage tiles.
///
/// Each batch is applied under a single lock, so concurrent writers are
/// serialised and a reader never sees half a batch.
#[derive(Debug, Default)]
pub struct CoverageAggregator {
    tiles: Mutex<HashMap<String, CoverageTile>>,
}

impl CoverageAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CoverageTile>> {
        // Batches are validated before the map is touched and merging cannot panic,
        // so a poisoned map is still consistent.
        self.tiles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Merges a batch of visits. Either every visit is applied or, if any
    /// visit is invalid or would overflow a tile's count, none are.
    pub fn upsert(&self, visits: &[ObservedVisit]) -> Result<(), CoverageError> {
        let mut prepared = Vec::with_capacity(visits.len());
        for visit in visits {
            visit.validate()?;
            prepared.push((visit, CoverageTile::from_visit(visit)?));
        }

        let mut tiles = self.lock();

        let mut totals: HashMap<&str, u64> = HashMap::new();
        for visit in visits {
            let total = totals.entry(visit.geohash.as_str()).or_insert_with(|| {
                tiles.get(&visit.geohash).map_or(0, |tile| tile.visit_count)
            });
            *total = total
                .checked_add(visit.visit_count)
                .ok_or_else(|| CoverageError::InvalidVisit {
                    geohash: visit.geohash.clone(),
                    reason: "visit count overflows the tile".to_string(),
                })?;
        }

        let mut inserted = 0;
        for (visit, tile) in prepared {
            match tiles.get_mut(&visit.geohash) {
                Some(existing) => existing.merge(visit),
                None => {
                    tiles.insert(visit.geohash.clone(), tile);
                    inserted += 1;
                }
            }
        }

        info!(
            batch = visits.len(),
            inserted,
            total = tiles.len(),
            "merged coverage batch"
        );
        Ok(())
    }

    pub fn tile(&self, geohash: &str) -> Option<CoverageTile> {
        self.lock().get(geohash).cloned()
    }

    /// Every tile, ordered by geohash.
    pub fn tiles(&self) -> Vec<CoverageTile> {
        let mut tiles: Vec<CoverageTile> = self.lock().values().cloned().collect();
        tiles.sort_by(|a, b| a.geohash.cmp(&b.geohash));
        tiles
    }

    /// Tiles whose centre falls inside `bbox`, ordered by geohash.
    pub fn tiles_in_bounding_box(&self, bbox: &BoundingBox) -> Vec<CoverageTile> {
        let mut tiles: Vec<CoverageTile> = self
            .lock()
            .values()
            .filter(|t| bbox.contains(t.center_latitude, t.center_longitude))
            .cloned()
            .collect();
        tiles.sort_by(|a, b| a.geohash.cmp(&b.geohash));
        tiles
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn total_visits(&self) -> u64 {
        self.lock().values().map(|t| t.visit_count).sum()
    }
}

/// Turns a stream of accepted positions into per-cell visits.
///
/// A visit is counted each time the track enters a cell; staying inside the
/// cell only extends `last_visited`.
#[derive(Debug, Clone)]
pub struct VisitCollector {
    precision: usize,
    current: Option<String>,
    visits: BTreeMap<String, ObservedVisit>,
}

impl VisitCollector {
    pub fn new(precision: usize) -> Self {
        Self {
            precision,
            current: None,
            visits: BTreeMap::new(),
        }
    }

    pub fn precision(&self) -> usize {
        self.precision
    }

    pub fn record(
        &mut self,
        latitude: f64,
        longitude: f64,
        at: OffsetDateTime,
    ) -> Result<(), GeohashError> {
        let hash = geohash::encode(latitude, longitude, self.precision)?;
        let entered = self.current.as_deref() != Some(hash.as_str());

        let visit = self
            .visits
            .entry(hash.clone())
            .or_insert_with(|| ObservedVisit {
                geohash: hash.clone(),
                latitude,
                longitude,
                visit_count: 0,
                first_visited: at,
                last_visited: at,
            });
        if entered {
            visit.visit_count += 1;
            debug!(geohash = %hash, visits = visit.visit_count, "entered cell");
        }
        visit.first_visited = visit.first_visited.min(at);
        visit.last_visited = visit.last_visited.max(at);

        self.current = Some(hash);
        Ok(())
    }

    /// Breaks the current stay, so the next position counts as a new entry.
    pub fn interrupt(&mut self) {
        self.current = None;
    }

    pub fn pending(&self) -> usize {
        self.visits.len()
    }

    /// Hands over the collected visits, ordered by geohash, and starts afresh.
    pub fn drain(&mut self) -> Vec<ObservedVisit> {
        self.current = None;
        std::mem::take(&mut self.visits).into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use std::sync::Arc;
    use time::Duration;
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2024-06-01 08:00:00 UTC);

    fn visit(geohash: &str, count: u64, first: i64, last: i64) -> ObservedVisit {
        let (latitude, longitude) = geohash::decode_center(geohash).unwrap();
        ObservedVisit {
            geohash: geohash.to_string(),
            latitude,
            longitude,
            visit_count: count,
            first_visited: T0 + Duration::seconds(first),
            last_visited: T0 + Duration::seconds(last),
        }
    }

    #[test]
    fn test_insert_then_merge() {
        let aggregator = CoverageAggregator::new();
        aggregator.upsert(&[visit("9xj5sm", 1, 10, 20)]).unwrap();
        aggregator.upsert(&[visit("9xj5sm", 2, 5, 15)]).unwrap();

        let tile = aggregator.tile("9xj5sm").unwrap();
        assert_eq!(tile.visit_count, 3);
        assert_eq!(tile.first_visited, T0 + Duration::seconds(5));
        assert_eq!(tile.last_visited, T0 + Duration::seconds(20));
        assert!(tile.first_visited <= tile.last_visited);
    }

    #[test]
    fn test_count_overflow_rejects_whole_batch() {
        let aggregator = CoverageAggregator::new();
        aggregator.upsert(&[visit("9xj5sm", 1, 0, 0)]).unwrap();

        let result = aggregator.upsert(&[visit("9xj5sn", 1, 0, 0), visit("9xj5sm", u64::MAX, 0, 0)]);
        assert!(matches!(result, Err(CoverageError::InvalidVisit { .. })));
        assert!(aggregator.tile("9xj5sn").is_none());
        assert_eq!(aggregator.tile("9xj5sm").unwrap().visit_count, 1);

        // Overflow split across two visits to a new tile in one batch.
        let result = aggregator.upsert(&[
            visit("9xj5sp", u64::MAX - 1, 0, 0),
            visit("9xj5sp", 2, 0, 0),
        ]);
        assert!(result.is_err());
        assert!(aggregator.tile("9xj5sp").is_none());

        aggregator.upsert(&[visit("9xj5sm", u64::MAX - 1, 0, 0)]).unwrap();
        assert_eq!(aggregator.tile("9xj5sm").unwrap().visit_count, u64::MAX);
    }

    #[test]
    fn test_merge_saturates() {
        let mut tile = CoverageTile::from_visit(&visit("9xj5sm", u64::MAX, 0, 0)).unwrap();
        tile.merge(&visit("9xj5sm", 3, 0, 0));
        assert_eq!(tile.visit_count, u64::MAX);
    }

    #[test]
    fn test_tile_centre_is_cell_centre() {
        let aggregator = CoverageAggregator::new();
        let mut observed = visit("9xj5sm", 1, 0, 0);
        observed.latitude += 0.001;
        aggregator.upsert(&[observed]).unwrap();

        let tile = aggregator.tile("9xj5sm").unwrap();
        let (lat, lon) = geohash::decode_center("9xj5sm").unwrap();
        assert_eq!((tile.center_latitude, tile.center_longitude), (lat, lon));
    }

    #[test]
    fn test_invalid_batch_changes_nothing() {
        let aggregator = CoverageAggregator::new();
        aggregator.upsert(&[visit("9xj5sm", 1, 0, 0)]).unwrap();

        let bad_order = visit("9xj5sn", 1, 50, 10);
        let result = aggregator.upsert(&[visit("9xj5sm", 4, 0, 100), bad_order]);
        assert!(matches!(result, Err(CoverageError::InvalidVisit { .. })));

        let mut bad_hash = visit("9xj5sm", 1, 0, 0);
        bad_hash.geohash = "9xj5sa".to_string();
        assert!(matches!(
            aggregator.upsert(&[visit("9xj5sm", 4, 0, 100), bad_hash]),
            Err(CoverageError::Geohash(_))
        ));

        assert!(matches!(
            aggregator.upsert(&[visit("9xj5sm", 0, 0, 0)]),
            Err(CoverageError::InvalidVisit { .. })
        ));

        assert_eq!(aggregator.len(), 1);
        assert_eq!(aggregator.total_visits(), 1);
    }

    #[test]
    fn test_upsert_is_order_and_partition_independent() {
        let mut rng = StdRng::seed_from_u64(7);
        let cells = ["9xj5sm", "9xj5sn", "9xj5sq", "9xj5sj"];
        let visits: Vec<ObservedVisit> = (0..60)
            .map(|_| {
                let cell = cells[rng.gen_range(0..cells.len())];
                let first = rng.gen_range(0..1000);
                let last = first + rng.gen_range(0..500);
                visit(cell, rng.gen_range(1..4), first, last)
            })
            .collect();

        let reference = CoverageAggregator::new();
        reference.upsert(&visits).unwrap();

        for _ in 0..20 {
            let mut shuffled = visits.clone();
            shuffled.shuffle(&mut rng);
            let aggregator = CoverageAggregator::new();
            let mut rest = shuffled.as_slice();
            while !rest.is_empty() {
                let take = rng.gen_range(1..=rest.len());
                let (batch, tail) = rest.split_at(take);
                aggregator.upsert(batch).unwrap();
                rest = tail;
            }
            assert_eq!(aggregator.tiles(), reference.tiles());
        }
    }

    #[test]
    fn test_concurrent_batches_all_land() {
        let aggregator = Arc::new(CoverageAggregator::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let aggregator = Arc::clone(&aggregator);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let batch = [visit("9xj5sm", 1, worker * 100 + i, worker * 100 + i)];
                        aggregator.upsert(&batch).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let tile = aggregator.tile("9xj5sm").unwrap();
        assert_eq!(tile.visit_count, 400);
        assert_eq!(tile.first_visited, T0);
        assert_eq!(tile.last_visited, T0 + Duration::seconds(749));
    }

    #[test]
    fn test_tiles_in_bounding_box() {
        let aggregator = CoverageAggregator::new();
        let inside = geohash::encode(40.01, -105.28, 6).unwrap();
        let outside = geohash::encode(39.5, -104.0, 6).unwrap();
        aggregator
            .upsert(&[visit(&inside, 1, 0, 0), visit(&outside, 1, 0, 0)])
            .unwrap();

        let bbox = BoundingBox::new(39.9, 40.1, -105.5, -105.2);
        let found = aggregator.tiles_in_bounding_box(&bbox);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].geohash, inside);
    }

    #[test]
    fn test_collector_counts_entries_not_samples() {
        let mut collector = VisitCollector::new(7);
        let a = (40.0100, -105.2800);
        let b = (40.0200, -105.2800);

        collector.record(a.0, a.1, T0).unwrap();
        collector.record(a.0, a.1, T0 + Duration::seconds(5)).unwrap();
        collector.record(b.0, b.1, T0 + Duration::seconds(60)).unwrap();
        collector.record(a.0, a.1, T0 + Duration::seconds(120)).unwrap();
        assert_eq!(collector.pending(), 2);

        let visits = collector.drain();
        let cell_a = geohash::encode(a.0, a.1, 7).unwrap();
        let visit_a = visits.iter().find(|v| v.geohash == cell_a).unwrap();
        assert_eq!(visit_a.visit_count, 2);
        assert_eq!(visit_a.first_visited, T0);
        assert_eq!(visit_a.last_visited, T0 + Duration::seconds(120));

        assert_eq!(collector.pending(), 0);
    }

    #[test]
    fn test_collector_interrupt_starts_new_visit() {
        let mut collector = VisitCollector::new(7);
        collector.record(40.01, -105.28, T0).unwrap();
        collector.interrupt();
        collector.record(40.01, -105.28, T0 + Duration::seconds(30)).unwrap();

        let visits = collector.drain();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].visit_count, 2);
    }
}
