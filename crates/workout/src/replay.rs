//! Drives a [`Recorder`] from a recorded stream of raw fixes.

use std::io::BufRead;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::admission::FilterStatistics;
use crate::clock::ManualClock;
use crate::config::TrackerConfig;
use crate::coverage::CoverageAggregator;
use crate::errors::WorkoutError;
use crate::models::{ActivitySnapshot, ActivityType, RawFix};
use crate::recorder::Recorder;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid fix on line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Workout(#[from] WorkoutError),
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub snapshot: ActivitySnapshot,
    pub statistics: FilterStatistics,
    pub coverage_cells: usize,
    pub coverage_visits: u64,
}

/// Reads one JSON-encoded [`RawFix`] per line. Blank lines are skipped.
pub fn read_fixes(reader: impl BufRead) -> Result<Vec<RawFix>, ReplayError> {
    let mut fixes = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fix = serde_json::from_str(&line).map_err(|source| ReplayError::Parse {
            line: index + 1,
            source,
        })?;
        fixes.push(fix);
    }
    Ok(fixes)
}

/// Records `fixes` as one workout, with time following the fix timestamps.
pub fn replay(
    fixes: &[RawFix],
    activity_type: ActivityType,
    config: TrackerConfig,
) -> Result<ReplayReport, ReplayError> {
    let start = fixes
        .first()
        .map_or_else(OffsetDateTime::now_utc, |fix| fix.timestamp);
    let clock = ManualClock::new(start);
    let coverage = Arc::new(CoverageAggregator::new());
    let mut recorder = Recorder::new(config, Arc::new(clock.clone()), coverage.clone());

    recorder.start(activity_type)?;
    for fix in fixes {
        clock.set(fix.timestamp);
        let processed = recorder.process_fix(*fix)?;
        if let Some(reason) = processed.verdict.rejection() {
            debug!(reason = reason.kind(), at = %fix.timestamp, "fix rejected");
        }
        if let Some(split) = processed.split {
            info!(
                index = split.index,
                distance = split.distance,
                pace = split.pace,
                "split"
            );
        }
    }

    let snapshot = recorder.stop()?;
    let statistics = recorder.statistics()?;

    Ok(ReplayReport {
        snapshot,
        statistics,
        coverage_cells: coverage.len(),
        coverage_visits: coverage.total_visits(),
    })
}
