use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::models::WorkoutState;

/// Caller-contract violations and collaborator failures.
///
/// Filter rejections are not errors; they come back as
/// [`FilterVerdict`](crate::admission::FilterVerdict) values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkoutError {
    #[error("No active workout")]
    NoActiveWorkout,

    #[error("A workout is already active")]
    WorkoutAlreadyActive,

    #[error("Cannot {action} while {state}")]
    InvalidStateTransition {
        state: WorkoutState,
        action: &'static str,
    },

    #[error("Geohash error: {0}")]
    Geohash(#[from] GeohashError),

    #[error("Coverage error: {0}")]
    Coverage(#[from] CoverageError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Workout session has shut down")]
    SessionClosed,
}

impl WorkoutError {
    pub(crate) fn invalid_transition(state: WorkoutState, action: &'static str) -> Self {
        warn!(%state, action, "rejected workout state transition");
        WorkoutError::InvalidStateTransition { state, action }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeohashError {
    #[error("Geohash is empty")]
    Empty,

    #[error("Invalid geohash precision: {0} (expected 1-12)")]
    InvalidPrecision(usize),

    #[error("Invalid geohash character: {0:?}")]
    InvalidCharacter(char),

    #[error("Coordinate out of range: ({lat}, {lon})")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("Bounding box minimum exceeds its maximum")]
    InvertedBoundingBox,

    #[error("Bounding box covers {cells} cells, limit is {limit}")]
    TooManyCells { cells: usize, limit: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoverageError {
    #[error("Invalid visit for {geohash}: {reason}")]
    InvalidVisit { geohash: String, reason: String },

    #[error("Geohash error: {0}")]
    Geohash(#[from] GeohashError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Activity not found: {0}")]
    NotFound(Uuid),
}

pub type WorkoutResult<T> = Result<T, WorkoutError>;
