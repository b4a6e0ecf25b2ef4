pub mod accumulator;
pub mod admission;
pub mod clock;
pub mod config;
pub mod coverage;
pub mod distance;
pub mod errors;
pub mod geohash;
pub mod kalman;
pub mod metrics;
pub mod models;
pub mod recorder;
pub mod replay;
pub mod session_actor;
pub mod store;

pub use accumulator::WorkoutAccumulator;
pub use admission::{AdmissionFilter, FilterStatistics, FilterVerdict, RejectionReason};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AccumulatorConfig, FilterConfig, SmootherConfig, TrackerConfig};
pub use coverage::{CoverageAggregator, CoverageTile, ObservedVisit, VisitCollector};
pub use errors::{CoverageError, GeohashError, StoreError, WorkoutError, WorkoutResult};
pub use geohash::{BoundingBox, Direction};
pub use kalman::KalmanSmoother;
pub use models::{
    ActivitySnapshot, ActivityType, PausedInterval, RawFix, SmoothedFix, Split, WorkoutMetrics,
    WorkoutState,
};
pub use recorder::{ProcessedFix, Recorder};
pub use session_actor::{SessionActor, SessionHandle};
pub use store::{ActivityStore, InMemoryActivityStore};
