//! Core of the step-versioned origami geometry store.
//! Every fold and annotation is an ordered step; nothing is ever erased,
//! so any step can be replayed forward or backward.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::geometry::{Edge, EdgeKind, Face, Line, Point, PointKind};
pub use model::payload::{
    AnnotateOrigamiRequest, AnnotateRequest, AnnotationSet, FaceAnnotateRequest,
    FaceAnnotateResponse, FaceResponse, FoldEdgePayload, FoldRequest, FoldStepResponse,
    LinePayload, NewFaceRequest, PointPayload, StepResponse, VertexRequest, VertexResponse,
};
pub use model::step::{Lifecycle, OrigamiId, Step, StepId, StepType};
pub use repo::{Lookup, RepoError, RepoResult};
pub use service::annotation::AnnotationCounts;
pub use service::error::{OrigamiError, OrigamiResult};
pub use service::fold::{FoldOutcome, RetirementCounts};
pub use service::origami_service::{OrigamiService, INITIAL_SHEET_HALF_SIZE};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
