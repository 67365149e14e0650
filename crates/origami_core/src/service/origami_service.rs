//! Origami use-case facade.
//!
//! # Responsibility
//! - Run each operation in its own SQLite transaction: `IMMEDIATE` for
//!   writes, deferred for reads.
//! - Emit one `event=<operation>` log line per call with status and duration.
//!
//! # Invariants
//! - No operation partially commits; dropping an uncommitted transaction
//!   rolls it back.

use crate::model::payload::{
    AnnotateOrigamiRequest, FaceResponse, FoldRequest, NewFaceRequest, StepResponse, VertexRequest,
};
use crate::model::step::{OrigamiId, Step, StepType};
use crate::repo::geometry_repo::SqliteGeometryRepository;
use crate::repo::step_repo::{SqliteStepRepository, StepRepository};
use crate::service::annotation::{annotate, AnnotationCounts};
use crate::service::error::OrigamiResult;
use crate::service::fold::{create_faces, fold, FoldOutcome};
use crate::service::invariants::check_face_invariants;
use crate::service::replay;
use log::{error, info};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Instant;

/// Half the side length of the initial square sheet.
pub const INITIAL_SHEET_HALF_SIZE: f64 = 3.0;

/// Index of the `create` step and of the initial face.
const INITIAL_INDEX: i64 = 0;

/// Origami service bound to one migrated connection.
pub struct OrigamiService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> OrigamiService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Creates an origami holding a single square face.
    ///
    /// Returns the new origami id and the forward view of its `create` step.
    pub fn create_origami(&self) -> OrigamiResult<(OrigamiId, StepResponse)> {
        let started_at = Instant::now();
        let result = self.write(|steps, geometry| {
            let origami_id = steps.insert_origami()?;
            let step_id = steps.insert_step(origami_id, StepType::Create, INITIAL_INDEX)?;
            let sheet = initial_sheet();
            let created = create_faces(
                geometry,
                origami_id,
                step_id,
                std::slice::from_ref(&sheet),
                &[],
            )?;
            for (_, face_id) in &created {
                check_face_invariants(geometry, *face_id)?;
            }
            let view =
                replay::get_step(steps, geometry, origami_id, INITIAL_INDEX, INITIAL_INDEX, true)?;
            Ok((origami_id, view))
        });

        match &result {
            Ok((origami_id, _)) => info!(
                "event=origami_create module=service status=ok origami_id={origami_id} duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("origami_create", err.kind(), &err.to_string(), started_at),
        }
        result
    }

    /// Applies a fold request atomically.
    pub fn fold(&self, request: &FoldRequest) -> OrigamiResult<FoldOutcome> {
        let started_at = Instant::now();
        let result = self.write(|steps, geometry| fold(steps, geometry, request));

        match &result {
            Ok(outcome) => info!(
                "event=fold module=service status=ok origami_id={} step={} faces_created={} faces_retired={} points_retired={} edges_retired={} lines_retired={} duration_ms={}",
                request.origami_id,
                request.step_id_in_origami,
                outcome.created_faces.len(),
                outcome.retired.faces,
                outcome.retired.points,
                outcome.retired.edges,
                outcome.retired.lines,
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("fold", err.kind(), &err.to_string(), started_at),
        }
        result
    }

    /// Applies an annotation request atomically under a new `annotate` step.
    pub fn annotate(&self, request: &AnnotateOrigamiRequest) -> OrigamiResult<AnnotationCounts> {
        let started_at = Instant::now();
        let result = self.write(|steps, geometry| {
            annotate(
                steps,
                geometry,
                request.origami_id,
                request.step_id_in_origami,
                &request.faces,
                None,
            )
            .map(|(_, counts)| counts)
        });

        match &result {
            Ok(counts) => info!(
                "event=annotate module=service status=ok origami_id={} step={} points_added={} lines_added={} points_deleted={} lines_deleted={} duration_ms={}",
                request.origami_id,
                request.step_id_in_origami,
                counts.points_added,
                counts.lines_added,
                counts.points_deleted,
                counts.lines_deleted,
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("annotate", err.kind(), &err.to_string(), started_at),
        }
        result
    }

    /// Replays one step from a single read snapshot.
    pub fn get_step(
        &self,
        origami_id: OrigamiId,
        start_idx: i64,
        end_idx: i64,
        is_forward: bool,
    ) -> OrigamiResult<StepResponse> {
        let started_at = Instant::now();
        let result = self.read(|steps, geometry| {
            replay::get_step(steps, geometry, origami_id, start_idx, end_idx, is_forward)
        });

        match &result {
            Ok(view) => info!(
                "event=get_step module=service status=ok origami_id={origami_id} start={start_idx} end={end_idx} forward={is_forward} step_type={} duration_ms={}",
                view.step_type.as_db_str(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("get_step", err.kind(), &err.to_string(), started_at),
        }
        result
    }

    /// Lists the steps of an origami in index order.
    pub fn list_steps(&self, origami_id: OrigamiId) -> OrigamiResult<Vec<Step>> {
        self.read(|steps, _| Ok(steps.list_steps(origami_id)?))
    }

    /// Current geometry of every live face of an origami.
    pub fn live_faces(&self, origami_id: OrigamiId) -> OrigamiResult<Vec<FaceResponse>> {
        self.read(|steps, geometry| {
            // Surface unknown origamis instead of an empty sheet.
            steps.list_steps(origami_id)?;
            replay::live_faces(geometry, origami_id)
        })
    }

    fn write<T>(
        &self,
        op: impl FnOnce(&SqliteStepRepository<'_>, &SqliteGeometryRepository<'_>) -> OrigamiResult<T>,
    ) -> OrigamiResult<T> {
        self.in_transaction(TransactionBehavior::Immediate, op)
    }

    fn read<T>(
        &self,
        op: impl FnOnce(&SqliteStepRepository<'_>, &SqliteGeometryRepository<'_>) -> OrigamiResult<T>,
    ) -> OrigamiResult<T> {
        self.in_transaction(TransactionBehavior::Deferred, op)
    }

    fn in_transaction<T>(
        &self,
        behavior: TransactionBehavior,
        op: impl FnOnce(&SqliteStepRepository<'_>, &SqliteGeometryRepository<'_>) -> OrigamiResult<T>,
    ) -> OrigamiResult<T> {
        let tx = Transaction::new_unchecked(self.conn, behavior)?;
        let steps = SqliteStepRepository::try_new(&tx)?;
        let geometry = SqliteGeometryRepository::try_new(&tx)?;
        let value = op(&steps, &geometry)?;
        tx.commit()?;
        Ok(value)
    }
}

fn initial_sheet() -> NewFaceRequest {
    let h = INITIAL_SHEET_HALF_SIZE;
    NewFaceRequest {
        id_in_origami: INITIAL_INDEX,
        vertices: vec![
            VertexRequest { x: -h, y: -h },
            VertexRequest { x: h, y: -h },
            VertexRequest { x: h, y: h },
            VertexRequest { x: -h, y: h },
        ],
        edges: vec![None; 4],
        annotations: None,
    }
}

fn log_failure(event: &str, error_kind: &str, message: &str, started_at: Instant) {
    error!(
        "event={event} module=service status=error error_kind={error_kind} duration_ms={} error={message}",
        started_at.elapsed().as_millis()
    );
}

#[cfg(test)]
mod tests {
    use super::{initial_sheet, OrigamiService, INITIAL_SHEET_HALF_SIZE};
    use crate::db::open_db_in_memory;
    use uuid::Uuid;

    #[test]
    fn initial_sheet_is_a_centered_square() {
        let sheet = initial_sheet();
        assert_eq!(sheet.vertices.len(), 4);
        assert_eq!(sheet.edges.len(), 4);
        for vertex in &sheet.vertices {
            assert_eq!(vertex.x.abs(), INITIAL_SHEET_HALF_SIZE);
            assert_eq!(vertex.y.abs(), INITIAL_SHEET_HALF_SIZE);
        }
    }

    #[test]
    fn live_faces_rejects_unknown_origami() {
        let conn = open_db_in_memory().expect("open in-memory db");
        let service = OrigamiService::new(&conn);
        let err = service
            .live_faces(Uuid::new_v4())
            .expect_err("unknown origami must fail");
        assert!(err.is_invalid_request());
    }
}
