//! Annotation engine: adds and retires points and lines on faces.
//!
//! # Invariants
//! - Per face the pipeline runs in a fixed order: retire lines, retire
//!   points, add points, add lines. Lines go first on the way out so a point
//!   freed in the same request can be retired; points go first on the way in
//!   so a new line can reference a new point.
//! - Vertices are never retired here.
//! - A point referenced by a live line is never retired.

use crate::model::geometry::{FaceId, PointKind};
use crate::model::payload::{AnnotationSet, FaceAnnotateRequest};
use crate::model::step::{OrigamiId, StepId, StepType};
use crate::repo::geometry_repo::GeometryRepository;
use crate::repo::resolver::IdResolver;
use crate::repo::step_repo::StepRepository;
use crate::service::deletion::{validate_deletion, DeletedEntity};
use crate::service::error::{found, OrigamiError, OrigamiResult};
use crate::service::ledger::create_step;

/// Row counts produced by one annotation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotationCounts {
    pub points_added: usize,
    pub lines_added: usize,
    pub points_deleted: usize,
    pub lines_deleted: usize,
}

impl AnnotationCounts {
    fn absorb(&mut self, other: Self) {
        self.points_added += other.points_added;
        self.lines_added += other.lines_added;
        self.points_deleted += other.points_deleted;
        self.lines_deleted += other.lines_deleted;
    }
}

/// Applies annotation requests to faces of one origami.
///
/// Creates an `annotate` step unless `existing_step` is given, in which case
/// every row is bound to that step instead (fold-embedded annotations).
/// Must run inside the caller's transaction.
pub fn annotate<S, G>(
    steps: &S,
    geometry: &G,
    origami_id: OrigamiId,
    step_id_in_origami: i64,
    faces: &[FaceAnnotateRequest],
    existing_step: Option<StepId>,
) -> OrigamiResult<(StepId, AnnotationCounts)>
where
    S: StepRepository,
    G: GeometryRepository + IdResolver,
{
    let step_id = match existing_step {
        Some(step_id) => step_id,
        None => create_step(steps, origami_id, StepType::Annotate, step_id_in_origami)?,
    };

    let mut counts = AnnotationCounts::default();
    for face in faces {
        let face_id = found(geometry.resolve_face(origami_id, face.id_in_origami))?.ok_or_else(
            || {
                OrigamiError::invalid_request(format!(
                    "unknown face {} in annotation request",
                    face.id_in_origami
                ))
            },
        )?;
        let face_counts = annotate_face(
            geometry,
            step_id,
            face_id,
            face.id_in_origami,
            &face.annotations,
        )?;
        counts.absorb(face_counts);
    }

    Ok((step_id, counts))
}

fn annotate_face<G>(
    geometry: &G,
    step_id: StepId,
    face_id: FaceId,
    face_label: i64,
    set: &AnnotationSet,
) -> OrigamiResult<AnnotationCounts>
where
    G: GeometryRepository + IdResolver,
{
    let lines_deleted = delete_lines(geometry, step_id, face_id, &set.deleted_lines)?;
    let points_deleted = delete_points(geometry, step_id, face_id, face_label, &set.deleted_points)?;
    let points_added = add_points(geometry, step_id, face_id, face_label, set)?;
    let lines_added = add_lines(geometry, step_id, face_id, face_label, set)?;

    Ok(AnnotationCounts {
        points_added,
        lines_added,
        points_deleted,
        lines_deleted,
    })
}

fn delete_lines<G: GeometryRepository>(
    geometry: &G,
    step_id: StepId,
    face_id: FaceId,
    ids: &[i64],
) -> OrigamiResult<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let updated = geometry.retire_lines(face_id, step_id, ids)?;
    let present = geometry.present_line_ids(face_id, ids)?;
    validate_deletion(DeletedEntity::Line, ids, updated, &present)?;
    Ok(updated)
}

fn delete_points<G>(
    geometry: &G,
    step_id: StepId,
    face_id: FaceId,
    face_label: i64,
    ids: &[i64],
) -> OrigamiResult<usize>
where
    G: GeometryRepository + IdResolver,
{
    if ids.is_empty() {
        return Ok(0);
    }

    for id in ids {
        // Unknown or retired ids are settled by `validate_deletion`.
        let Some(point_id) = found(geometry.resolve_point(face_id, *id))? else {
            continue;
        };
        let point = geometry.get_point(point_id)?;
        if point.is_vertex() {
            return Err(OrigamiError::invalid_request(format!(
                "vertex deletion: point {id} of face {face_label} is a vertex"
            )));
        }
        if geometry.has_live_dependent_line(point_id)? {
            return Err(OrigamiError::invalid_request(format!(
                "line dependency: point {id} of face {face_label} is used by a live line"
            )));
        }
    }

    let updated = geometry.retire_annotated_points(face_id, step_id, ids)?;
    let present = geometry.present_point_ids(face_id, ids)?;
    validate_deletion(DeletedEntity::Point, ids, updated, &present)?;
    Ok(updated)
}

fn add_points<G>(
    geometry: &G,
    step_id: StepId,
    face_id: FaceId,
    face_label: i64,
    set: &AnnotationSet,
) -> OrigamiResult<usize>
where
    G: GeometryRepository + IdResolver,
{
    for point in &set.points {
        if found(geometry.resolve_point(face_id, point.id_in_face))?.is_some() {
            return Err(OrigamiError::invalid_request(format!(
                "duplicate point: face {face_label} already has point {}",
                point.id_in_face
            )));
        }

        let on_edge_id = match point.on_edge_id_in_face {
            Some(edge_index) => Some(
                found(geometry.resolve_edge(face_id, edge_index))?.ok_or_else(|| {
                    OrigamiError::invalid_request(format!(
                        "invalid edge for point: face {face_label} has no edge {edge_index}"
                    ))
                })?,
            ),
            None => None,
        };

        geometry.insert_point(
            face_id,
            step_id,
            PointKind::Annotated { on_edge_id },
            point.x,
            point.y,
            point.id_in_face,
        )?;
    }
    Ok(set.points.len())
}

fn add_lines<G>(
    geometry: &G,
    step_id: StepId,
    face_id: FaceId,
    face_label: i64,
    set: &AnnotationSet,
) -> OrigamiResult<usize>
where
    G: GeometryRepository + IdResolver,
{
    for line in &set.lines {
        if found(geometry.resolve_line(face_id, line.id_in_face))?.is_some() {
            return Err(OrigamiError::invalid_request(format!(
                "duplicate line: face {face_label} already has line {}",
                line.id_in_face
            )));
        }
        if line.point1_id_in_origami == line.point2_id_in_origami {
            return Err(OrigamiError::invalid_request(format!(
                "invalid point in line: line {} joins point {} to itself",
                line.id_in_face, line.point1_id_in_origami
            )));
        }

        let endpoint = |index: i64| -> OrigamiResult<_> {
            found(geometry.resolve_point(face_id, index))?.ok_or_else(|| {
                OrigamiError::invalid_request(format!(
                    "invalid point in line: face {face_label} has no point {index} for line {}",
                    line.id_in_face
                ))
            })
        };
        let point1_id = endpoint(line.point1_id_in_origami)?;
        let point2_id = endpoint(line.point2_id_in_origami)?;

        geometry.insert_line(face_id, step_id, line.id_in_face, point1_id, point2_id)?;
    }
    Ok(set.lines.len())
}
