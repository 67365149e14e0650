//! Step replay: rebuilds the diff a step introduced, in either direction.
//!
//! # Invariants
//! - Read-only; callers run it inside one read transaction.
//! - Forward and backward views of a step are exact complements: what one
//!   adds the other removes.
//! - Only scoped ids leave this module.
//! - A reference from stored data that cannot be followed is a
//!   `ConsistencyFault`, never skipped.

use crate::model::geometry::{Face, FaceId, Line, Point, PointKind};
use crate::model::payload::{
    AnnotationSet, FaceAnnotateResponse, FaceResponse, FoldEdgePayload, FoldStepResponse,
    LinePayload, PointPayload, StepResponse, VertexResponse,
};
use crate::model::step::{OrigamiId, Step, StepType};
use crate::repo::geometry_repo::{GeometryRepository, RowFilter};
use crate::repo::resolver::IdResolver;
use crate::repo::step_repo::StepRepository;
use crate::service::error::{OrigamiError, OrigamiResult};
use std::collections::{BTreeMap, HashMap};

/// Replays the step between two timeline positions.
///
/// The target step is `end_idx` when moving forward and `start_idx` when
/// moving backward, i.e. always the step being applied or undone.
///
/// Step `i + 1` is applied by `get_step(o, i, i + 1, true)` and undone by
/// `get_step(o, i + 1, i, false)`; those two views are complements.
/// `get_step(o, i, i + 1, false)` undoes step `i`, not step `i + 1`.
pub fn get_step<S, G>(
    steps: &S,
    geometry: &G,
    origami_id: OrigamiId,
    start_idx: i64,
    end_idx: i64,
    is_forward: bool,
) -> OrigamiResult<StepResponse>
where
    S: StepRepository,
    G: GeometryRepository + IdResolver,
{
    let target_idx = if is_forward { end_idx } else { start_idx };
    if !steps.origami_exists(origami_id)? {
        return Err(OrigamiError::invalid_request(format!(
            "unknown origami {origami_id}"
        )));
    }
    let step = steps.find_step(origami_id, target_idx)?.ok_or_else(|| {
        OrigamiError::invalid_request(format!(
            "unknown step {target_idx} of origami {origami_id}"
        ))
    })?;

    let mut response = StepResponse {
        step_type: step.kind,
        is_forward,
        annotations: Vec::new(),
        fold_forward: None,
        fold_backward: None,
    };
    match step.kind {
        StepType::Annotate => {
            response.annotations = annotation_diff(geometry, &step, is_forward)?;
        }
        StepType::Create | StepType::Fold => {
            let diff = fold_diff(geometry, &step, is_forward)?;
            if is_forward {
                response.fold_forward = Some(diff);
            } else {
                response.fold_backward = Some(diff);
            }
        }
    }
    Ok(response)
}

/// Current geometry of every live face, ordered by `idInOrigami`.
pub fn live_faces<G>(geometry: &G, origami_id: OrigamiId) -> OrigamiResult<Vec<FaceResponse>>
where
    G: GeometryRepository + IdResolver,
{
    let mut labels = FaceLabels::default();
    geometry
        .faces_of_origami(origami_id, RowFilter::Live)?
        .iter()
        .map(|face| face_geometry(geometry, &mut labels, face, RowFilter::Live))
        .collect()
}

/// Rows to show and rows to hide for one playback direction.
fn direction(step: &Step, is_forward: bool) -> (RowFilter, RowFilter) {
    let created = RowFilter::CreatedAt(step.id);
    let retired = RowFilter::RetiredAt(step.id);
    if is_forward {
        (created, retired)
    } else {
        (retired, created)
    }
}

fn annotation_diff<G>(
    geometry: &G,
    step: &Step,
    is_forward: bool,
) -> OrigamiResult<Vec<FaceAnnotateResponse>>
where
    G: GeometryRepository + IdResolver,
{
    let (shown, hidden) = direction(step, is_forward);
    let mut labels = FaceLabels::default();
    let mut by_face: BTreeMap<(i64, FaceId), FaceAnnotateResponse> = BTreeMap::new();

    for point in geometry.points_marked(shown)? {
        if point.is_vertex() {
            continue;
        }
        let payload = point_payload(geometry, &point)?;
        entry(geometry, &mut labels, &mut by_face, point.face_id)?
            .points
            .push(payload);
    }
    for line in geometry.lines_marked(shown)? {
        let payload = line_payload(geometry, &line)?;
        entry(geometry, &mut labels, &mut by_face, line.face_id)?
            .lines
            .push(payload);
    }
    for point in geometry.points_marked(hidden)? {
        if point.is_vertex() {
            continue;
        }
        entry(geometry, &mut labels, &mut by_face, point.face_id)?
            .deleted_points
            .push(point.id_in_face);
    }
    for line in geometry.lines_marked(hidden)? {
        entry(geometry, &mut labels, &mut by_face, line.face_id)?
            .deleted_lines
            .push(line.id_in_face);
    }

    Ok(by_face.into_values().collect())
}

fn entry<'a, G: IdResolver>(
    geometry: &G,
    labels: &mut FaceLabels,
    by_face: &'a mut BTreeMap<(i64, FaceId), FaceAnnotateResponse>,
    face_id: FaceId,
) -> OrigamiResult<&'a mut FaceAnnotateResponse> {
    let label = labels.get(geometry, face_id)?;
    Ok(by_face
        .entry((label, face_id))
        .or_insert_with(|| FaceAnnotateResponse {
            id_in_origami: label,
            ..FaceAnnotateResponse::default()
        }))
}

fn fold_diff<G>(geometry: &G, step: &Step, is_forward: bool) -> OrigamiResult<FoldStepResponse>
where
    G: GeometryRepository + IdResolver,
{
    let (shown, hidden) = direction(step, is_forward);
    let mut labels = FaceLabels::default();

    let anchored_face_id_in_origami = step
        .anchored_face_id
        .map(|face_id| labels.get(geometry, face_id))
        .transpose()?;
    let faces = geometry
        .faces_of_origami(step.origami_id, shown)?
        .iter()
        .map(|face| face_geometry(geometry, &mut labels, face, shown))
        .collect::<OrigamiResult<Vec<_>>>()?;
    let deleted_faces = geometry
        .faces_of_origami(step.origami_id, hidden)?
        .into_iter()
        .map(|face| face.id_in_origami)
        .collect();

    Ok(FoldStepResponse {
        anchored_face_id_in_origami,
        faces,
        deleted_faces,
    })
}

/// Complete geometry of `face` as seen through `filter`.
fn face_geometry<G>(
    geometry: &G,
    labels: &mut FaceLabels,
    face: &Face,
    filter: RowFilter,
) -> OrigamiResult<FaceResponse>
where
    G: GeometryRepository + IdResolver,
{
    let mut vertices = Vec::new();
    let mut points = Vec::new();
    for point in geometry.points_of_face(face.id, filter)? {
        match point.kind {
            PointKind::Vertex => vertices.push(VertexResponse {
                id_in_face: point.id_in_face,
                x: point.x,
                y: point.y,
            }),
            PointKind::Annotated { .. } => points.push(point_payload(geometry, &point)?),
        }
    }

    let edge_rows = geometry.edges_of_face(face.id, filter)?;
    if edge_rows.len() != vertices.len() {
        return Err(OrigamiError::consistency_fault(format!(
            "face {} has {} edges for {} vertices",
            face.id_in_origami,
            edge_rows.len(),
            vertices.len()
        )));
    }
    let mut edges = Vec::with_capacity(edge_rows.len());
    for (index, edge) in edge_rows.iter().enumerate() {
        if edge.id_in_face(face.id) != Some(index as i64) {
            return Err(OrigamiError::consistency_fault(format!(
                "face {} is missing edge {index}",
                face.id_in_origami
            )));
        }
        let slot = match edge.fold_counterpart(face.id) {
            None => None,
            Some((other_face_id, id_in_other_face, angle)) => Some(FoldEdgePayload {
                id_in_other_face,
                other_face_id_in_origami: labels.get(geometry, other_face_id)?,
                angle,
            }),
        };
        edges.push(slot);
    }

    let lines = geometry
        .lines_of_face(face.id, filter)?
        .iter()
        .map(|line| line_payload(geometry, line))
        .collect::<OrigamiResult<Vec<_>>>()?;

    Ok(FaceResponse {
        id_in_origami: face.id_in_origami,
        vertices,
        edges,
        annotations: AnnotationSet {
            points,
            lines,
            ..AnnotationSet::default()
        },
    })
}

fn point_payload<G>(geometry: &G, point: &Point) -> OrigamiResult<PointPayload>
where
    G: GeometryRepository,
{
    let on_edge_id_in_face = match point.kind {
        PointKind::Annotated {
            on_edge_id: Some(edge_id),
        } => {
            let edge = geometry
                .get_edge(edge_id)
                .map_err(OrigamiError::from_missing)?;
            let index = edge.id_in_face(point.face_id).ok_or_else(|| {
                OrigamiError::consistency_fault(format!(
                    "point {} sits on edge {edge_id}, which does not bound its face",
                    point.id_in_face
                ))
            })?;
            Some(index)
        }
        _ => None,
    };

    Ok(PointPayload {
        id_in_face: point.id_in_face,
        x: point.x,
        y: point.y,
        on_edge_id_in_face,
    })
}

fn line_payload<G: IdResolver>(geometry: &G, line: &Line) -> OrigamiResult<LinePayload> {
    Ok(LinePayload {
        id_in_face: line.id_in_face,
        point1_id_in_origami: geometry
            .point_id_in_face(line.point1_id)
            .map_err(OrigamiError::from_missing)?,
        point2_id_in_origami: geometry
            .point_id_in_face(line.point2_id)
            .map_err(OrigamiError::from_missing)?,
    })
}

/// Memoized reverse lookup of face `idInOrigami`.
#[derive(Default)]
struct FaceLabels {
    known: HashMap<FaceId, i64>,
}

impl FaceLabels {
    fn get<G: IdResolver>(&mut self, geometry: &G, face_id: FaceId) -> OrigamiResult<i64> {
        if let Some(label) = self.known.get(&face_id) {
            return Ok(*label);
        }
        let label = geometry
            .face_id_in_origami(face_id)
            .map_err(OrigamiError::from_missing)?;
        self.known.insert(face_id, label);
        Ok(label)
    }
}
