//! Fold engine: retires faces and creates their replacements in one step.
//!
//! # Responsibility
//! - Validate the shape of a fold request before touching storage.
//! - Retire the requested faces with their points, edges and lines.
//! - Create new faces with vertices and a closed edge cycle, then run the
//!   embedded annotation pass bound to the same step.
//!
//! # Invariants
//! - Edge `i` of an N-gon joins vertex `i` and vertex `(i + 1) % N`.
//! - A fold edge shared by two new faces is stored once.
//! - A live face that shared a fold edge with a retired face gets that edge
//!   slot refilled by one of the new faces in the same step.
//! - Callers run this inside one transaction; any error rolls it all back.

use crate::model::geometry::{EdgeKind, FaceId, PointId, PointKind};
use crate::model::payload::{FaceAnnotateRequest, FoldRequest, NewFaceRequest};
use crate::model::step::{OrigamiId, StepId, StepType};
use crate::repo::geometry_repo::{GeometryRepository, RowFilter};
use crate::repo::resolver::IdResolver;
use crate::repo::step_repo::StepRepository;
use crate::service::annotation::{annotate, AnnotationCounts};
use crate::service::error::{found, OrigamiError, OrigamiResult};
use crate::service::invariants::check_face_invariants;
use crate::service::ledger::create_step;
use std::collections::{HashMap, HashSet};

/// Minimum corners of a face.
pub const MIN_FACE_VERTICES: usize = 3;

/// Rows retired while retiring a set of faces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetirementCounts {
    pub faces: usize,
    pub points: usize,
    /// Edges bounding each retired face; a shared fold edge counts per face.
    pub edges: usize,
    pub lines: usize,
}

/// Summary of a committed fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldOutcome {
    pub step_id: StepId,
    pub retired: RetirementCounts,
    /// `(id_in_origami, durable id)` of every new face, in request order.
    pub created_faces: Vec<(i64, FaceId)>,
    pub annotations: AnnotationCounts,
}

/// Fold edge slot of a surviving face, freed by retiring its neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OpenSlot {
    pub face_id: FaceId,
    pub face_id_in_origami: i64,
    pub id_in_face: i64,
}

/// Runs a fold request. Must be called inside the caller's transaction.
pub fn fold<S, G>(steps: &S, geometry: &G, request: &FoldRequest) -> OrigamiResult<FoldOutcome>
where
    S: StepRepository,
    G: GeometryRepository + IdResolver,
{
    validate_fold_request(request)?;

    let origami_id = request.origami_id;
    let step_id = create_step(steps, origami_id, StepType::Fold, request.step_id_in_origami)?;
    let open_slots = neighbour_slots(geometry, origami_id, &request.deleted_faces)?;
    let retired = retire_faces(geometry, origami_id, step_id, &request.deleted_faces)?;
    let created_faces = create_faces(geometry, origami_id, step_id, &request.faces, &open_slots)?;

    let anchored = found(geometry.resolve_face(origami_id, request.anchored_face_id_in_origami))?
        .ok_or_else(|| {
            OrigamiError::invalid_request(format!(
                "unknown anchored face {}",
                request.anchored_face_id_in_origami
            ))
        })?;
    steps.record_anchored_face(step_id, anchored)?;

    let embedded: Vec<FaceAnnotateRequest> = request
        .faces
        .iter()
        .filter_map(|face| {
            face.annotations
                .as_ref()
                .filter(|set| !set.is_empty())
                .map(|set| FaceAnnotateRequest {
                    id_in_origami: face.id_in_origami,
                    annotations: set.clone(),
                })
        })
        .collect();
    let (_, annotations) = annotate(
        steps,
        geometry,
        origami_id,
        request.step_id_in_origami,
        &embedded,
        Some(step_id),
    )?;

    let mut touched: Vec<FaceId> = created_faces.iter().map(|(_, face_id)| *face_id).collect();
    for slot in &open_slots {
        if !touched.contains(&slot.face_id) {
            touched.push(slot.face_id);
        }
    }
    for face_id in touched {
        check_face_invariants(geometry, face_id)?;
    }

    Ok(FoldOutcome {
        step_id,
        retired,
        created_faces,
        annotations,
    })
}

/// Rejects malformed new-face requests before any row is written.
pub fn validate_fold_request(request: &FoldRequest) -> OrigamiResult<()> {
    let mut retiring: HashSet<i64> = HashSet::new();
    for id in &request.deleted_faces {
        if !retiring.insert(*id) {
            return Err(OrigamiError::invalid_request(format!(
                "face {id} listed twice in deleted faces"
            )));
        }
    }

    let mut by_id: HashMap<i64, &NewFaceRequest> = HashMap::new();
    for face in &request.faces {
        if by_id.insert(face.id_in_origami, face).is_some() {
            return Err(OrigamiError::invalid_request(format!(
                "duplicate face {} in fold request",
                face.id_in_origami
            )));
        }
    }

    for face in &request.faces {
        let label = face.id_in_origami;
        if face.vertices.len() < MIN_FACE_VERTICES {
            return Err(OrigamiError::invalid_request(format!(
                "face {label} has {} vertices, at least {MIN_FACE_VERTICES} required",
                face.vertices.len()
            )));
        }
        if face.edges.len() != face.vertices.len() {
            return Err(OrigamiError::invalid_request(format!(
                "face {label} has {} edge slots for {} vertices",
                face.edges.len(),
                face.vertices.len()
            )));
        }
        if face
            .annotations
            .as_ref()
            .is_some_and(|set| set.has_deletions())
        {
            return Err(OrigamiError::invalid_request(format!(
                "face {label} is new in this fold and has nothing to delete"
            )));
        }

        for (index, edge) in face.edges.iter().enumerate() {
            let Some(edge) = edge else {
                continue;
            };
            let other_label = edge.other_face_id_in_origami;
            if other_label == label {
                return Err(OrigamiError::invalid_request(format!(
                    "fold edge {index} of face {label} references its own face"
                )));
            }
            let Some(other) = by_id.get(&other_label) else {
                // Links to surviving faces are matched against storage in `create_faces`.
                if retiring.contains(&other_label) {
                    return Err(OrigamiError::invalid_request(format!(
                        "fold edge {index} of face {label} references face {other_label}, which this fold retires"
                    )));
                }
                continue;
            };
            let back = usize::try_from(edge.id_in_other_face)
                .ok()
                .and_then(|slot| other.edges.get(slot))
                .copied()
                .flatten();
            let Some(back) = back.filter(|back| {
                back.other_face_id_in_origami == label && back.id_in_other_face == index as i64
            }) else {
                return Err(OrigamiError::invalid_request(format!(
                    "unmatched fold edge: face {label} edge {index} points to face {other_label} edge {}, which does not point back",
                    edge.id_in_other_face
                )));
            };
            if back.angle != edge.angle {
                return Err(OrigamiError::invalid_request(format!(
                    "fold edge angle mismatch: face {label} edge {index} has {}, face {other_label} edge {} has {}",
                    edge.angle, edge.id_in_other_face, back.angle
                )));
            }
        }
    }
    Ok(())
}

/// Lists the fold edge slots that retiring `face_ids` frees on faces that
/// stay live. Must run before the faces are retired.
pub(crate) fn neighbour_slots<G>(
    geometry: &G,
    origami_id: OrigamiId,
    face_ids: &[i64],
) -> OrigamiResult<Vec<OpenSlot>>
where
    G: GeometryRepository + IdResolver,
{
    let mut retiring = Vec::with_capacity(face_ids.len());
    for id in face_ids {
        let face_id = found(geometry.resolve_face(origami_id, *id))?.ok_or_else(|| {
            OrigamiError::invalid_request(format!("unknown face {id} in deleted faces"))
        })?;
        retiring.push(face_id);
    }

    let mut slots = Vec::new();
    for face_id in &retiring {
        for edge in geometry.edges_of_face(*face_id, RowFilter::Live)? {
            let Some((other, id_in_face, _)) = edge.fold_counterpart(*face_id) else {
                continue;
            };
            if retiring.contains(&other) {
                continue;
            }
            let face_id_in_origami =
                geometry.face_id_in_origami(other).map_err(OrigamiError::from_missing)?;
            slots.push(OpenSlot {
                face_id: other,
                face_id_in_origami,
                id_in_face,
            });
        }
    }
    Ok(slots)
}

/// Retires faces by `idInOrigami` and cascades to their geometry.
pub fn retire_faces<G>(
    geometry: &G,
    origami_id: OrigamiId,
    step_id: StepId,
    face_ids: &[i64],
) -> OrigamiResult<RetirementCounts>
where
    G: GeometryRepository + IdResolver,
{
    let mut counts = RetirementCounts::default();
    for id in face_ids {
        let face_id = found(geometry.resolve_face(origami_id, *id))?.ok_or_else(|| {
            OrigamiError::invalid_request(format!("unknown face {id} in deleted faces"))
        })?;

        counts.faces += geometry.retire_face(face_id, step_id)?;
        geometry.retire_face_edges(face_id, step_id)?;
        counts.edges += geometry
            .edges_of_face(face_id, RowFilter::RetiredAt(step_id))?
            .len();
        counts.points += geometry.retire_face_points(face_id, step_id)?;
        counts.lines += geometry.retire_face_lines(face_id, step_id)?;
    }

    let requested = face_ids.len();
    if counts.faces != requested {
        return Err(OrigamiError::consistency_fault(format!(
            "retired {} faces for {requested} requested",
            counts.faces
        )));
    }
    if counts.points < MIN_FACE_VERTICES * requested {
        return Err(OrigamiError::consistency_fault(format!(
            "retired {} points for {requested} faces",
            counts.points
        )));
    }
    if counts.edges < MIN_FACE_VERTICES * requested {
        return Err(OrigamiError::consistency_fault(format!(
            "retired {} edges for {requested} faces",
            counts.edges
        )));
    }
    Ok(counts)
}

/// Creates faces with their vertices and edges; no annotations.
///
/// Fold edges naming a face outside `faces` must fill one of `open_slots`,
/// and every open slot must be filled.
///
/// Expects a request already accepted by [`validate_fold_request`].
pub(crate) fn create_faces<G>(
    geometry: &G,
    origami_id: OrigamiId,
    step_id: StepId,
    faces: &[NewFaceRequest],
    open_slots: &[OpenSlot],
) -> OrigamiResult<Vec<(i64, FaceId)>>
where
    G: GeometryRepository + IdResolver,
{
    let mut created: Vec<(FaceId, &NewFaceRequest, Vec<PointId>)> = Vec::with_capacity(faces.len());
    for face in faces {
        if found(geometry.resolve_face(origami_id, face.id_in_origami))?.is_some() {
            return Err(OrigamiError::invalid_request(format!(
                "duplicate face: face {} is still live",
                face.id_in_origami
            )));
        }

        let face_id = geometry.insert_face(origami_id, face.id_in_origami, step_id)?;
        let mut vertex_ids = Vec::with_capacity(face.vertices.len());
        for (index, vertex) in face.vertices.iter().enumerate() {
            vertex_ids.push(geometry.insert_point(
                face_id,
                step_id,
                PointKind::Vertex,
                vertex.x,
                vertex.y,
                index as i64,
            )?);
        }
        created.push((face_id, face, vertex_ids));
    }

    let face_by_label: HashMap<i64, FaceId> = created
        .iter()
        .map(|(face_id, face, _)| (face.id_in_origami, *face_id))
        .collect();
    let mut folds_written: HashSet<(i64, i64)> = HashSet::new();
    let mut claimed = vec![false; open_slots.len()];

    for (face_id, face, vertex_ids) in &created {
        let count = vertex_ids.len();
        for (index, slot) in face.edges.iter().enumerate() {
            let kind = match slot {
                None => EdgeKind::Side {
                    vertex1_id: vertex_ids[index],
                    vertex2_id: vertex_ids[(index + 1) % count],
                    face_id: *face_id,
                    id_in_face: index as i64,
                },
                Some(fold_edge) => {
                    if folds_written.contains(&(face.id_in_origami, index as i64)) {
                        continue;
                    }
                    let other_label = fold_edge.other_face_id_in_origami;
                    let other_face_id = match face_by_label.get(&other_label) {
                        Some(other_face_id) => *other_face_id,
                        None => {
                            let position = open_slots
                                .iter()
                                .position(|slot| {
                                    slot.face_id_in_origami == other_label
                                        && slot.id_in_face == fold_edge.id_in_other_face
                                })
                                .ok_or_else(|| {
                                    OrigamiError::invalid_request(format!(
                                        "fold edge {index} of face {} names edge {} of face {other_label}, which this fold does not free",
                                        face.id_in_origami, fold_edge.id_in_other_face
                                    ))
                                })?;
                            if std::mem::replace(&mut claimed[position], true) {
                                return Err(OrigamiError::invalid_request(format!(
                                    "edge {} of face {other_label} is claimed twice",
                                    fold_edge.id_in_other_face
                                )));
                            }
                            open_slots[position].face_id
                        }
                    };
                    folds_written.insert((other_label, fold_edge.id_in_other_face));
                    EdgeKind::Fold {
                        face1_id: *face_id,
                        face2_id: other_face_id,
                        angle: fold_edge.angle,
                        id_in_face1: index as i64,
                        id_in_face2: fold_edge.id_in_other_face,
                    }
                }
            };
            geometry.insert_edge(step_id, &kind)?;
        }
    }

    if let Some(slot) = claimed
        .iter()
        .zip(open_slots)
        .find_map(|(done, slot)| (!done).then_some(slot))
    {
        return Err(OrigamiError::invalid_request(format!(
            "fold leaves edge {} of face {} open",
            slot.id_in_face, slot.face_id_in_origami
        )));
    }

    Ok(created
        .into_iter()
        .map(|(face_id, face, _)| (face.id_in_origami, face_id))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::validate_fold_request;
    use crate::model::payload::{
        AnnotationSet, FoldEdgePayload, FoldRequest, NewFaceRequest, VertexRequest,
    };
    use uuid::Uuid;

    fn triangle(id: i64, edges: Vec<Option<FoldEdgePayload>>) -> NewFaceRequest {
        NewFaceRequest {
            id_in_origami: id,
            vertices: vec![
                VertexRequest { x: 0.0, y: 0.0 },
                VertexRequest { x: 1.0, y: 0.0 },
                VertexRequest { x: 0.0, y: 1.0 },
            ],
            edges,
            annotations: None,
        }
    }

    fn request(faces: Vec<NewFaceRequest>) -> FoldRequest {
        FoldRequest {
            origami_id: Uuid::new_v4(),
            step_id_in_origami: 1,
            anchored_face_id_in_origami: 1,
            faces,
            deleted_faces: vec![0],
        }
    }

    fn fold_to(face: i64, edge: i64) -> Option<FoldEdgePayload> {
        Some(FoldEdgePayload {
            id_in_other_face: edge,
            other_face_id_in_origami: face,
            angle: 180.0,
        })
    }

    #[test]
    fn accepts_mutual_fold_edges() {
        let faces = vec![
            triangle(1, vec![None, None, fold_to(2, 0)]),
            triangle(2, vec![fold_to(1, 2), None, None]),
        ];
        validate_fold_request(&request(faces)).unwrap();
    }

    #[test]
    fn rejects_one_sided_fold_edge() {
        let faces = vec![
            triangle(1, vec![None, None, fold_to(2, 0)]),
            triangle(2, vec![None, None, None]),
        ];
        let err = validate_fold_request(&request(faces)).unwrap_err();
        assert!(err.to_string().contains("unmatched fold edge"));
    }

    #[test]
    fn rejects_degenerate_and_misaligned_faces() {
        let mut flat = triangle(1, vec![None, None]);
        flat.vertices.pop();
        assert!(validate_fold_request(&request(vec![flat]))
            .unwrap_err()
            .is_invalid_request());

        let misaligned = triangle(1, vec![None, None]);
        let err = validate_fold_request(&request(vec![misaligned])).unwrap_err();
        assert!(err.to_string().contains("edge slots"));
    }

    #[test]
    fn rejects_deletions_in_new_face_annotations() {
        let mut face = triangle(1, vec![None, None, None]);
        face.annotations = Some(AnnotationSet {
            deleted_points: vec![5],
            ..AnnotationSet::default()
        });
        assert!(validate_fold_request(&request(vec![face]))
            .unwrap_err()
            .is_invalid_request());
    }

    #[test]
    fn rejects_fold_edge_to_face_being_retired() {
        let faces = vec![triangle(1, vec![fold_to(0, 0), None, None])];
        let err = validate_fold_request(&request(faces)).unwrap_err();
        assert!(err.is_invalid_request());
        assert!(err.to_string().contains("retires"));
    }

    #[test]
    fn defers_fold_edge_to_surviving_face() {
        let faces = vec![triangle(1, vec![fold_to(7, 0), None, None])];
        validate_fold_request(&request(faces)).unwrap();
    }

    #[test]
    fn rejects_mismatched_fold_angles() {
        let mut back = fold_to(1, 2);
        if let Some(edge) = back.as_mut() {
            edge.angle = -45.0;
        }
        let faces = vec![
            triangle(1, vec![None, None, fold_to(2, 0)]),
            triangle(2, vec![back, None, None]),
        ];
        let err = validate_fold_request(&request(faces)).unwrap_err();
        assert!(err.is_invalid_request());
        assert!(err.to_string().contains("angle mismatch"));
    }

    #[test]
    fn rejects_repeated_deleted_face() {
        let mut twice = request(vec![triangle(1, vec![None, None, None])]);
        twice.deleted_faces = vec![0, 0];
        let err = validate_fold_request(&twice).unwrap_err();
        assert!(err.to_string().contains("listed twice"));
    }
}
