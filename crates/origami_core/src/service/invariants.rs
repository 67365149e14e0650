//! Structural checks on live faces.

use crate::model::geometry::{EdgeKind, FaceId};
use crate::repo::geometry_repo::{GeometryRepository, RowFilter};
use crate::service::error::{OrigamiError, OrigamiResult};
use crate::service::fold::MIN_FACE_VERTICES;

/// Verifies that a live face is a closed polygon.
///
/// # Checks
/// - At least three live vertices, indexed `0..N` without gaps.
/// - Exactly N live edges, indexed `0..N` from the face's side.
/// - Side edge `i` joins vertex `i` and vertex `(i + 1) % N`.
///
/// Any violation is a `ConsistencyFault`: it can only come from stored data.
pub fn check_face_invariants<G: GeometryRepository>(
    geometry: &G,
    face_id: FaceId,
) -> OrigamiResult<()> {
    let vertices: Vec<_> = geometry
        .points_of_face(face_id, RowFilter::Live)?
        .into_iter()
        .filter(|point| point.is_vertex())
        .collect();
    let count = vertices.len();
    if count < MIN_FACE_VERTICES {
        return Err(OrigamiError::consistency_fault(format!(
            "face {face_id} has {count} live vertices"
        )));
    }
    for (index, vertex) in vertices.iter().enumerate() {
        if vertex.id_in_face != index as i64 {
            return Err(OrigamiError::consistency_fault(format!(
                "face {face_id} vertex at position {index} has index {}",
                vertex.id_in_face
            )));
        }
    }

    let edges = geometry.edges_of_face(face_id, RowFilter::Live)?;
    if edges.len() != count {
        return Err(OrigamiError::consistency_fault(format!(
            "face {face_id} has {} live edges for {count} vertices",
            edges.len()
        )));
    }
    for (index, edge) in edges.iter().enumerate() {
        if edge.id_in_face(face_id) != Some(index as i64) {
            return Err(OrigamiError::consistency_fault(format!(
                "face {face_id} edge at position {index} has index {:?}",
                edge.id_in_face(face_id)
            )));
        }
        if let EdgeKind::Side {
            vertex1_id,
            vertex2_id,
            ..
        } = &edge.kind
        {
            if *vertex1_id != vertices[index].id || *vertex2_id != vertices[(index + 1) % count].id
            {
                return Err(OrigamiError::consistency_fault(format!(
                    "face {face_id} side edge {index} does not join vertices {index} and {}",
                    (index + 1) % count
                )));
            }
        }
    }
    Ok(())
}
