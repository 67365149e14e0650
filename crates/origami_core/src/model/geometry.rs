//! Face-local geometry records: faces, edges, points, lines.
//!
//! # Responsibility
//! - Mirror the rows of the geometry store as plain records.
//! - Navigation between records goes through explicit id fields.
//!
//! # Invariants
//! - `created_step` is fixed at insertion; only `lifecycle` ever changes.
//! - A fold edge carries one face-local index per face it separates.

use crate::model::step::{Lifecycle, OrigamiId, StepId};
use uuid::Uuid;

pub type FaceId = Uuid;
pub type EdgeId = Uuid;
pub type PointId = Uuid;
pub type LineId = Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub id: FaceId,
    pub origami_id: OrigamiId,
    pub id_in_origami: i64,
    pub created_step: StepId,
    pub lifecycle: Lifecycle,
}

/// Edge variants. Side edges belong to one face; fold edges join two.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeKind {
    Side {
        vertex1_id: PointId,
        vertex2_id: PointId,
        face_id: FaceId,
        id_in_face: i64,
    },
    Fold {
        face1_id: FaceId,
        face2_id: FaceId,
        /// Dihedral angle in degrees; both faces report the same value.
        angle: f64,
        id_in_face1: i64,
        id_in_face2: i64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub created_step: StepId,
    pub kind: EdgeKind,
    pub lifecycle: Lifecycle,
}

impl Edge {
    /// Returns this edge's index within `face_id`, if it bounds that face.
    pub fn id_in_face(&self, face_id: FaceId) -> Option<i64> {
        match &self.kind {
            EdgeKind::Side {
                face_id: owner,
                id_in_face,
                ..
            } => (*owner == face_id).then_some(*id_in_face),
            EdgeKind::Fold {
                face1_id,
                face2_id,
                id_in_face1,
                id_in_face2,
                ..
            } => {
                if *face1_id == face_id {
                    Some(*id_in_face1)
                } else if *face2_id == face_id {
                    Some(*id_in_face2)
                } else {
                    None
                }
            }
        }
    }

    /// For a fold edge seen from `face_id`, returns `(other_face, other_index, angle)`.
    pub fn fold_counterpart(&self, face_id: FaceId) -> Option<(FaceId, i64, f64)> {
        match &self.kind {
            EdgeKind::Side { .. } => None,
            EdgeKind::Fold {
                face1_id,
                face2_id,
                angle,
                id_in_face1,
                id_in_face2,
            } => {
                if *face1_id == face_id {
                    Some((*face2_id, *id_in_face2, *angle))
                } else if *face2_id == face_id {
                    Some((*face1_id, *id_in_face1, *angle))
                } else {
                    None
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointKind {
    /// Corner of a face; only removable by retiring the face.
    Vertex,
    /// User annotation, optionally pinned to an edge of its face.
    Annotated { on_edge_id: Option<EdgeId> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub id: PointId,
    pub created_step: StepId,
    pub face_id: FaceId,
    pub kind: PointKind,
    pub x: f64,
    pub y: f64,
    pub id_in_face: i64,
    pub lifecycle: Lifecycle,
}

impl Point {
    pub fn is_vertex(&self) -> bool {
        matches!(self.kind, PointKind::Vertex)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub id: LineId,
    pub created_step: StepId,
    pub face_id: FaceId,
    pub point1_id: PointId,
    pub point2_id: PointId,
    pub id_in_face: i64,
    pub lifecycle: Lifecycle,
}

#[cfg(test)]
mod tests {
    use super::{Edge, EdgeKind};
    use crate::model::step::Lifecycle;
    use uuid::Uuid;

    #[test]
    fn fold_edge_reports_index_per_face() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let edge = Edge {
            id: Uuid::new_v4(),
            created_step: Uuid::new_v4(),
            kind: EdgeKind::Fold {
                face1_id: a,
                face2_id: b,
                angle: 180.0,
                id_in_face1: 2,
                id_in_face2: 0,
            },
            lifecycle: Lifecycle::Active,
        };

        assert_eq!(edge.id_in_face(a), Some(2));
        assert_eq!(edge.id_in_face(b), Some(0));
        assert_eq!(edge.id_in_face(Uuid::new_v4()), None);
        assert_eq!(edge.fold_counterpart(b), Some((a, 2, 180.0)));
    }

    #[test]
    fn side_edge_only_belongs_to_owner() {
        let owner = Uuid::new_v4();
        let edge = Edge {
            id: Uuid::new_v4(),
            created_step: Uuid::new_v4(),
            kind: EdgeKind::Side {
                vertex1_id: Uuid::new_v4(),
                vertex2_id: Uuid::new_v4(),
                face_id: owner,
                id_in_face: 3,
            },
            lifecycle: Lifecycle::Active,
        };

        assert_eq!(edge.id_in_face(owner), Some(3));
        assert_eq!(edge.id_in_face(Uuid::new_v4()), None);
        assert_eq!(edge.fold_counterpart(owner), None);
    }
}
