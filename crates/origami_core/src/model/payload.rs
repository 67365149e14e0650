//! Caller-facing request and response payloads.
//!
//! Every identifier in this module is scoped (`idInOrigami`, `idInFace`);
//! translation to durable ids happens inside the services. JSON field names
//! are camelCase.

use crate::model::step::{OrigamiId, StepType};
use serde::{Deserialize, Serialize};

/// Point annotation, as submitted and as replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointPayload {
    pub id_in_face: i64,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_edge_id_in_face: Option<i64>,
}

/// Line annotation between two points of the same face.
///
/// The endpoint fields carry the points' `idInFace` values; the wire names
/// are kept for client compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinePayload {
    pub id_in_face: i64,
    pub point1_id_in_origami: i64,
    pub point2_id_in_origami: i64,
}

/// Additions and deletions applied to one face.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationSet {
    #[serde(default)]
    pub points: Vec<PointPayload>,
    #[serde(default)]
    pub lines: Vec<LinePayload>,
    #[serde(default)]
    pub deleted_points: Vec<i64>,
    #[serde(default)]
    pub deleted_lines: Vec<i64>,
}

impl AnnotationSet {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
            && self.lines.is_empty()
            && self.deleted_points.is_empty()
            && self.deleted_lines.is_empty()
    }

    pub fn has_deletions(&self) -> bool {
        !self.deleted_points.is_empty() || !self.deleted_lines.is_empty()
    }
}

/// Per-face annotation request body.
pub type AnnotateRequest = AnnotationSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceAnnotateRequest {
    pub id_in_origami: i64,
    pub annotations: AnnotateRequest,
}

/// Top-level annotate command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateOrigamiRequest {
    pub origami_id: OrigamiId,
    pub step_id_in_origami: i64,
    pub faces: Vec<FaceAnnotateRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VertexRequest {
    pub x: f64,
    pub y: f64,
}

/// Fold-edge data at one edge position of a new face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoldEdgePayload {
    pub id_in_other_face: i64,
    pub other_face_id_in_origami: i64,
    pub angle: f64,
}

/// One face created by a fold.
///
/// `edges[i]` describes the edge from vertex `i` to vertex `(i + 1) % N`;
/// `None` means a plain side edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFaceRequest {
    pub id_in_origami: i64,
    pub vertices: Vec<VertexRequest>,
    pub edges: Vec<Option<FoldEdgePayload>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<AnnotateRequest>,
}

/// Top-level fold command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoldRequest {
    pub origami_id: OrigamiId,
    pub step_id_in_origami: i64,
    pub anchored_face_id_in_origami: i64,
    pub faces: Vec<NewFaceRequest>,
    #[serde(default)]
    pub deleted_faces: Vec<i64>,
}

/// Annotation diff for one face touched by an annotate step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceAnnotateResponse {
    pub id_in_origami: i64,
    pub points: Vec<PointPayload>,
    pub lines: Vec<LinePayload>,
    pub deleted_points: Vec<i64>,
    pub deleted_lines: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VertexResponse {
    pub id_in_face: i64,
    pub x: f64,
    pub y: f64,
}

/// Complete geometry of one face, shaped like [`NewFaceRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceResponse {
    pub id_in_origami: i64,
    pub vertices: Vec<VertexResponse>,
    pub edges: Vec<Option<FoldEdgePayload>>,
    pub annotations: AnnotationSet,
}

/// Face-level diff of a create or fold step in one playback direction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoldStepResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchored_face_id_in_origami: Option<i64>,
    /// Faces to show.
    pub faces: Vec<FaceResponse>,
    /// Faces to hide, by `idInOrigami`.
    pub deleted_faces: Vec<i64>,
}

/// Replay result for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResponse {
    pub step_type: StepType,
    pub is_forward: bool,
    pub annotations: Vec<FaceAnnotateResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fold_forward: Option<FoldStepResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fold_backward: Option<FoldStepResponse>,
}
