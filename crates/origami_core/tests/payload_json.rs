use origami_core::db::open_db_in_memory;
use origami_core::{FoldRequest, OrigamiService, StepResponse};
use serde_json::{json, Value};

#[test]
fn fold_request_parses_camel_case_with_null_edges() {
    let origami_id = uuid::Uuid::new_v4();
    let request: FoldRequest = serde_json::from_value(json!({
        "origamiId": origami_id,
        "stepIdInOrigami": 1,
        "anchoredFaceIdInOrigami": 1,
        "faces": [{
            "idInOrigami": 1,
            "vertices": [{"x": 0.0, "y": 0.0}, {"x": 1.0, "y": 0.0}, {"x": 0.0, "y": 1.0}],
            "edges": [null, null, {"idInOtherFace": 0, "otherFaceIdInOrigami": 2, "angle": 90.0}],
            "annotations": {"points": [{"idInFace": 3, "x": 0.2, "y": 0.2}]}
        }],
        "deletedFaces": [0]
    }))
    .unwrap();

    assert_eq!(request.origami_id, origami_id);
    let face = &request.faces[0];
    assert_eq!(face.edges[0], None);
    assert_eq!(face.edges[2].unwrap().other_face_id_in_origami, 2);
    let annotations = face.annotations.as_ref().unwrap();
    assert_eq!(annotations.points[0].on_edge_id_in_face, None);
    assert!(annotations.lines.is_empty() && annotations.deleted_points.is_empty());
}

#[test]
fn create_step_serializes_with_scoped_ids_only() {
    let conn = open_db_in_memory().unwrap();
    let (_, created) = OrigamiService::new(&conn).create_origami().unwrap();

    let value = serde_json::to_value(&created).unwrap();
    assert_eq!(value["stepType"], "create");
    assert_eq!(value["isForward"], true);
    assert_eq!(value["annotations"], json!([]));
    assert!(value.get("foldBackward").is_none());

    let face = &value["foldForward"]["faces"][0];
    assert_eq!(face["idInOrigami"], 0);
    assert_eq!(face["vertices"][1], json!({"idInFace": 1, "x": 3.0, "y": -3.0}));
    assert_eq!(face["edges"], json!([null, null, null, null]));
    assert!(value["foldForward"].get("anchoredFaceIdInOrigami").is_none());

    assert!(!contains_uuid(&value), "durable ids leaked: {value}");

    let back: StepResponse = serde_json::from_value(value).unwrap();
    assert_eq!(back, created);
}

fn contains_uuid(value: &Value) -> bool {
    match value {
        Value::String(text) => uuid::Uuid::parse_str(text).is_ok(),
        Value::Array(items) => items.iter().any(contains_uuid),
        Value::Object(map) => map.values().any(contains_uuid),
        _ => false,
    }
}
