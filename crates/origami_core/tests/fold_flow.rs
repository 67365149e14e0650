use origami_core::db::open_db_in_memory;
use origami_core::{
    AnnotateOrigamiRequest, AnnotationSet, FaceAnnotateRequest, FoldEdgePayload, FoldRequest,
    LinePayload, NewFaceRequest, OrigamiId, OrigamiService, PointPayload, VertexRequest,
};
use rusqlite::Connection;

fn vertex(x: f64, y: f64) -> VertexRequest {
    VertexRequest { x, y }
}

fn fold_to(face: i64, edge: i64) -> Option<FoldEdgePayload> {
    Some(FoldEdgePayload {
        id_in_other_face: edge,
        other_face_id_in_origami: face,
        angle: 180.0,
    })
}

/// Splits the initial square along the (-3,-3)-(3,3) diagonal into faces 1 and 2.
fn diagonal_fold(origami_id: OrigamiId, step: i64) -> FoldRequest {
    FoldRequest {
        origami_id,
        step_id_in_origami: step,
        anchored_face_id_in_origami: 1,
        faces: vec![
            NewFaceRequest {
                id_in_origami: 1,
                vertices: vec![vertex(-3.0, -3.0), vertex(3.0, -3.0), vertex(3.0, 3.0)],
                edges: vec![None, None, fold_to(2, 0)],
                annotations: None,
            },
            NewFaceRequest {
                id_in_origami: 2,
                vertices: vec![vertex(-3.0, -3.0), vertex(3.0, 3.0), vertex(-3.0, 3.0)],
                edges: vec![fold_to(1, 2), None, None],
                annotations: None,
            },
        ],
        deleted_faces: vec![0],
    }
}

/// Splits face 1 from (3,3) to (0,-3) into faces 3 and 4; face 2 stays live.
fn split_face_one(origami_id: OrigamiId, step: i64) -> FoldRequest {
    FoldRequest {
        origami_id,
        step_id_in_origami: step,
        anchored_face_id_in_origami: 3,
        faces: vec![
            NewFaceRequest {
                id_in_origami: 3,
                vertices: vec![vertex(-3.0, -3.0), vertex(0.0, -3.0), vertex(3.0, 3.0)],
                edges: vec![None, fold_to(4, 2), fold_to(2, 0)],
                annotations: None,
            },
            NewFaceRequest {
                id_in_origami: 4,
                vertices: vec![vertex(0.0, -3.0), vertex(3.0, -3.0), vertex(3.0, 3.0)],
                edges: vec![None, None, fold_to(3, 1)],
                annotations: None,
            },
        ],
        deleted_faces: vec![1],
    }
}

fn live_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(
        &format!("SELECT COUNT(*) FROM {table} WHERE deleted_step IS NULL;"),
        [],
        |row| row.get(0),
    )
    .unwrap()
}

fn total_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn diagonal_fold_replaces_square_with_two_triangles() {
    let conn = open_db_in_memory().unwrap();
    let service = OrigamiService::new(&conn);
    let (origami_id, _) = service.create_origami().unwrap();

    let outcome = service.fold(&diagonal_fold(origami_id, 1)).unwrap();
    assert_eq!(outcome.retired.faces, 1);
    assert_eq!(outcome.retired.points, 4);
    assert_eq!(outcome.retired.edges, 4);
    assert_eq!(outcome.retired.lines, 0);
    let created: Vec<i64> = outcome.created_faces.iter().map(|(id, _)| *id).collect();
    assert_eq!(created, vec![1, 2]);

    let faces = service.live_faces(origami_id).unwrap();
    let ids: Vec<i64> = faces.iter().map(|face| face.id_in_origami).collect();
    assert_eq!(ids, vec![1, 2]);
    for face in &faces {
        assert_eq!(face.vertices.len(), 3);
        assert_eq!(face.edges.len(), 3);
    }
    assert_eq!(faces[0].edges[2], fold_to(2, 0));
    assert_eq!(faces[1].edges[0], fold_to(1, 2));

    // One shared fold edge row: 2 sides + 2 sides + 1 fold.
    assert_eq!(live_count(&conn, "faces"), 2);
    assert_eq!(live_count(&conn, "edges"), 5);
    assert_eq!(live_count(&conn, "points"), 6);

    let face0_live_rows: i64 = conn
        .query_row(
            "SELECT
                (SELECT COUNT(*) FROM points p JOIN faces f ON p.face_id = f.id
                  WHERE f.id_in_origami = 0 AND p.deleted_step IS NULL)
              + (SELECT COUNT(*) FROM edges e JOIN faces f ON e.face_id = f.id
                  WHERE f.id_in_origami = 0 AND e.deleted_step IS NULL);",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(face0_live_rows, 0);
}

#[test]
fn fold_records_anchored_face_on_its_step() {
    let conn = open_db_in_memory().unwrap();
    let service = OrigamiService::new(&conn);
    let (origami_id, _) = service.create_origami().unwrap();
    let outcome = service.fold(&diagonal_fold(origami_id, 1)).unwrap();

    let steps = service.list_steps(origami_id).unwrap();
    let fold_step = steps.iter().find(|step| step.id == outcome.step_id).unwrap();
    let anchored = outcome
        .created_faces
        .iter()
        .find(|(id, _)| *id == 1)
        .map(|(_, face_id)| *face_id);
    assert_eq!(fold_step.anchored_face_id, anchored);
    assert_eq!(steps[0].anchored_face_id, None);
}

#[test]
fn retiring_annotated_face_cascades_to_points_and_lines() {
    let conn = open_db_in_memory().unwrap();
    let service = OrigamiService::new(&conn);
    let (origami_id, _) = service.create_origami().unwrap();
    service
        .annotate(&AnnotateOrigamiRequest {
            origami_id,
            step_id_in_origami: 1,
            faces: vec![FaceAnnotateRequest {
                id_in_origami: 0,
                annotations: AnnotationSet {
                    points: vec![PointPayload {
                        id_in_face: 10,
                        x: 1.0,
                        y: 1.0,
                        on_edge_id_in_face: None,
                    }],
                    lines: vec![LinePayload {
                        id_in_face: 1,
                        point1_id_in_origami: 10,
                        point2_id_in_origami: 3,
                    }],
                    ..AnnotationSet::default()
                },
            }],
        })
        .unwrap();

    let outcome = service.fold(&diagonal_fold(origami_id, 2)).unwrap();
    assert_eq!(outcome.retired.points, 5);
    assert_eq!(outcome.retired.lines, 1);
    assert_eq!(live_count(&conn, "lines"), 0);
}

#[test]
fn embedded_annotations_bind_to_the_fold_step() {
    let conn = open_db_in_memory().unwrap();
    let service = OrigamiService::new(&conn);
    let (origami_id, _) = service.create_origami().unwrap();

    let mut request = diagonal_fold(origami_id, 1);
    request.faces[0].annotations = Some(AnnotationSet {
        points: vec![PointPayload {
            id_in_face: 5,
            x: 0.0,
            y: 0.0,
            on_edge_id_in_face: Some(2),
        }],
        ..AnnotationSet::default()
    });
    let outcome = service.fold(&request).unwrap();
    assert_eq!(outcome.annotations.points_added, 1);

    let steps = service.list_steps(origami_id).unwrap();
    assert_eq!(steps.len(), 2, "embedded annotations must not add a step");

    let faces = service.live_faces(origami_id).unwrap();
    assert_eq!(faces[0].annotations.points[0].on_edge_id_in_face, Some(2));

    // The fold edge is also edge 0 of face 2.
    let on_shared = AnnotateOrigamiRequest {
        origami_id,
        step_id_in_origami: 2,
        faces: vec![FaceAnnotateRequest {
            id_in_origami: 2,
            annotations: AnnotationSet {
                points: vec![PointPayload {
                    id_in_face: 5,
                    x: 1.0,
                    y: 1.0,
                    on_edge_id_in_face: Some(0),
                }],
                ..AnnotationSet::default()
            },
        }],
    };
    service.annotate(&on_shared).unwrap();
    let faces = service.live_faces(origami_id).unwrap();
    assert_eq!(faces[1].annotations.points[0].on_edge_id_in_face, Some(0));
}

#[test]
fn failed_fold_leaves_no_trace() {
    let conn = open_db_in_memory().unwrap();
    let service = OrigamiService::new(&conn);
    let (origami_id, _) = service.create_origami().unwrap();
    let tables = ["steps", "faces", "edges", "points", "lines"];
    let before: Vec<i64> = tables.iter().map(|t| total_count(&conn, t)).collect();
    let live_before: Vec<i64> = tables[1..].iter().map(|t| live_count(&conn, t)).collect();

    // Retirement and face creation run before the anchored face is resolved.
    let mut request = diagonal_fold(origami_id, 1);
    request.anchored_face_id_in_origami = 9;
    let err = service.fold(&request).unwrap_err();
    assert!(err.is_invalid_request());
    assert!(err.to_string().contains("unknown anchored face"));

    let after: Vec<i64> = tables.iter().map(|t| total_count(&conn, t)).collect();
    let live_after: Vec<i64> = tables[1..].iter().map(|t| live_count(&conn, t)).collect();
    assert_eq!(before, after);
    assert_eq!(live_before, live_after);
}

#[test]
fn fold_rejects_unknown_deleted_face_and_live_face_reuse() {
    let conn = open_db_in_memory().unwrap();
    let service = OrigamiService::new(&conn);
    let (origami_id, _) = service.create_origami().unwrap();

    let mut unknown = diagonal_fold(origami_id, 1);
    unknown.deleted_faces = vec![4];
    let err = service.fold(&unknown).unwrap_err();
    assert!(err.to_string().contains("unknown face 4"));

    // Face 0 stays live, so a new face 0 collides with it.
    let mut reuse = diagonal_fold(origami_id, 1);
    reuse.deleted_faces.clear();
    reuse.faces[0].id_in_origami = 0;
    reuse.faces[1].edges[0] = fold_to(0, 2);
    reuse.anchored_face_id_in_origami = 0;
    let err = service.fold(&reuse).unwrap_err();
    assert!(err.is_invalid_request());
    assert!(err.to_string().contains("duplicate face"));
}

#[test]
fn retired_face_index_can_be_reused_by_a_later_fold() {
    let conn = open_db_in_memory().unwrap();
    let service = OrigamiService::new(&conn);
    let (origami_id, _) = service.create_origami().unwrap();
    service.fold(&diagonal_fold(origami_id, 1)).unwrap();

    let merge = FoldRequest {
        origami_id,
        step_id_in_origami: 2,
        anchored_face_id_in_origami: 0,
        faces: vec![NewFaceRequest {
            id_in_origami: 0,
            vertices: vec![
                vertex(-3.0, -3.0),
                vertex(3.0, -3.0),
                vertex(3.0, 3.0),
                vertex(-3.0, 3.0),
            ],
            edges: vec![None; 4],
            annotations: None,
        }],
        deleted_faces: vec![1, 2],
    };
    let outcome = service.fold(&merge).unwrap();
    assert_eq!(outcome.retired.faces, 2);
    // The shared fold edge is counted from both faces.
    assert_eq!(outcome.retired.edges, 6);

    let faces = service.live_faces(origami_id).unwrap();
    assert_eq!(faces.len(), 1);
    assert_eq!(faces[0].id_in_origami, 0);
    assert_eq!(live_count(&conn, "edges"), 4);
}

#[test]
fn malformed_fold_requests_are_rejected_before_storage() {
    let conn = open_db_in_memory().unwrap();
    let service = OrigamiService::new(&conn);
    let (origami_id, _) = service.create_origami().unwrap();

    let mut one_sided = diagonal_fold(origami_id, 1);
    one_sided.faces[1].edges[0] = None;
    let err = service.fold(&one_sided).unwrap_err();
    assert!(err.to_string().contains("unmatched fold edge"));

    let mut with_deletion = diagonal_fold(origami_id, 1);
    with_deletion.faces[0].annotations = Some(AnnotationSet {
        deleted_lines: vec![1],
        ..AnnotationSet::default()
    });
    assert!(service.fold(&with_deletion).unwrap_err().is_invalid_request());

    assert_eq!(service.list_steps(origami_id).unwrap().len(), 1);
}

#[test]
fn folding_one_face_relinks_its_live_neighbour() {
    let conn = open_db_in_memory().unwrap();
    let service = OrigamiService::new(&conn);
    let (origami_id, _) = service.create_origami().unwrap();
    service.fold(&diagonal_fold(origami_id, 1)).unwrap();

    let outcome = service.fold(&split_face_one(origami_id, 2)).unwrap();
    assert_eq!(outcome.retired.faces, 1);
    assert_eq!(outcome.retired.edges, 3);

    let faces = service.live_faces(origami_id).unwrap();
    let ids: Vec<i64> = faces.iter().map(|face| face.id_in_origami).collect();
    assert_eq!(ids, vec![2, 3, 4]);
    for face in &faces {
        assert_eq!(face.edges.len(), 3);
    }
    assert_eq!(faces[0].edges[0], fold_to(3, 2));
    assert_eq!(faces[1].edges[2], fold_to(2, 0));
    assert_eq!(faces[1].edges[1], fold_to(4, 2));

    // Face 2 sides, fold 2-3, face 3 side, fold 3-4, face 4 sides.
    assert_eq!(live_count(&conn, "faces"), 3);
    assert_eq!(live_count(&conn, "edges"), 2 + 1 + 1 + 1 + 2);

    let forward = service.get_step(origami_id, 1, 2, true).unwrap();
    let forward = forward.fold_forward.unwrap();
    let shown: Vec<i64> = forward.faces.iter().map(|face| face.id_in_origami).collect();
    assert_eq!(shown, vec![3, 4]);
    assert_eq!(forward.deleted_faces, vec![1]);
    assert_eq!(forward.anchored_face_id_in_origami, Some(3));

    let backward = service.get_step(origami_id, 2, 1, false).unwrap();
    let backward = backward.fold_backward.unwrap();
    let restored: Vec<i64> = backward.faces.iter().map(|face| face.id_in_origami).collect();
    assert_eq!(restored, vec![1]);
    assert_eq!(backward.faces[0].edges, vec![None, None, fold_to(2, 0)]);
    assert_eq!(backward.deleted_faces, vec![3, 4]);

    // Replaying the first fold still shows face 2 as it was then.
    let first = service.get_step(origami_id, 0, 1, true).unwrap();
    let first = first.fold_forward.unwrap();
    assert_eq!(first.faces[1].edges[0], fold_to(1, 2));
}

#[test]
fn later_fold_can_retire_a_relinked_neighbour() {
    let conn = open_db_in_memory().unwrap();
    let service = OrigamiService::new(&conn);
    let (origami_id, _) = service.create_origami().unwrap();
    service.fold(&diagonal_fold(origami_id, 1)).unwrap();
    service.fold(&split_face_one(origami_id, 2)).unwrap();

    let flatten = FoldRequest {
        origami_id,
        step_id_in_origami: 3,
        anchored_face_id_in_origami: 0,
        faces: vec![NewFaceRequest {
            id_in_origami: 0,
            vertices: vec![
                vertex(-3.0, -3.0),
                vertex(3.0, -3.0),
                vertex(3.0, 3.0),
                vertex(-3.0, 3.0),
            ],
            edges: vec![None; 4],
            annotations: None,
        }],
        deleted_faces: vec![2, 3, 4],
    };
    let outcome = service.fold(&flatten).unwrap();
    assert_eq!(outcome.retired.faces, 3);
    assert_eq!(outcome.retired.edges, 9);
    assert_eq!(live_count(&conn, "edges"), 4);

    let backward = service.get_step(origami_id, 3, 2, false).unwrap();
    let backward = backward.fold_backward.unwrap();
    let restored: Vec<i64> = backward.faces.iter().map(|face| face.id_in_origami).collect();
    assert_eq!(restored, vec![2, 3, 4]);
    for face in &backward.faces {
        assert_eq!(face.edges.len(), 3);
    }
    assert_eq!(backward.faces[0].edges[0], fold_to(3, 2));
    assert_eq!(backward.deleted_faces, vec![0]);
}

#[test]
fn fold_must_refill_every_freed_neighbour_slot() {
    let conn = open_db_in_memory().unwrap();
    let service = OrigamiService::new(&conn);
    let (origami_id, _) = service.create_origami().unwrap();
    service.fold(&diagonal_fold(origami_id, 1)).unwrap();
    let tables = ["steps", "faces", "edges", "points", "lines"];
    let before: Vec<i64> = tables.iter().map(|t| total_count(&conn, t)).collect();

    let mut unlinked = split_face_one(origami_id, 2);
    unlinked.faces[0].edges[2] = None;
    let err = service.fold(&unlinked).unwrap_err();
    assert!(err.is_invalid_request());
    assert!(err.to_string().contains("fold leaves edge 0 of face 2 open"));

    let mut wrong_slot = split_face_one(origami_id, 2);
    wrong_slot.faces[0].edges[2] = fold_to(2, 1);
    let err = service.fold(&wrong_slot).unwrap_err();
    assert!(err.to_string().contains("does not free"));

    let mut to_retired = split_face_one(origami_id, 2);
    to_retired.faces[0].edges[2] = fold_to(1, 2);
    let err = service.fold(&to_retired).unwrap_err();
    assert!(err.to_string().contains("which this fold retires"));

    let after: Vec<i64> = tables.iter().map(|t| total_count(&conn, t)).collect();
    assert_eq!(before, after);
    let ids: Vec<i64> = service
        .live_faces(origami_id)
        .unwrap()
        .iter()
        .map(|face| face.id_in_origami)
        .collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn fold_rejects_disagreeing_angles_on_a_shared_edge() {
    let conn = open_db_in_memory().unwrap();
    let service = OrigamiService::new(&conn);
    let (origami_id, _) = service.create_origami().unwrap();

    let mut request = diagonal_fold(origami_id, 1);
    request.faces[0].edges[2] = Some(FoldEdgePayload {
        id_in_other_face: 0,
        other_face_id_in_origami: 2,
        angle: 90.0,
    });
    request.faces[1].edges[0] = Some(FoldEdgePayload {
        id_in_other_face: 2,
        other_face_id_in_origami: 1,
        angle: -45.0,
    });
    let err = service.fold(&request).unwrap_err();
    assert!(err.is_invalid_request());
    assert!(err.to_string().contains("angle mismatch"));
    assert_eq!(service.list_steps(origami_id).unwrap().len(), 1);
}
