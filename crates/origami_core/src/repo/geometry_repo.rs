//! Geometry store: faces, edges, points and lines stamped with step markers.
//!
//! # Responsibility
//! - Insert geometry rows bound to the step that creates them.
//! - Retire rows by stamping `deleted_step`, returning affected-row counts.
//! - Filter rows by lifecycle marker for replay and invariant checks.
//!
//! # Invariants
//! - Retirement only ever touches rows with `deleted_step IS NULL`.
//! - A fold edge is visible from both faces it separates.

use crate::model::geometry::{
    Edge, EdgeId, EdgeKind, Face, FaceId, Line, LineId, Point, PointId, PointKind,
};
use crate::model::step::{Lifecycle, OrigamiId, StepId};
use crate::repo::{
    ensure_connection_ready, parse_optional_uuid, parse_uuid, Lookup, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

const FACE_SELECT_SQL: &str = "SELECT
    id,
    origami_id,
    id_in_origami,
    created_step,
    deleted_step
FROM faces";

const EDGE_SELECT_SQL: &str = "SELECT
    id,
    created_step,
    deleted_step,
    kind,
    face_id,
    id_in_face,
    vertex1_id,
    vertex2_id,
    face2_id,
    id_in_face2,
    angle
FROM edges";

const POINT_SELECT_SQL: &str = "SELECT
    id,
    created_step,
    deleted_step,
    face_id,
    kind,
    on_edge_id,
    x,
    y,
    id_in_face
FROM points";

const LINE_SELECT_SQL: &str = "SELECT
    id,
    created_step,
    deleted_step,
    face_id,
    point1_id,
    point2_id,
    id_in_face
FROM lines";

/// Lifecycle filter applied to geometry queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFilter {
    /// Rows not yet retired.
    Live,
    /// Rows inserted by the given step.
    CreatedAt(StepId),
    /// Rows retired by the given step.
    RetiredAt(StepId),
}

impl RowFilter {
    fn push_clause(self, sql: &mut String, binds: &mut Vec<Value>) {
        match self {
            Self::Live => sql.push_str(" AND deleted_step IS NULL"),
            Self::CreatedAt(step) => {
                sql.push_str(" AND created_step = ?");
                binds.push(Value::Text(step.to_string()));
            }
            Self::RetiredAt(step) => {
                sql.push_str(" AND deleted_step = ?");
                binds.push(Value::Text(step.to_string()));
            }
        }
    }
}

/// Record storage for step-versioned geometry.
pub trait GeometryRepository {
    fn insert_face(
        &self,
        origami_id: OrigamiId,
        id_in_origami: i64,
        step_id: StepId,
    ) -> RepoResult<FaceId>;
    fn insert_point(
        &self,
        face_id: FaceId,
        step_id: StepId,
        kind: PointKind,
        x: f64,
        y: f64,
        id_in_face: i64,
    ) -> RepoResult<PointId>;
    fn insert_edge(&self, step_id: StepId, kind: &EdgeKind) -> RepoResult<EdgeId>;
    fn insert_line(
        &self,
        face_id: FaceId,
        step_id: StepId,
        id_in_face: i64,
        point1_id: PointId,
        point2_id: PointId,
    ) -> RepoResult<LineId>;

    fn get_face(&self, face_id: FaceId) -> RepoResult<Face>;
    fn get_point(&self, point_id: PointId) -> RepoResult<Point>;
    fn get_edge(&self, edge_id: EdgeId) -> RepoResult<Edge>;

    fn faces_of_origami(&self, origami_id: OrigamiId, filter: RowFilter)
        -> RepoResult<Vec<Face>>;
    /// Points of one face, ordered by `id_in_face`.
    fn points_of_face(&self, face_id: FaceId, filter: RowFilter) -> RepoResult<Vec<Point>>;
    /// Edges bounding one face (side edges and fold edges on either side).
    fn edges_of_face(&self, face_id: FaceId, filter: RowFilter) -> RepoResult<Vec<Edge>>;
    /// Lines of one face, ordered by `id_in_face`.
    fn lines_of_face(&self, face_id: FaceId, filter: RowFilter) -> RepoResult<Vec<Line>>;
    /// Points across all faces matching a step marker.
    fn points_marked(&self, filter: RowFilter) -> RepoResult<Vec<Point>>;
    /// Lines across all faces matching a step marker.
    fn lines_marked(&self, filter: RowFilter) -> RepoResult<Vec<Line>>;

    fn retire_face(&self, face_id: FaceId, step_id: StepId) -> RepoResult<usize>;
    fn retire_face_points(&self, face_id: FaceId, step_id: StepId) -> RepoResult<usize>;
    fn retire_face_edges(&self, face_id: FaceId, step_id: StepId) -> RepoResult<usize>;
    fn retire_face_lines(&self, face_id: FaceId, step_id: StepId) -> RepoResult<usize>;
    /// Retires live lines of a face by index; one update per requested entry.
    fn retire_lines(&self, face_id: FaceId, step_id: StepId, ids: &[i64]) -> RepoResult<usize>;
    /// Retires live annotated points of a face by index; vertices never match.
    fn retire_annotated_points(
        &self,
        face_id: FaceId,
        step_id: StepId,
        ids: &[i64],
    ) -> RepoResult<usize>;
    /// Requested point indices having a row in the face in any lifecycle state.
    fn present_point_ids(&self, face_id: FaceId, ids: &[i64]) -> RepoResult<Vec<i64>>;
    /// Requested line indices having a row in the face in any lifecycle state.
    fn present_line_ids(&self, face_id: FaceId, ids: &[i64]) -> RepoResult<Vec<i64>>;
    fn has_live_dependent_line(&self, point_id: PointId) -> RepoResult<bool>;
}

/// SQLite-backed geometry store.
pub struct SqliteGeometryRepository<'conn> {
    pub(crate) conn: &'conn Connection,
}

impl<'conn> SqliteGeometryRepository<'conn> {
    /// Wraps a migrated connection or open transaction.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn query_points(&self, face_id: Option<FaceId>, filter: RowFilter) -> RepoResult<Vec<Point>> {
        let mut sql = format!("{POINT_SELECT_SQL} WHERE 1 = 1");
        let mut binds = Vec::new();
        if let Some(face_id) = face_id {
            sql.push_str(" AND face_id = ?");
            binds.push(Value::Text(face_id.to_string()));
        }
        filter.push_clause(&mut sql, &mut binds);
        sql.push_str(" ORDER BY face_id ASC, id_in_face ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut points = Vec::new();
        while let Some(row) = rows.next()? {
            points.push(parse_point_row(row)?);
        }
        Ok(points)
    }

    fn query_lines(&self, face_id: Option<FaceId>, filter: RowFilter) -> RepoResult<Vec<Line>> {
        let mut sql = format!("{LINE_SELECT_SQL} WHERE 1 = 1");
        let mut binds = Vec::new();
        if let Some(face_id) = face_id {
            sql.push_str(" AND face_id = ?");
            binds.push(Value::Text(face_id.to_string()));
        }
        filter.push_clause(&mut sql, &mut binds);
        sql.push_str(" ORDER BY face_id ASC, id_in_face ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut lines = Vec::new();
        while let Some(row) = rows.next()? {
            lines.push(parse_line_row(row)?);
        }
        Ok(lines)
    }

    fn present_ids(&self, table: &'static str, face_id: FaceId, ids: &[i64]) -> RepoResult<Vec<i64>> {
        let sql = format!(
            "SELECT EXISTS(
                SELECT 1 FROM {table} WHERE face_id = ?1 AND id_in_face = ?2
            );"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut present = Vec::new();
        for id in ids {
            let exists: i64 =
                stmt.query_row(params![face_id.to_string(), id], |row| row.get(0))?;
            if exists == 1 {
                present.push(*id);
            }
        }
        Ok(present)
    }
}

impl GeometryRepository for SqliteGeometryRepository<'_> {
    fn insert_face(
        &self,
        origami_id: OrigamiId,
        id_in_origami: i64,
        step_id: StepId,
    ) -> RepoResult<FaceId> {
        let face_id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO faces (id, origami_id, id_in_origami, created_step)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                face_id.to_string(),
                origami_id.to_string(),
                id_in_origami,
                step_id.to_string(),
            ],
        )?;
        Ok(face_id)
    }

    fn insert_point(
        &self,
        face_id: FaceId,
        step_id: StepId,
        kind: PointKind,
        x: f64,
        y: f64,
        id_in_face: i64,
    ) -> RepoResult<PointId> {
        let point_id = Uuid::new_v4();
        let (kind_text, on_edge_id) = match kind {
            PointKind::Vertex => ("vertex", None),
            PointKind::Annotated { on_edge_id } => ("annotated", on_edge_id),
        };
        self.conn.execute(
            "INSERT INTO points (id, created_step, face_id, kind, on_edge_id, x, y, id_in_face)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                point_id.to_string(),
                step_id.to_string(),
                face_id.to_string(),
                kind_text,
                on_edge_id.map(|id| id.to_string()),
                x,
                y,
                id_in_face,
            ],
        )?;
        Ok(point_id)
    }

    fn insert_edge(&self, step_id: StepId, kind: &EdgeKind) -> RepoResult<EdgeId> {
        let edge_id = Uuid::new_v4();
        match kind {
            EdgeKind::Side {
                vertex1_id,
                vertex2_id,
                face_id,
                id_in_face,
            } => {
                self.conn.execute(
                    "INSERT INTO edges (id, created_step, kind, face_id, id_in_face, vertex1_id, vertex2_id)
                     VALUES (?1, ?2, 'side', ?3, ?4, ?5, ?6);",
                    params![
                        edge_id.to_string(),
                        step_id.to_string(),
                        face_id.to_string(),
                        id_in_face,
                        vertex1_id.to_string(),
                        vertex2_id.to_string(),
                    ],
                )?;
            }
            EdgeKind::Fold {
                face1_id,
                face2_id,
                angle,
                id_in_face1,
                id_in_face2,
            } => {
                self.conn.execute(
                    "INSERT INTO edges (id, created_step, kind, face_id, id_in_face, face2_id, id_in_face2, angle)
                     VALUES (?1, ?2, 'fold', ?3, ?4, ?5, ?6, ?7);",
                    params![
                        edge_id.to_string(),
                        step_id.to_string(),
                        face1_id.to_string(),
                        id_in_face1,
                        face2_id.to_string(),
                        id_in_face2,
                        angle,
                    ],
                )?;
            }
        }
        Ok(edge_id)
    }

    fn insert_line(
        &self,
        face_id: FaceId,
        step_id: StepId,
        id_in_face: i64,
        point1_id: PointId,
        point2_id: PointId,
    ) -> RepoResult<LineId> {
        let line_id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO lines (id, created_step, face_id, point1_id, point2_id, id_in_face)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                line_id.to_string(),
                step_id.to_string(),
                face_id.to_string(),
                point1_id.to_string(),
                point2_id.to_string(),
                id_in_face,
            ],
        )?;
        Ok(line_id)
    }

    fn get_face(&self, face_id: FaceId) -> RepoResult<Face> {
        let mut stmt = self
            .conn
            .prepare(&format!("{FACE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([face_id.to_string()])?;
        match rows.next()? {
            Some(row) => parse_face_row(row),
            None => Err(RepoError::NotFound(Lookup::FaceRow(face_id))),
        }
    }

    fn get_point(&self, point_id: PointId) -> RepoResult<Point> {
        let mut stmt = self
            .conn
            .prepare(&format!("{POINT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([point_id.to_string()])?;
        match rows.next()? {
            Some(row) => parse_point_row(row),
            None => Err(RepoError::NotFound(Lookup::PointRow(point_id))),
        }
    }

    fn get_edge(&self, edge_id: EdgeId) -> RepoResult<Edge> {
        let mut stmt = self
            .conn
            .prepare(&format!("{EDGE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([edge_id.to_string()])?;
        match rows.next()? {
            Some(row) => parse_edge_row(row),
            None => Err(RepoError::NotFound(Lookup::EdgeRow(edge_id))),
        }
    }

    fn faces_of_origami(
        &self,
        origami_id: OrigamiId,
        filter: RowFilter,
    ) -> RepoResult<Vec<Face>> {
        let mut sql = format!("{FACE_SELECT_SQL} WHERE origami_id = ?");
        let mut binds = vec![Value::Text(origami_id.to_string())];
        filter.push_clause(&mut sql, &mut binds);
        sql.push_str(" ORDER BY id_in_origami ASC, id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut faces = Vec::new();
        while let Some(row) = rows.next()? {
            faces.push(parse_face_row(row)?);
        }
        Ok(faces)
    }

    fn points_of_face(&self, face_id: FaceId, filter: RowFilter) -> RepoResult<Vec<Point>> {
        self.query_points(Some(face_id), filter)
    }

    fn edges_of_face(&self, face_id: FaceId, filter: RowFilter) -> RepoResult<Vec<Edge>> {
        let mut sql = format!("{EDGE_SELECT_SQL} WHERE (face_id = ? OR face2_id = ?)");
        let mut binds = vec![
            Value::Text(face_id.to_string()),
            Value::Text(face_id.to_string()),
        ];
        filter.push_clause(&mut sql, &mut binds);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut edges = Vec::new();
        while let Some(row) = rows.next()? {
            edges.push(parse_edge_row(row)?);
        }
        edges.sort_by_key(|edge| edge.id_in_face(face_id));
        Ok(edges)
    }

    fn lines_of_face(&self, face_id: FaceId, filter: RowFilter) -> RepoResult<Vec<Line>> {
        self.query_lines(Some(face_id), filter)
    }

    fn points_marked(&self, filter: RowFilter) -> RepoResult<Vec<Point>> {
        self.query_points(None, filter)
    }

    fn lines_marked(&self, filter: RowFilter) -> RepoResult<Vec<Line>> {
        self.query_lines(None, filter)
    }

    fn retire_face(&self, face_id: FaceId, step_id: StepId) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE faces
             SET deleted_step = ?2
             WHERE id = ?1
               AND deleted_step IS NULL;",
            params![face_id.to_string(), step_id.to_string()],
        )?;
        Ok(changed)
    }

    fn retire_face_points(&self, face_id: FaceId, step_id: StepId) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE points
             SET deleted_step = ?2
             WHERE face_id = ?1
               AND deleted_step IS NULL;",
            params![face_id.to_string(), step_id.to_string()],
        )?;
        Ok(changed)
    }

    fn retire_face_edges(&self, face_id: FaceId, step_id: StepId) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE edges
             SET deleted_step = ?2
             WHERE (face_id = ?1 OR face2_id = ?1)
               AND deleted_step IS NULL;",
            params![face_id.to_string(), step_id.to_string()],
        )?;
        Ok(changed)
    }

    fn retire_face_lines(&self, face_id: FaceId, step_id: StepId) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE lines
             SET deleted_step = ?2
             WHERE face_id = ?1
               AND deleted_step IS NULL;",
            params![face_id.to_string(), step_id.to_string()],
        )?;
        Ok(changed)
    }

    fn retire_lines(&self, face_id: FaceId, step_id: StepId, ids: &[i64]) -> RepoResult<usize> {
        let mut stmt = self.conn.prepare(
            "UPDATE lines
             SET deleted_step = ?2
             WHERE face_id = ?1
               AND id_in_face = ?3
               AND deleted_step IS NULL;",
        )?;
        let mut changed = 0;
        for id in ids {
            changed += stmt.execute(params![face_id.to_string(), step_id.to_string(), id])?;
        }
        Ok(changed)
    }

    fn retire_annotated_points(
        &self,
        face_id: FaceId,
        step_id: StepId,
        ids: &[i64],
    ) -> RepoResult<usize> {
        let mut stmt = self.conn.prepare(
            "UPDATE points
             SET deleted_step = ?2
             WHERE face_id = ?1
               AND id_in_face = ?3
               AND kind = 'annotated'
               AND deleted_step IS NULL;",
        )?;
        let mut changed = 0;
        for id in ids {
            changed += stmt.execute(params![face_id.to_string(), step_id.to_string(), id])?;
        }
        Ok(changed)
    }

    fn present_point_ids(&self, face_id: FaceId, ids: &[i64]) -> RepoResult<Vec<i64>> {
        self.present_ids("points", face_id, ids)
    }

    fn present_line_ids(&self, face_id: FaceId, ids: &[i64]) -> RepoResult<Vec<i64>> {
        self.present_ids("lines", face_id, ids)
    }

    fn has_live_dependent_line(&self, point_id: PointId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM lines
                WHERE (point1_id = ?1 OR point2_id = ?1)
                  AND deleted_step IS NULL
            );",
            [point_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

fn parse_lifecycle(row: &Row<'_>, column: &'static str) -> RepoResult<Lifecycle> {
    Ok(Lifecycle::from_deleted_step(parse_optional_uuid(
        row.get("deleted_step")?,
        column,
    )?))
}

fn parse_face_row(row: &Row<'_>) -> RepoResult<Face> {
    let id: String = row.get("id")?;
    let origami_id: String = row.get("origami_id")?;
    let created_step: String = row.get("created_step")?;
    Ok(Face {
        id: parse_uuid(&id, "faces.id")?,
        origami_id: parse_uuid(&origami_id, "faces.origami_id")?,
        id_in_origami: row.get("id_in_origami")?,
        created_step: parse_uuid(&created_step, "faces.created_step")?,
        lifecycle: parse_lifecycle(row, "faces.deleted_step")?,
    })
}

fn parse_point_row(row: &Row<'_>) -> RepoResult<Point> {
    let id: String = row.get("id")?;
    let created_step: String = row.get("created_step")?;
    let face_id: String = row.get("face_id")?;
    let kind_text: String = row.get("kind")?;
    let on_edge_id = parse_optional_uuid(row.get("on_edge_id")?, "points.on_edge_id")?;
    let kind = match kind_text.as_str() {
        "vertex" if on_edge_id.is_none() => PointKind::Vertex,
        "annotated" => PointKind::Annotated { on_edge_id },
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid point kind `{other}` in points.kind"
            )));
        }
    };

    Ok(Point {
        id: parse_uuid(&id, "points.id")?,
        created_step: parse_uuid(&created_step, "points.created_step")?,
        face_id: parse_uuid(&face_id, "points.face_id")?,
        kind,
        x: row.get("x")?,
        y: row.get("y")?,
        id_in_face: row.get("id_in_face")?,
        lifecycle: parse_lifecycle(row, "points.deleted_step")?,
    })
}

fn parse_edge_row(row: &Row<'_>) -> RepoResult<Edge> {
    let id: String = row.get("id")?;
    let created_step: String = row.get("created_step")?;
    let face_id: String = row.get("face_id")?;
    let face_id = parse_uuid(&face_id, "edges.face_id")?;
    let id_in_face: i64 = row.get("id_in_face")?;
    let kind_text: String = row.get("kind")?;

    let kind = match kind_text.as_str() {
        "side" => {
            let vertex1_id = parse_optional_uuid(row.get("vertex1_id")?, "edges.vertex1_id")?;
            let vertex2_id = parse_optional_uuid(row.get("vertex2_id")?, "edges.vertex2_id")?;
            let (Some(vertex1_id), Some(vertex2_id)) = (vertex1_id, vertex2_id) else {
                return Err(RepoError::InvalidData(format!(
                    "side edge {id} is missing a vertex"
                )));
            };
            EdgeKind::Side {
                vertex1_id,
                vertex2_id,
                face_id,
                id_in_face,
            }
        }
        "fold" => {
            let face2_id = parse_optional_uuid(row.get("face2_id")?, "edges.face2_id")?;
            let id_in_face2: Option<i64> = row.get("id_in_face2")?;
            let angle: Option<f64> = row.get("angle")?;
            let (Some(face2_id), Some(id_in_face2), Some(angle)) = (face2_id, id_in_face2, angle)
            else {
                return Err(RepoError::InvalidData(format!(
                    "fold edge {id} is missing its second face"
                )));
            };
            EdgeKind::Fold {
                face1_id: face_id,
                face2_id,
                angle,
                id_in_face1: id_in_face,
                id_in_face2,
            }
        }
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid edge kind `{other}` in edges.kind"
            )));
        }
    };

    Ok(Edge {
        id: parse_uuid(&id, "edges.id")?,
        created_step: parse_uuid(&created_step, "edges.created_step")?,
        kind,
        lifecycle: parse_lifecycle(row, "edges.deleted_step")?,
    })
}

fn parse_line_row(row: &Row<'_>) -> RepoResult<Line> {
    let id: String = row.get("id")?;
    let created_step: String = row.get("created_step")?;
    let face_id: String = row.get("face_id")?;
    let point1_id: String = row.get("point1_id")?;
    let point2_id: String = row.get("point2_id")?;
    Ok(Line {
        id: parse_uuid(&id, "lines.id")?,
        created_step: parse_uuid(&created_step, "lines.created_step")?,
        face_id: parse_uuid(&face_id, "lines.face_id")?,
        point1_id: parse_uuid(&point1_id, "lines.point1_id")?,
        point2_id: parse_uuid(&point2_id, "lines.point2_id")?,
        id_in_face: row.get("id_in_face")?,
        lifecycle: parse_lifecycle(row, "lines.deleted_step")?,
    })
}
