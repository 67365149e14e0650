//! Identifier resolution between scoped ids and durable ids.
//!
//! # Invariants
//! - Forward resolution (`resolve_*`) only sees live rows.
//! - Reverse resolution sees rows in any lifecycle state, since replay reads
//!   retired geometry.
//! - More than one live match is reported as `Ambiguous`; deciding that this
//!   is a consistency fault is the caller's job.

use crate::model::geometry::{EdgeId, FaceId, LineId, PointId};
use crate::model::step::OrigamiId;
use crate::repo::geometry_repo::SqliteGeometryRepository;
use crate::repo::{parse_uuid, Lookup, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Params};
use uuid::Uuid;

pub trait IdResolver {
    fn resolve_face(&self, origami_id: OrigamiId, id_in_origami: i64) -> RepoResult<FaceId>;
    fn resolve_point(&self, face_id: FaceId, id_in_face: i64) -> RepoResult<PointId>;
    /// Matches side edges by owner and fold edges by either face-local index.
    fn resolve_edge(&self, face_id: FaceId, id_in_face: i64) -> RepoResult<EdgeId>;
    fn resolve_line(&self, face_id: FaceId, id_in_face: i64) -> RepoResult<LineId>;
    fn face_id_in_origami(&self, face_id: FaceId) -> RepoResult<i64>;
    fn point_id_in_face(&self, point_id: PointId) -> RepoResult<i64>;
}

impl IdResolver for SqliteGeometryRepository<'_> {
    fn resolve_face(&self, origami_id: OrigamiId, id_in_origami: i64) -> RepoResult<FaceId> {
        single_live_id(
            self.conn,
            "SELECT id
             FROM faces
             WHERE origami_id = ?1
               AND id_in_origami = ?2
               AND deleted_step IS NULL;",
            params![origami_id.to_string(), id_in_origami],
            Lookup::Face {
                origami_id,
                id_in_origami,
            },
        )
    }

    fn resolve_point(&self, face_id: FaceId, id_in_face: i64) -> RepoResult<PointId> {
        single_live_id(
            self.conn,
            "SELECT id
             FROM points
             WHERE face_id = ?1
               AND id_in_face = ?2
               AND deleted_step IS NULL;",
            params![face_id.to_string(), id_in_face],
            Lookup::Point {
                face_id,
                id_in_face,
            },
        )
    }

    fn resolve_edge(&self, face_id: FaceId, id_in_face: i64) -> RepoResult<EdgeId> {
        single_live_id(
            self.conn,
            "SELECT id
             FROM edges
             WHERE deleted_step IS NULL
               AND (
                 (face_id = ?1 AND id_in_face = ?2)
                 OR (kind = 'fold' AND face2_id = ?1 AND id_in_face2 = ?2)
               );",
            params![face_id.to_string(), id_in_face],
            Lookup::Edge {
                face_id,
                id_in_face,
            },
        )
    }

    fn resolve_line(&self, face_id: FaceId, id_in_face: i64) -> RepoResult<LineId> {
        single_live_id(
            self.conn,
            "SELECT id
             FROM lines
             WHERE face_id = ?1
               AND id_in_face = ?2
               AND deleted_step IS NULL;",
            params![face_id.to_string(), id_in_face],
            Lookup::Line {
                face_id,
                id_in_face,
            },
        )
    }

    fn face_id_in_origami(&self, face_id: FaceId) -> RepoResult<i64> {
        self.conn
            .query_row(
                "SELECT id_in_origami FROM faces WHERE id = ?1;",
                [face_id.to_string()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(RepoError::NotFound(Lookup::FaceRow(face_id)))
    }

    fn point_id_in_face(&self, point_id: PointId) -> RepoResult<i64> {
        self.conn
            .query_row(
                "SELECT id_in_face FROM points WHERE id = ?1;",
                [point_id.to_string()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(RepoError::NotFound(Lookup::PointRow(point_id)))
    }
}

fn single_live_id(
    conn: &Connection,
    sql: &str,
    params: impl Params,
    lookup: Lookup,
) -> RepoResult<Uuid> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let text: String = row.get(0)?;
        ids.push(parse_uuid(&text, "id")?);
    }

    match ids.as_slice() {
        [] => Err(RepoError::NotFound(lookup)),
        [id] => Ok(*id),
        _ => Err(RepoError::Ambiguous {
            lookup,
            matches: ids.len(),
        }),
    }
}
