//! Repository layer: step ledger, geometry store, identifier resolver.
//!
//! # Responsibility
//! - Keep SQL inside the persistence boundary.
//! - Return counts from every soft-delete so callers can validate them.
//!
//! # Invariants
//! - No repository method issues `DELETE`; retirement is an `UPDATE` of
//!   `deleted_step` on live rows only.
//! - Persisted data that cannot be decoded is reported as `InvalidData`,
//!   never masked.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::geometry::{FaceId, PointId};
use crate::model::step::OrigamiId;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod geometry_repo;
pub mod resolver;
pub mod step_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// What a failed lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Origami(OrigamiId),
    Face { origami_id: OrigamiId, id_in_origami: i64 },
    Point { face_id: FaceId, id_in_face: i64 },
    Edge { face_id: FaceId, id_in_face: i64 },
    Line { face_id: FaceId, id_in_face: i64 },
    FaceRow(FaceId),
    PointRow(PointId),
    EdgeRow(Uuid),
}

impl Display for Lookup {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Origami(id) => write!(f, "origami {id}"),
            Self::Face {
                origami_id,
                id_in_origami,
            } => write!(f, "live face {id_in_origami} of origami {origami_id}"),
            Self::Point {
                face_id,
                id_in_face,
            } => write!(f, "live point {id_in_face} of face {face_id}"),
            Self::Edge {
                face_id,
                id_in_face,
            } => write!(f, "live edge {id_in_face} of face {face_id}"),
            Self::Line {
                face_id,
                id_in_face,
            } => write!(f, "live line {id_in_face} of face {face_id}"),
            Self::FaceRow(id) => write!(f, "face row {id}"),
            Self::PointRow(id) => write!(f, "point row {id}"),
            Self::EdgeRow(id) => write!(f, "edge row {id}"),
        }
    }
}

#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// No row matched the lookup.
    NotFound(Lookup),
    /// More than one live row matched a lookup that must be unique.
    Ambiguous { lookup: Lookup, matches: usize },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(lookup) => write!(f, "not found: {lookup}"),
            Self::Ambiguous { lookup, matches } => {
                write!(f, "{matches} live rows match {lookup}")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "origami repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted geometry: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub(crate) fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_optional_uuid(
    value: Option<String>,
    column: &'static str,
) -> RepoResult<Option<Uuid>> {
    value.map(|text| parse_uuid(&text, column)).transpose()
}
