//! Step ledger persistence.
//!
//! # Responsibility
//! - Append origami and step rows; never rewrite them except to attach the
//!   anchored face of a fold step.
//! - Look steps up by their caller-facing index.
//!
//! # Invariants
//! - `(origami_id, id_in_origami)` is unique (schema constraint).
//! - Steps are listed in `id_in_origami ASC` order.

use crate::model::geometry::FaceId;
use crate::model::step::{OrigamiId, Step, StepId, StepType};
use crate::repo::{
    ensure_connection_ready, parse_optional_uuid, parse_uuid, Lookup, RepoError, RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const STEP_SELECT_SQL: &str = "SELECT
    id,
    origami_id,
    type,
    id_in_origami,
    anchored_face_id,
    created_at
FROM steps";

/// Append-only ledger of origami steps.
pub trait StepRepository {
    /// Inserts a new origami row and returns its durable id.
    fn insert_origami(&self) -> RepoResult<OrigamiId>;
    fn origami_exists(&self, origami_id: OrigamiId) -> RepoResult<bool>;
    /// Inserts a step row without validating the index sequence.
    fn insert_step(
        &self,
        origami_id: OrigamiId,
        kind: StepType,
        id_in_origami: i64,
    ) -> RepoResult<StepId>;
    fn find_step(&self, origami_id: OrigamiId, id_in_origami: i64) -> RepoResult<Option<Step>>;
    /// Highest step index recorded for the origami.
    fn max_step_index(&self, origami_id: OrigamiId) -> RepoResult<Option<i64>>;
    fn record_anchored_face(&self, step_id: StepId, face_id: FaceId) -> RepoResult<()>;
    fn list_steps(&self, origami_id: OrigamiId) -> RepoResult<Vec<Step>>;
}

/// SQLite-backed step ledger.
pub struct SqliteStepRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStepRepository<'conn> {
    /// Wraps a migrated connection or open transaction.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl StepRepository for SqliteStepRepository<'_> {
    fn insert_origami(&self) -> RepoResult<OrigamiId> {
        let origami_id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO origamis (id) VALUES (?1);",
            [origami_id.to_string()],
        )?;
        Ok(origami_id)
    }

    fn origami_exists(&self, origami_id: OrigamiId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM origamis WHERE id = ?1);",
            [origami_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn insert_step(
        &self,
        origami_id: OrigamiId,
        kind: StepType,
        id_in_origami: i64,
    ) -> RepoResult<StepId> {
        let step_id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO steps (id, origami_id, type, id_in_origami)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                step_id.to_string(),
                origami_id.to_string(),
                kind.as_db_str(),
                id_in_origami,
            ],
        )?;
        Ok(step_id)
    }

    fn find_step(&self, origami_id: OrigamiId, id_in_origami: i64) -> RepoResult<Option<Step>> {
        let mut stmt = self.conn.prepare(&format!(
            "{STEP_SELECT_SQL}
             WHERE origami_id = ?1
               AND id_in_origami = ?2;"
        ))?;
        let mut rows = stmt.query(params![origami_id.to_string(), id_in_origami])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_step_row(row)?));
        }
        Ok(None)
    }

    fn max_step_index(&self, origami_id: OrigamiId) -> RepoResult<Option<i64>> {
        let max = self
            .conn
            .query_row(
                "SELECT MAX(id_in_origami) FROM steps WHERE origami_id = ?1;",
                [origami_id.to_string()],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?
            .flatten();
        Ok(max)
    }

    fn record_anchored_face(&self, step_id: StepId, face_id: FaceId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE steps
             SET anchored_face_id = ?2
             WHERE id = ?1
               AND type = 'fold';",
            params![step_id.to_string(), face_id.to_string()],
        )?;
        if changed != 1 {
            return Err(RepoError::InvalidData(format!(
                "anchored face update touched {changed} fold steps for step {step_id}"
            )));
        }
        Ok(())
    }

    fn list_steps(&self, origami_id: OrigamiId) -> RepoResult<Vec<Step>> {
        if !self.origami_exists(origami_id)? {
            return Err(RepoError::NotFound(Lookup::Origami(origami_id)));
        }
        let mut stmt = self.conn.prepare(&format!(
            "{STEP_SELECT_SQL}
             WHERE origami_id = ?1
             ORDER BY id_in_origami ASC;"
        ))?;
        let mut rows = stmt.query([origami_id.to_string()])?;
        let mut steps = Vec::new();
        while let Some(row) = rows.next()? {
            steps.push(parse_step_row(row)?);
        }
        Ok(steps)
    }
}

fn parse_step_row(row: &Row<'_>) -> RepoResult<Step> {
    let id_text: String = row.get("id")?;
    let origami_text: String = row.get("origami_id")?;
    let type_text: String = row.get("type")?;
    let kind = StepType::from_db_str(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid step type `{type_text}` in steps.type"))
    })?;

    Ok(Step {
        id: parse_uuid(&id_text, "steps.id")?,
        origami_id: parse_uuid(&origami_text, "steps.origami_id")?,
        kind,
        id_in_origami: row.get("id_in_origami")?,
        anchored_face_id: parse_optional_uuid(
            row.get("anchored_face_id")?,
            "steps.anchored_face_id",
        )?,
        created_at: row.get("created_at")?,
    })
}
