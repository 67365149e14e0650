//! Step ledger records and the tombstone lifecycle shared by geometry rows.
//!
//! # Invariants
//! - `id_in_origami` is unique per origami and grows with every new step.
//! - `anchored_face_id` is only ever set on fold steps.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable origami identifier.
pub type OrigamiId = Uuid;

/// Durable step identifier.
pub type StepId = Uuid;

/// Closed set of edit kinds recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    /// Initial sheet of paper.
    Create,
    /// Faces retired and replaced.
    Fold,
    /// Points and lines added or removed on existing faces.
    Annotate,
}

impl StepType {
    /// Storage representation in `steps.type`.
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Fold => "fold",
            Self::Annotate => "annotate",
        }
    }

    /// Parses the storage representation.
    pub fn from_db_str(value: &str) -> Option<Self> {
        match value {
            "create" => Some(Self::Create),
            "fold" => Some(Self::Fold),
            "annotate" => Some(Self::Annotate),
            _ => None,
        }
    }
}

/// One atomic entry in an origami's edit history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub id: StepId,
    pub origami_id: OrigamiId,
    pub kind: StepType,
    /// Caller-facing position in the timeline.
    pub id_in_origami: i64,
    /// Face held fixed during a fold.
    pub anchored_face_id: Option<Uuid>,
    /// Epoch ms.
    pub created_at: i64,
}

/// Tombstone state of a geometry row.
///
/// Stored as the nullable `deleted_step` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Active,
    RetiredAt(StepId),
}

impl Lifecycle {
    pub fn from_deleted_step(deleted_step: Option<StepId>) -> Self {
        match deleted_step {
            Some(step) => Self::RetiredAt(step),
            None => Self::Active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Lifecycle, StepType};
    use uuid::Uuid;

    #[test]
    fn step_type_db_strings_round_trip_for_every_variant() {
        for kind in [StepType::Create, StepType::Fold, StepType::Annotate] {
            assert_eq!(StepType::from_db_str(kind.as_db_str()), Some(kind));
        }
        assert_eq!(StepType::from_db_str("crease"), None);
    }

    #[test]
    fn lifecycle_maps_nullable_marker() {
        let step = Uuid::new_v4();
        assert_eq!(Lifecycle::from_deleted_step(None), Lifecycle::Active);
        assert_eq!(
            Lifecycle::from_deleted_step(Some(step)),
            Lifecycle::RetiredAt(step)
        );
    }
}
