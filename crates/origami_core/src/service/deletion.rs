//! Post-update validation of soft-delete counts.
//!
//! Every deletion path retires rows first and then reconciles the number of
//! rows it touched against what the caller asked for. The reconciliation
//! separates caller mistakes from storage contradictions.

use crate::service::error::{OrigamiError, OrigamiResult};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletedEntity {
    Point,
    Line,
}

impl Display for DeletedEntity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Point => write!(f, "point"),
            Self::Line => write!(f, "line"),
        }
    }
}

/// Reconciles a soft-delete.
///
/// `still_present` lists, per requested entry, the ids that have a row of
/// this kind in any lifecycle state. Repeated entries stay repeated, so an
/// id requested twice in one call counts as present twice.
///
/// # Errors
/// - `ConsistencyFault` when more rows changed than were requested, or when
///   fewer ids are present than rows changed.
/// - `InvalidRequest` "double deletion" when a present id was already retired.
/// - `InvalidRequest` "no such entity" when an id never existed.
pub fn validate_deletion(
    entity: DeletedEntity,
    requested: &[i64],
    rows_updated: usize,
    still_present: &[i64],
) -> OrigamiResult<()> {
    let requested_count = requested.len();
    if rows_updated > requested_count {
        return Err(OrigamiError::consistency_fault(format!(
            "extra rows updated: {rows_updated} {entity} rows retired for {requested_count} requested ids {requested:?}"
        )));
    }
    if rows_updated == requested_count {
        return Ok(());
    }

    let present_count = still_present.len();
    if present_count > rows_updated {
        Err(OrigamiError::invalid_request(format!(
            "double deletion: {entity} ids {requested:?} include ids that are already deleted"
        )))
    } else if present_count == rows_updated {
        Err(OrigamiError::invalid_request(format!(
            "no such entity: {entity} ids {requested:?} include ids that do not exist"
        )))
    } else {
        Err(OrigamiError::consistency_fault(format!(
            "impossible state: {rows_updated} {entity} rows retired but only {present_count} present"
        )))
    }
}
