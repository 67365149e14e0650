//! Step allocation rules on top of the step repository.

use crate::model::step::{OrigamiId, StepId, StepType};
use crate::repo::step_repo::StepRepository;
use crate::service::error::{OrigamiError, OrigamiResult};

/// Allocates a new step row for `origami_id`.
///
/// # Contract
/// - The origami must exist.
/// - `id_in_origami` must be unused for this origami ("duplicate step index").
/// - `id_in_origami` must exceed every existing index; gaps are allowed.
pub fn create_step<S: StepRepository>(
    steps: &S,
    origami_id: OrigamiId,
    kind: StepType,
    id_in_origami: i64,
) -> OrigamiResult<StepId> {
    if !steps.origami_exists(origami_id)? {
        return Err(OrigamiError::invalid_request(format!(
            "unknown origami {origami_id}"
        )));
    }
    if steps.find_step(origami_id, id_in_origami)?.is_some() {
        return Err(OrigamiError::invalid_request(format!(
            "duplicate step index {id_in_origami} for origami {origami_id}"
        )));
    }
    if let Some(latest) = steps.max_step_index(origami_id)? {
        if id_in_origami < latest {
            return Err(OrigamiError::invalid_request(format!(
                "step index out of order: {id_in_origami} precedes latest step {latest}"
            )));
        }
    }

    Ok(steps.insert_step(origami_id, kind, id_in_origami)?)
}
