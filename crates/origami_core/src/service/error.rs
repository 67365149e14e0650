//! Error classification shared by the origami engines.
//!
//! # Invariants
//! - Unknown scoped ids are caller mistakes (`InvalidRequest`).
//! - Undecodable or ambiguous stored state is a `ConsistencyFault` and is
//!   logged at error severity when raised.

use crate::db::DbError;
use crate::repo::{RepoError, RepoResult};
use log::error;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type OrigamiResult<T> = Result<T, OrigamiError>;

#[derive(Debug)]
pub enum OrigamiError {
    /// Caller data violates a domain rule.
    InvalidRequest(String),
    /// Stored state contradicts what the engines expect.
    ConsistencyFault(String),
    /// Storage failure unrelated to domain rules.
    Storage(RepoError),
}

impl OrigamiError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Builds a consistency fault and logs it.
    pub fn consistency_fault(message: impl Into<String>) -> Self {
        let message = message.into();
        error!("event=consistency_fault module=service status=error message={message}");
        Self::ConsistencyFault(message)
    }

    /// Reclassifies a missing row as a fault instead of a caller error.
    ///
    /// Used on paths where the row was referenced by stored data, so its
    /// absence cannot be the caller's doing.
    pub fn from_missing(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(lookup) => {
                Self::consistency_fault(format!("referenced row is missing: {lookup}"))
            }
            other => other.into(),
        }
    }

    pub fn is_invalid_request(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }

    pub fn is_consistency_fault(&self) -> bool {
        matches!(self, Self::ConsistencyFault(_))
    }

    /// Short label used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::ConsistencyFault(_) => "consistency_fault",
            Self::Storage(_) => "storage",
        }
    }
}

impl Display for OrigamiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRequest(message) => write!(f, "invalid request: {message}"),
            Self::ConsistencyFault(message) => write!(f, "consistency fault: {message}"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for OrigamiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for OrigamiError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(lookup) => Self::InvalidRequest(format!("unknown {lookup}")),
            RepoError::Ambiguous { .. } | RepoError::InvalidData(_) => {
                Self::consistency_fault(value.to_string())
            }
            other => Self::Storage(other),
        }
    }
}

impl From<DbError> for OrigamiError {
    fn from(value: DbError) -> Self {
        Self::Storage(RepoError::Db(value))
    }
}

impl From<rusqlite::Error> for OrigamiError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(RepoError::from(value))
    }
}

/// Turns a `NotFound` lookup into `Ok(None)`; other errors propagate.
pub(crate) fn found<T>(result: RepoResult<T>) -> OrigamiResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(RepoError::NotFound(_)) => Ok(None),
        Err(other) => Err(other.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::OrigamiError;
    use crate::repo::{Lookup, RepoError};
    use uuid::Uuid;

    #[test]
    fn not_found_is_a_caller_error_unless_reclassified() {
        let lookup = Lookup::FaceRow(Uuid::new_v4());
        let caller: OrigamiError = RepoError::NotFound(lookup).into();
        assert!(caller.is_invalid_request());

        let stored = OrigamiError::from_missing(RepoError::NotFound(lookup));
        assert!(stored.is_consistency_fault());
    }

    #[test]
    fn ambiguous_lookup_is_a_fault() {
        let err: OrigamiError = RepoError::Ambiguous {
            lookup: Lookup::FaceRow(Uuid::new_v4()),
            matches: 2,
        }
        .into();
        assert_eq!(err.kind(), "consistency_fault");
    }
}
