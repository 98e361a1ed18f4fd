//! Soft-delete flag shared by every table that hides rows instead of
//! removing them.
//!
//! The flag is stored as a BIGINT `del_state` column. A row whose flag is
//! [`DelState::Yes`] still exists physically but must be treated as absent
//! by every read path.

use serde::{Deserialize, Serialize};

/// Soft-delete flag value type matching BIGINT in the database.
pub type DelStateId = i64;

/// Logical existence of a row.
#[repr(i64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelState {
    /// Row is live.
    No = 0,
    /// Row has been soft-deleted.
    Yes = 1,
}

impl DelState {
    /// Return the database value.
    pub fn id(self) -> DelStateId {
        self as DelStateId
    }
}

impl From<DelState> for DelStateId {
    fn from(value: DelState) -> Self {
        value as DelStateId
    }
}

/// Returned when a `del_state` column holds a value outside the enum.
#[derive(Debug, thiserror::Error)]
#[error("Unknown del_state value: {0}")]
pub struct UnknownDelState(pub DelStateId);

impl TryFrom<DelStateId> for DelState {
    type Error = UnknownDelState;

    fn try_from(value: DelStateId) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DelState::No),
            1 => Ok(DelState::Yes),
            other => Err(UnknownDelState(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_match_database_values() {
        assert_eq!(DelState::No.id(), 0);
        assert_eq!(DelState::Yes.id(), 1);
        assert_eq!(DelStateId::from(DelState::Yes), 1);
    }

    #[test]
    fn try_from_rejects_unknown_values() {
        assert_eq!(DelState::try_from(0).unwrap(), DelState::No);
        assert_eq!(DelState::try_from(1).unwrap(), DelState::Yes);
        let err = DelState::try_from(7).unwrap_err();
        assert_eq!(err.0, 7);
        assert_eq!(err.to_string(), "Unknown del_state value: 7");
    }

    #[test]
    fn serializes_as_variant_name() {
        let json = serde_json::to_string(&DelState::Yes).unwrap();
        assert_eq!(json, "\"Yes\"");
    }
}
