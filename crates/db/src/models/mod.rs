//! Row types.
//!
//! Each submodule contains a `FromRow` + `Serialize` + `Deserialize` entity
//! struct matching the database row. Rows are serialized as JSON when cached.

use lodging_core::del_state::{DelState, DelStateId};

pub mod homestay;

/// Rows whose existence is governed by a `del_state` soft-delete flag.
///
/// Every read path decides visibility through [`SoftDelete::is_present`].
pub trait SoftDelete {
    fn del_state(&self) -> DelStateId;

    /// Whether the row is logically present.
    fn is_present(&self) -> bool {
        self.del_state() == DelState::No.id()
    }
}
