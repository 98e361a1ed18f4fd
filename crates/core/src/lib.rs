//! Shared primitives for the lodging workspace.

pub mod del_state;
pub mod types;
