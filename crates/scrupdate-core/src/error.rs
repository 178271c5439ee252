//! Core error types for scrupdate-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of decoding persisted values back into domain types.

use thiserror::Error;

/// Core errors produced by the scrupdate-core crate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A packed version number does not fit the `major*100+minor` layout.
    #[error("packed version out of range: {packed} (max {max})", max = crate::version::VersionTag::MAX_PACKED)]
    VersionOutOfRange { packed: u32 },

    /// A stored integer does not name any variant of the given enum.
    #[error("unknown {enum_name} code: {code}")]
    UnknownEnumCode { enum_name: &'static str, code: i64 },
}
