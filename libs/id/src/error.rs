//! Errors raised while parsing identifiers.

use thiserror::Error;

/// Reasons an identifier string was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// Nothing but whitespace was supplied.
    #[error("id is empty")]
    Empty,

    /// No `_` between prefix and ULID.
    #[error("id has no '_' separator")]
    MissingSeparator,

    /// The prefix names a different kind of resource.
    #[error("id prefix mismatch: expected '{expected}', got '{actual}'")]
    WrongPrefix {
        expected: &'static str,
        actual: String,
    },

    /// The part after the separator is not a ULID.
    #[error("invalid ULID: {0}")]
    InvalidUlid(String),
}

impl IdError {
    /// True when the caller supplied no id at all.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}
