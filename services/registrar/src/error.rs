//! Errors surfaced by the engine entry points.

use meetup_id::CalendarItemId;
use meetup_roster::ValidationError;
use thiserror::Error;

use crate::store::StoreError;

/// Engine operation errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A calendar item or participant the caller referenced does not exist
    /// (or is not visible to the caller's tenant).
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Malformed input, rejected before the roster was read.
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// The roster kept changing underneath a promotion decision.
    #[error("roster of {calendar_item_id} changed concurrently; gave up after {attempts} attempts")]
    ConcurrencyConflict {
        calendar_item_id: CalendarItemId,
        attempts: u32,
    },

    /// The entity store failed; the operation was aborted.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn calendar_item_not_found(id: CalendarItemId) -> Self {
        Self::NotFound {
            kind: "calendar item",
            id: id.to_string(),
        }
    }

    /// True when retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConcurrencyConflict { .. } => true,
            Self::Store(e) => e.is_transient(),
            Self::NotFound { .. } | Self::Validation(_) => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
