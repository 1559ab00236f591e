//! Identifier types for the registration domain.

use crate::define_id;

define_id!(
    /// Identifies a scheduled event with a fixed seat capacity.
    CalendarItemId,
    "cal"
);

define_id!(
    /// Identifies one registration against a calendar item.
    ParticipantId,
    "ptc"
);

define_id!(
    /// Correlates log lines of a single engine invocation.
    RequestId,
    "req"
);
