//! Boundary payloads for the engine entry points.
//!
//! Both payloads arrive with raw string ids (as decoded from a request body)
//! and are validated before the roster is read.

use meetup_id::{CalendarItemId, ParticipantId};
use meetup_roster::{Participant, ValidationError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    #[serde(default)]
    pub participant_id: String,
}

impl CancelRequest {
    pub fn validate(&self) -> Result<ParticipantId, ValidationError> {
        ParticipantId::parse(&self.participant_id)
            .map_err(|e| ValidationError::from_id("participantId", e))
    }
}

impl From<ParticipantId> for CancelRequest {
    fn from(id: ParticipantId) -> Self {
        Self {
            participant_id: id.to_string(),
        }
    }
}

/// A participant as submitted for registration; the engine decides the state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDraft {
    #[serde(default)]
    pub calendar_item_id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub is_co_guide: bool,
}

/// A draft that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidDraft {
    pub calendar_item_id: CalendarItemId,
    pub first_name: String,
    pub last_name: String,
    pub is_co_guide: bool,
}

impl RegistrationDraft {
    pub fn new(calendar_item_id: CalendarItemId, first_name: impl Into<String>) -> Self {
        Self {
            calendar_item_id: calendar_item_id.to_string(),
            first_name: first_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = last_name.into();
        self
    }

    #[must_use]
    pub fn as_co_guide(mut self) -> Self {
        self.is_co_guide = true;
        self
    }

    pub fn validate(&self) -> Result<ValidDraft, ValidationError> {
        let calendar_item_id = CalendarItemId::parse(&self.calendar_item_id)
            .map_err(|e| ValidationError::from_id("calendarItemId", e))?;

        let first_name = self.first_name.trim();
        if first_name.is_empty() {
            return Err(ValidationError::Missing("firstName"));
        }
        check_len("firstName", first_name)?;

        let last_name = self.last_name.trim();
        check_len("lastName", last_name)?;

        Ok(ValidDraft {
            calendar_item_id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            is_co_guide: self.is_co_guide,
        })
    }
}

fn check_len(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.chars().count() > Participant::MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: Participant::MAX_NAME_LEN,
        });
    }
    Ok(())
}
