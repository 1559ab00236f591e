//! Calendar items, participants and their validation rules.

use chrono::{DateTime, Utc};
use meetup_id::{CalendarItemId, IdError, ParticipantId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Input rejected before the roster is touched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is missing")]
    Missing(&'static str),

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("{field} is longer than {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} is not a valid id: {source}")]
    InvalidId {
        field: &'static str,
        #[source]
        source: IdError,
    },
}

impl ValidationError {
    /// Maps an id parse failure, reporting a blank id as missing.
    pub fn from_id(field: &'static str, source: IdError) -> Self {
        if source.is_empty() {
            Self::Missing(field)
        } else {
            Self::InvalidId { field, source }
        }
    }
}

/// Tenant scope of a calendar item. `None` on an item means the default tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tenant(String);

impl Tenant {
    pub const MAX_LEN: usize = 64;

    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::Missing("tenant"));
        }
        if name.chars().count() > Self::MAX_LEN {
            return Err(ValidationError::TooLong {
                field: "tenant",
                max: Self::MAX_LEN,
            });
        }
        Ok(Self(name))
    }

    /// A missing or blank header value means "no tenant".
    pub fn from_header(value: Option<&str>) -> Result<Option<Self>, ValidationError> {
        match value.map(str::trim) {
            None | Some("") => Ok(None),
            Some(v) => Self::new(v).map(Some),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Tenant {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Tenant> for String {
    fn from(tenant: Tenant) -> Self {
        tenant.0
    }
}

impl std::fmt::Display for Tenant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A scheduled event with a fixed number of confirmed seats.
///
/// The engine only reads capacity and scope from it; title and start date are
/// carried for notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarItem {
    pub id: CalendarItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<Tenant>,
    pub title: String,
    pub start_date: DateTime<Utc>,
    /// Total confirmed seats.
    pub max_registrations: u32,
    /// Confirmed seats co-guides may take at registration time.
    pub max_co_guides: u32,
}

impl CalendarItem {
    pub const DEFAULT_MAX_REGISTRATIONS: u32 = 10;
    pub const MIN_REGISTRATIONS: u32 = 2;
    pub const MAX_REGISTRATIONS: u32 = 50;

    pub fn new(title: impl Into<String>, start_date: DateTime<Utc>) -> Self {
        Self {
            id: CalendarItemId::new(),
            tenant: None,
            title: title.into(),
            start_date,
            max_registrations: Self::DEFAULT_MAX_REGISTRATIONS,
            max_co_guides: 0,
        }
    }

    #[must_use]
    pub fn with_capacity(mut self, max_registrations: u32, max_co_guides: u32) -> Self {
        self.max_registrations = max_registrations;
        self.max_co_guides = max_co_guides;
        self
    }

    #[must_use]
    pub fn with_tenant(mut self, tenant: Option<Tenant>) -> Self {
        self.tenant = tenant;
        self
    }

    /// Checks the capacity fields against their allowed ranges.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(Self::MIN_REGISTRATIONS..=Self::MAX_REGISTRATIONS).contains(&self.max_registrations) {
            return Err(ValidationError::OutOfRange {
                field: "maxRegistrations",
                value: i64::from(self.max_registrations),
                min: i64::from(Self::MIN_REGISTRATIONS),
                max: i64::from(Self::MAX_REGISTRATIONS),
            });
        }
        if self.max_co_guides > self.max_registrations {
            return Err(ValidationError::OutOfRange {
                field: "maxCoGuides",
                value: i64::from(self.max_co_guides),
                min: 0,
                max: i64::from(self.max_registrations),
            });
        }
        Ok(())
    }

    /// True when the item is visible to a request scoped to `tenant`.
    pub fn is_visible_to(&self, tenant: Option<&Tenant>) -> bool {
        self.tenant.as_ref() == tenant
    }
}

/// One registration against exactly one calendar item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    pub calendar_item_id: CalendarItemId,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub is_waiting: bool,
    #[serde(default)]
    pub is_co_guide: bool,
    pub registered_at: DateTime<Utc>,
    /// Optimistic-concurrency token, owned by the store. Zero means "never stored".
    #[serde(default)]
    pub revision: u64,
}

impl Participant {
    pub const MAX_NAME_LEN: usize = 100;

    pub fn new(calendar_item_id: CalendarItemId, first_name: impl Into<String>) -> Self {
        Self {
            id: ParticipantId::new(),
            calendar_item_id,
            first_name: first_name.into(),
            last_name: String::new(),
            is_waiting: false,
            is_co_guide: false,
            registered_at: Utc::now(),
            revision: 0,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        !self.is_waiting
    }

    /// "Anna K." style name used in notifications and logs.
    pub fn display_name(&self) -> String {
        match self.last_name.chars().next() {
            Some(initial) => format!("{} {initial}.", self.first_name),
            None => self.first_name.clone(),
        }
    }

    /// Compares everything except the store-owned revision.
    pub fn same_state_as(&self, other: &Self) -> bool {
        self.id == other.id
            && self.calendar_item_id == other.calendar_item_id
            && self.first_name == other.first_name
            && self.last_name == other.last_name
            && self.is_waiting == other.is_waiting
            && self.is_co_guide == other.is_co_guide
            && self.registered_at == other.registered_at
    }
}
