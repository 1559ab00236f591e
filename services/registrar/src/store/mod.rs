//! Entity store interface and implementations.
//!
//! The engine owns no durable state. Every decision re-reads the roster from
//! an [`EntityStore`], which must return participants in arrival order.
//!
//! Participant writes are revision-checked: a write carrying a stale
//! revision is rejected with [`StoreError::Conflict`] unless it re-applies
//! exactly the state already stored, which keeps retried writes idempotent.

mod memory;
mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use std::sync::Arc;

use async_trait::async_trait;
use meetup_id::{CalendarItemId, ParticipantId};
use meetup_roster::{CalendarItem, Participant};
use thiserror::Error;

use crate::config::RegistrarConfig;

/// Errors from entity store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The participant changed (or vanished) since it was read.
    #[error("stale write for participant {participant_id}: expected revision {expected}, found {actual:?}")]
    Conflict {
        participant_id: ParticipantId,
        expected: u64,
        actual: Option<u64>,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored row could not be mapped back to an entity.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// The backend could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// True for failures that may clear up on their own.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

/// Durable storage of calendar items and participants.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get_participant(&self, id: ParticipantId) -> Result<Option<Participant>, StoreError>;

    /// All participants of one calendar item, in arrival order.
    async fn list_participants(
        &self,
        calendar_item_id: CalendarItemId,
    ) -> Result<Vec<Participant>, StoreError>;

    async fn get_calendar_item(&self, id: CalendarItemId)
        -> Result<Option<CalendarItem>, StoreError>;

    /// Inserts (revision 0) or updates (current revision) a participant and
    /// returns the stored record with its new revision.
    async fn upsert_participant(&self, participant: &Participant)
        -> Result<Participant, StoreError>;

    /// Deletes a participant; returns whether a record was removed.
    /// Deleting an absent id succeeds.
    async fn delete_participant(&self, id: ParticipantId) -> Result<bool, StoreError>;
}

/// What a revision-checked write should do given the currently stored record.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum WritePlan {
    Insert,
    Update { next_revision: u64 },
    Unchanged,
}

pub(crate) fn plan_write(
    incoming: &Participant,
    stored: Option<&Participant>,
) -> Result<WritePlan, StoreError> {
    match stored {
        None if incoming.revision == 0 => Ok(WritePlan::Insert),
        Some(current) if current.revision == incoming.revision => Ok(WritePlan::Update {
            next_revision: current.revision + 1,
        }),
        Some(current) if current.same_state_as(incoming) => Ok(WritePlan::Unchanged),
        _ => Err(StoreError::Conflict {
            participant_id: incoming.id,
            expected: incoming.revision,
            actual: stored.map(|p| p.revision),
        }),
    }
}

/// Opens the store selected by `config`: SQLite when a database path is set,
/// otherwise a process-local in-memory store.
pub fn open(config: &RegistrarConfig) -> Result<Arc<dyn EntityStore>, StoreError> {
    match &config.database_path {
        Some(path) => Ok(Arc::new(SqliteStore::open(path)?)),
        None => Ok(Arc::new(InMemoryStore::new())),
    }
}

/// Behaviour every store implementation must share.
#[cfg(test)]
pub(crate) mod contract {
    use chrono::{Duration, Utc};
    use meetup_roster::{CalendarItem, Participant};

    use super::{EntityStore, StoreError};

    pub fn item() -> CalendarItem {
        CalendarItem::new("Lake loop", Utc::now()).with_capacity(4, 1)
    }

    fn participant(item: &CalendarItem, name: &str, offset_secs: i64) -> Participant {
        let mut p = Participant::new(item.id, name);
        p.last_name = "Tester".to_string();
        // Arrival order must come from insertion, not from timestamps.
        p.registered_at = Utc::now() - Duration::seconds(offset_secs);
        p
    }

    pub async fn lists_in_insertion_order(store: &dyn EntityStore, item: &CalendarItem) {
        let first = store.upsert_participant(&participant(item, "a", 0)).await.unwrap();
        let second = store.upsert_participant(&participant(item, "b", 60)).await.unwrap();
        let third = store.upsert_participant(&participant(item, "c", 120)).await.unwrap();

        // updating the first one keeps its place in line
        let mut updated = first.clone();
        updated.is_waiting = true;
        store.upsert_participant(&updated).await.unwrap();

        let ids: Vec<_> = store
            .list_participants(item.id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![first.id, second.id, third.id]);
    }

    pub async fn revisions_guard_writes(store: &dyn EntityStore, item: &CalendarItem) {
        let stored = store.upsert_participant(&participant(item, "a", 0)).await.unwrap();
        assert_eq!(stored.revision, 1);

        let mut promoted = stored.clone();
        promoted.is_waiting = false;
        promoted.is_co_guide = true;
        let after = store.upsert_participant(&promoted).await.unwrap();
        assert_eq!(after.revision, 2);

        // same write again from the stale copy: idempotent
        let again = store.upsert_participant(&promoted).await.unwrap();
        assert_eq!(again.revision, 2);

        // different write from the stale copy: conflict
        let mut stale = stored.clone();
        stale.is_waiting = true;
        let err = store.upsert_participant(&stale).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict { expected: 1, actual: Some(2), .. }
        ));

        let fetched = store.get_participant(stored.id).await.unwrap().unwrap();
        assert!(fetched.is_co_guide);
        assert_eq!(fetched.revision, 2);
    }

    pub async fn deleted_records_stay_deleted(store: &dyn EntityStore, item: &CalendarItem) {
        let stored = store.upsert_participant(&participant(item, "a", 0)).await.unwrap();

        assert!(store.delete_participant(stored.id).await.unwrap());
        assert!(!store.delete_participant(stored.id).await.unwrap());
        assert!(store.get_participant(stored.id).await.unwrap().is_none());

        // a late write must not resurrect a cancelled participant
        let err = store.upsert_participant(&stored).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { actual: None, .. }));
        assert!(store.list_participants(item.id).await.unwrap().is_empty());
    }

    pub async fn calendar_item_roundtrip(store: &dyn EntityStore, item: &CalendarItem) {
        let fetched = store.get_calendar_item(item.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, item.id);
        assert_eq!(fetched.max_registrations, item.max_registrations);
        assert_eq!(fetched.max_co_guides, item.max_co_guides);
        assert_eq!(fetched.tenant, item.tenant);
        assert!(store
            .get_calendar_item(meetup_id::CalendarItemId::new())
            .await
            .unwrap()
            .is_none());
    }
}
