use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use meetup_id::{CalendarItemId, ParticipantId};
use meetup_roster::{CalendarItem, Participant};
use tokio::sync::RwLock;

use super::{plan_write, EntityStore, StoreError, WritePlan};

#[derive(Debug, Default)]
struct Tables {
    next_seq: u64,
    items: HashMap<CalendarItemId, CalendarItem>,
    /// Participants keyed by id, with their arrival sequence number.
    participants: HashMap<ParticipantId, (u64, Participant)>,
}

/// Process-local entity store.
///
/// Used for tests and single-node deployments without a database path. The
/// fault hooks let tests exercise the engine's conflict and outage paths.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    latency: Option<Duration>,
    injected_conflicts: AtomicU32,
    injected_delete_failures: AtomicU32,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every operation by `latency`, to widen race windows in tests.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes the next `count` participant writes fail with a conflict.
    pub fn inject_conflicts(&self, count: u32) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` deletes fail as if the store were unreachable.
    pub fn fail_deletes(&self, count: u32) {
        self.injected_delete_failures.store(count, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn put_calendar_item(&self, item: CalendarItem) {
        self.tables.write().await.items.insert(item.id, item);
    }

    pub async fn remove_calendar_item(&self, id: CalendarItemId) -> Option<CalendarItem> {
        self.tables.write().await.items.remove(&id)
    }

    async fn enter(&self) -> Result<(), StoreError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store switched off".to_string()));
        }
        Ok(())
    }

    fn take_injected_conflict(&self) -> bool {
        take_one(&self.injected_conflicts)
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn get_participant(&self, id: ParticipantId) -> Result<Option<Participant>, StoreError> {
        self.enter().await?;
        let tables = self.tables.read().await;
        Ok(tables.participants.get(&id).map(|(_, p)| p.clone()))
    }

    async fn list_participants(
        &self,
        calendar_item_id: CalendarItemId,
    ) -> Result<Vec<Participant>, StoreError> {
        self.enter().await?;
        let tables = self.tables.read().await;
        let mut rows: Vec<_> = tables
            .participants
            .values()
            .filter(|(_, p)| p.calendar_item_id == calendar_item_id)
            .collect();
        rows.sort_by_key(|(seq, _)| *seq);
        Ok(rows.into_iter().map(|(_, p)| p.clone()).collect())
    }

    async fn get_calendar_item(
        &self,
        id: CalendarItemId,
    ) -> Result<Option<CalendarItem>, StoreError> {
        self.enter().await?;
        Ok(self.tables.read().await.items.get(&id).cloned())
    }

    async fn upsert_participant(
        &self,
        participant: &Participant,
    ) -> Result<Participant, StoreError> {
        self.enter().await?;
        let mut tables = self.tables.write().await;
        let stored = tables.participants.get(&participant.id).map(|(_, p)| p.clone());

        if self.take_injected_conflict() {
            return Err(StoreError::Conflict {
                participant_id: participant.id,
                expected: participant.revision,
                actual: stored.map(|p| p.revision),
            });
        }

        match plan_write(participant, stored.as_ref())? {
            WritePlan::Insert => {
                tables.next_seq += 1;
                let seq = tables.next_seq;
                let mut record = participant.clone();
                record.revision = 1;
                tables
                    .participants
                    .insert(record.id, (seq, record.clone()));
                Ok(record)
            }
            WritePlan::Update { next_revision } => {
                let mut record = participant.clone();
                record.revision = next_revision;
                if let Some(slot) = tables.participants.get_mut(&record.id) {
                    slot.1 = record.clone();
                }
                Ok(record)
            }
            WritePlan::Unchanged => match stored {
                Some(current) => Ok(current),
                None => Err(StoreError::Corrupt(format!(
                    "participant {} vanished during write",
                    participant.id
                ))),
            },
        }
    }

    async fn delete_participant(&self, id: ParticipantId) -> Result<bool, StoreError> {
        self.enter().await?;
        if take_one(&self.injected_delete_failures) {
            return Err(StoreError::Unavailable("injected delete failure".to_string()));
        }
        Ok(self.tables.write().await.participants.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;

    async fn seeded() -> (InMemoryStore, CalendarItem) {
        let store = InMemoryStore::new();
        let item = contract::item();
        store.put_calendar_item(item.clone()).await;
        (store, item)
    }

    #[tokio::test]
    async fn test_insertion_order() {
        let (store, item) = seeded().await;
        contract::lists_in_insertion_order(&store, &item).await;
    }

    #[tokio::test]
    async fn test_revisions() {
        let (store, item) = seeded().await;
        contract::revisions_guard_writes(&store, &item).await;
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, item) = seeded().await;
        contract::deleted_records_stay_deleted(&store, &item).await;
    }

    #[tokio::test]
    async fn test_calendar_item() {
        let (store, item) = seeded().await;
        contract::calendar_item_roundtrip(&store, &item).await;

        assert!(store.remove_calendar_item(item.id).await.is_some());
        assert!(store.get_calendar_item(item.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_injected_conflicts_run_out() {
        let (store, item) = seeded().await;
        store.inject_conflicts(2);

        let p = Participant::new(item.id, "a");
        assert!(store.upsert_participant(&p).await.unwrap_err().is_conflict());
        assert!(store.upsert_participant(&p).await.unwrap_err().is_conflict());
        assert_eq!(store.upsert_participant(&p).await.unwrap().revision, 1);
    }

    #[tokio::test]
    async fn test_injected_delete_failure() {
        let (store, item) = seeded().await;
        let p = store
            .upsert_participant(&Participant::new(item.id, "a"))
            .await
            .unwrap();
        store.fail_deletes(1);

        assert!(store.delete_participant(p.id).await.unwrap_err().is_transient());
        assert!(store.delete_participant(p.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_unavailable() {
        let (store, item) = seeded().await;
        store.set_unavailable(true);

        let err = store.list_participants(item.id).await.unwrap_err();
        assert!(err.is_transient());

        store.set_unavailable(false);
        assert!(store.list_participants(item.id).await.unwrap().is_empty());
    }
}
