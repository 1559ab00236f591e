//! Per-calendar-item mutual exclusion.
//!
//! A cancellation reads the roster, decides on a promotion, writes it and
//! deletes the cancelled participant. Two of those interleaving on the same
//! calendar item could both pick the same head of the waiting line, so every
//! roster mutation runs while holding that item's lock. Locks for different
//! items are independent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use meetup_id::CalendarItemId;
use tokio::sync::OwnedMutexGuard;
use tracing::trace;

type LockTable = HashMap<CalendarItemId, Arc<tokio::sync::Mutex<()>>>;

/// Keyed lock table. Entries are created on demand and dropped once nobody
/// holds or waits for them.
#[derive(Debug, Default, Clone)]
pub struct RosterLocks {
    table: Arc<Mutex<LockTable>>,
}

impl RosterLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the roster of `calendar_item_id` is free and claims it.
    pub async fn acquire(&self, calendar_item_id: CalendarItemId) -> RosterGuard {
        let slot = {
            let mut table = lock_table(&self.table);
            table
                .entry(calendar_item_id)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };

        let guard = slot.lock_owned().await;
        trace!(calendar_item_id = %calendar_item_id, "roster lock acquired");

        RosterGuard {
            calendar_item_id,
            guard: Some(guard),
            table: Arc::clone(&self.table),
        }
    }

    /// Number of calendar items currently locked or contended.
    pub fn active(&self) -> usize {
        lock_table(&self.table).len()
    }
}

fn lock_table(table: &Mutex<LockTable>) -> MutexGuard<'_, LockTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Held while a roster is being mutated; releases on drop.
#[derive(Debug)]
pub struct RosterGuard {
    calendar_item_id: CalendarItemId,
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<Mutex<LockTable>>,
}

impl RosterGuard {
    pub fn calendar_item_id(&self) -> CalendarItemId {
        self.calendar_item_id
    }
}

impl Drop for RosterGuard {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut table = lock_table(&self.table);
        let idle = table
            .get(&self.calendar_item_id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1);
        if idle {
            table.remove(&self.calendar_item_id);
        }
        trace!(calendar_item_id = %self.calendar_item_id, "roster lock released");
    }
}
