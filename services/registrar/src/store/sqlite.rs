//! SQLite-backed entity store.
//!
//! Arrival order is the insertion sequence of the `participants` table, so
//! updates never move a participant in line. All statements run on the
//! blocking pool behind a single connection.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use meetup_id::{CalendarItemId, ParticipantId};
use meetup_roster::{CalendarItem, Participant, Tenant};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::{plan_write, EntityStore, StoreError, WritePlan};

const PARTICIPANT_COLUMNS: &str = "id, calendar_item_id, first_name, last_name, is_waiting, \
     is_co_guide, registered_at, revision";

/// SQLite entity store.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        debug!(path = %path.as_ref().display(), "opened registrar database");
        Self::with_connection(conn)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates or replaces a calendar item.
    pub async fn put_calendar_item(&self, item: CalendarItem) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT INTO calendar_items
                    (id, tenant, title, start_date, max_registrations, max_co_guides)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                    tenant = excluded.tenant,
                    title = excluded.title,
                    start_date = excluded.start_date,
                    max_registrations = excluded.max_registrations,
                    max_co_guides = excluded.max_co_guides
                "#,
                params![
                    item.id.to_string(),
                    item.tenant.as_ref().map(Tenant::as_str),
                    item.title,
                    format_timestamp(&item.start_date),
                    item.max_registrations,
                    item.max_co_guides,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("database worker failed: {e}")))?
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS calendar_items (
            id TEXT PRIMARY KEY,
            tenant TEXT,
            title TEXT NOT NULL,
            start_date TEXT NOT NULL,
            max_registrations INTEGER NOT NULL,
            max_co_guides INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS participants (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            calendar_item_id TEXT NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL DEFAULT '',
            is_waiting INTEGER NOT NULL,
            is_co_guide INTEGER NOT NULL,
            registered_at TEXT NOT NULL,
            revision INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_participants_calendar_item
            ON participants(calendar_item_id, seq);
        "#,
    )?;
    Ok(())
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("{field} {value:?}: {e}")))
}

fn corrupt(field: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{field}: {err}"))
}

struct ParticipantRow {
    id: String,
    calendar_item_id: String,
    first_name: String,
    last_name: String,
    is_waiting: bool,
    is_co_guide: bool,
    registered_at: String,
    revision: i64,
}

impl ParticipantRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            calendar_item_id: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            is_waiting: row.get(4)?,
            is_co_guide: row.get(5)?,
            registered_at: row.get(6)?,
            revision: row.get(7)?,
        })
    }

    fn into_participant(self) -> Result<Participant, StoreError> {
        Ok(Participant {
            id: ParticipantId::parse(&self.id).map_err(|e| corrupt("participant id", e))?,
            calendar_item_id: CalendarItemId::parse(&self.calendar_item_id)
                .map_err(|e| corrupt("calendar item id", e))?,
            first_name: self.first_name,
            last_name: self.last_name,
            is_waiting: self.is_waiting,
            is_co_guide: self.is_co_guide,
            registered_at: parse_timestamp("registered_at", &self.registered_at)?,
            revision: u64::try_from(self.revision).map_err(|e| corrupt("revision", e))?,
        })
    }
}

struct CalendarItemRow {
    id: String,
    tenant: Option<String>,
    title: String,
    start_date: String,
    max_registrations: i64,
    max_co_guides: i64,
}

impl CalendarItemRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            tenant: row.get(1)?,
            title: row.get(2)?,
            start_date: row.get(3)?,
            max_registrations: row.get(4)?,
            max_co_guides: row.get(5)?,
        })
    }

    fn into_calendar_item(self) -> Result<CalendarItem, StoreError> {
        Ok(CalendarItem {
            id: CalendarItemId::parse(&self.id).map_err(|e| corrupt("calendar item id", e))?,
            tenant: self
                .tenant
                .map(Tenant::new)
                .transpose()
                .map_err(|e| corrupt("tenant", e))?,
            title: self.title,
            start_date: parse_timestamp("start_date", &self.start_date)?,
            max_registrations: u32::try_from(self.max_registrations)
                .map_err(|e| corrupt("max_registrations", e))?,
            max_co_guides: u32::try_from(self.max_co_guides)
                .map_err(|e| corrupt("max_co_guides", e))?,
        })
    }
}

fn select_participant(
    conn: &Connection,
    id: &str,
) -> Result<Option<Participant>, StoreError> {
    let sql = format!("SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE id = ?1");
    conn.query_row(&sql, params![id], ParticipantRow::read)
        .optional()?
        .map(ParticipantRow::into_participant)
        .transpose()
}

fn revision_param(revision: u64) -> Result<i64, StoreError> {
    i64::try_from(revision).map_err(|e| corrupt("revision", e))
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn get_participant(&self, id: ParticipantId) -> Result<Option<Participant>, StoreError> {
        self.with_conn(move |conn| select_participant(conn, &id.to_string()))
            .await
    }

    async fn list_participants(
        &self,
        calendar_item_id: CalendarItemId,
    ) -> Result<Vec<Participant>, StoreError> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {PARTICIPANT_COLUMNS} FROM participants \
                 WHERE calendar_item_id = ?1 ORDER BY seq"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![calendar_item_id.to_string()], ParticipantRow::read)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(ParticipantRow::into_participant)
                .collect()
        })
        .await
    }

    async fn get_calendar_item(
        &self,
        id: CalendarItemId,
    ) -> Result<Option<CalendarItem>, StoreError> {
        self.with_conn(move |conn| {
            conn.query_row(
                r#"
                SELECT id, tenant, title, start_date, max_registrations, max_co_guides
                FROM calendar_items WHERE id = ?1
                "#,
                params![id.to_string()],
                CalendarItemRow::read,
            )
            .optional()?
            .map(CalendarItemRow::into_calendar_item)
            .transpose()
        })
        .await
    }

    async fn upsert_participant(
        &self,
        participant: &Participant,
    ) -> Result<Participant, StoreError> {
        let incoming = participant.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let id = incoming.id.to_string();
            let stored = select_participant(&tx, &id)?;

            let record = match plan_write(&incoming, stored.as_ref())? {
                WritePlan::Insert => {
                    let mut record = incoming;
                    record.revision = 1;
                    tx.execute(
                        r#"
                        INSERT INTO participants
                            (id, calendar_item_id, first_name, last_name, is_waiting,
                             is_co_guide, registered_at, revision)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                        "#,
                        params![
                            id,
                            record.calendar_item_id.to_string(),
                            record.first_name,
                            record.last_name,
                            record.is_waiting,
                            record.is_co_guide,
                            format_timestamp(&record.registered_at),
                            revision_param(record.revision)?,
                        ],
                    )?;
                    record
                }
                WritePlan::Update { next_revision } => {
                    let mut record = incoming;
                    record.revision = next_revision;
                    tx.execute(
                        r#"
                        UPDATE participants SET
                            calendar_item_id = ?2,
                            first_name = ?3,
                            last_name = ?4,
                            is_waiting = ?5,
                            is_co_guide = ?6,
                            registered_at = ?7,
                            revision = ?8
                        WHERE id = ?1
                        "#,
                        params![
                            id,
                            record.calendar_item_id.to_string(),
                            record.first_name,
                            record.last_name,
                            record.is_waiting,
                            record.is_co_guide,
                            format_timestamp(&record.registered_at),
                            revision_param(record.revision)?,
                        ],
                    )?;
                    record
                }
                WritePlan::Unchanged => {
                    return stored.ok_or_else(|| {
                        StoreError::Corrupt(format!("participant {id} vanished during write"))
                    });
                }
            };

            tx.commit()?;
            Ok(record)
        })
        .await
    }

    async fn delete_participant(&self, id: ParticipantId) -> Result<bool, StoreError> {
        self.with_conn(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM participants WHERE id = ?1",
                params![id.to_string()],
            )?;
            Ok(deleted > 0)
        })
        .await
    }
}
