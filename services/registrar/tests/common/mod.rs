//! Shared fixtures for registrar integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use meetup_registrar::{
    CancelRequest, Cancellation, EntityStore, InMemoryStore, RecordingNotifier, Registrar,
    RegistrarConfig, RegistrationDraft, RequestContext,
};
use meetup_roster::{CalendarItem, Participant};

pub struct Harness {
    pub registrar: Registrar,
    pub store: Arc<InMemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub ctx: RequestContext,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_parts(
            InMemoryStore::new(),
            RecordingNotifier::new(),
            RegistrarConfig::default(),
        )
    }

    pub fn with_parts(
        store: InMemoryStore,
        notifier: RecordingNotifier,
        config: RegistrarConfig,
    ) -> Self {
        meetup_registrar::telemetry::init_for_tests();
        let store = Arc::new(store);
        let notifier = Arc::new(notifier);
        let registrar = Registrar::new(store.clone(), notifier.clone(), config);
        Self {
            registrar,
            store,
            notifier,
            ctx: RequestContext::default(),
        }
    }

    pub async fn item(&self, max_registrations: u32, max_co_guides: u32) -> CalendarItem {
        let item = CalendarItem::new("Sunday hike", Utc::now() + Duration::days(3))
            .with_capacity(max_registrations, max_co_guides);
        self.store.put_calendar_item(item.clone()).await;
        item
    }

    /// Registers through the engine, so capacity rules apply.
    pub async fn register(&self, item: &CalendarItem, name: &str) -> Participant {
        let draft = RegistrationDraft::new(item.id, name);
        self.registrar
            .register_participant(&self.ctx, &draft)
            .await
            .unwrap()
            .participant
    }

    pub async fn register_co_guide(&self, item: &CalendarItem, name: &str) -> Participant {
        let draft = RegistrationDraft::new(item.id, name).as_co_guide();
        self.registrar
            .register_participant(&self.ctx, &draft)
            .await
            .unwrap()
            .participant
    }

    /// Writes a participant straight into the store, bypassing capacity rules.
    pub async fn seed(
        &self,
        item: &CalendarItem,
        name: &str,
        is_waiting: bool,
        is_co_guide: bool,
    ) -> Participant {
        let mut p = Participant::new(item.id, name);
        p.is_waiting = is_waiting;
        p.is_co_guide = is_co_guide;
        self.store.upsert_participant(&p).await.unwrap()
    }

    pub async fn cancel(&self, participant: &Participant) -> Cancellation {
        self.registrar
            .cancel_participant(&self.ctx, &CancelRequest::from(participant.id))
            .await
            .unwrap()
    }

    pub async fn current(&self, participant: &Participant) -> Option<Participant> {
        self.store.get_participant(participant.id).await.unwrap()
    }

    pub async fn is_waiting(&self, participant: &Participant) -> bool {
        self.current(participant)
            .await
            .map(|p| p.is_waiting)
            .unwrap_or_else(|| panic!("{} is gone", participant.first_name))
    }

    pub async fn confirmed_count(&self, item: &CalendarItem) -> usize {
        self.store
            .list_participants(item.id)
            .await
            .unwrap()
            .iter()
            .filter(|p| !p.is_waiting)
            .count()
    }
}
