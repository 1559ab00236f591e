//! The registrar engine.
//!
//! Every roster mutation runs under the per-calendar-item lock from
//! [`RosterLocks`] and recomputes the roster from the store; no counters are
//! kept between calls.

mod cancel;
mod register;

use std::sync::Arc;

use meetup_id::{CalendarItemId, ParticipantId};
use meetup_roster::{CalendarItem, Participant, RosterView};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::config::RegistrarConfig;
use crate::context::RequestContext;
use crate::error::EngineError;
use crate::locks::RosterLocks;
use crate::notify::{LogNotifier, Notifier};
use crate::store::{self, EntityStore};

/// Result of a registration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub participant: Participant,
    pub was_waiting: bool,
}

/// Result of a cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cancellation {
    /// Whether this call deleted the participant. `false` when it was
    /// already gone; the cancellation still succeeded.
    pub removed: bool,
    pub promotion: PromotionOutcome,
}

impl Cancellation {
    pub(crate) fn already_removed() -> Self {
        Self {
            removed: false,
            promotion: PromotionOutcome::NotAttempted,
        }
    }
}

/// What happened to the waiting list during a cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum PromotionOutcome {
    /// The cancelled participant was not holding a seat.
    NotAttempted,
    /// Nobody was waiting.
    NoCandidate,
    #[serde(rename_all = "camelCase")]
    Promoted { participant_id: ParticipantId },
    /// The head of the waiting list did not fit and stays waiting.
    #[serde(rename_all = "camelCase")]
    HeadDidNotFit { participant_id: ParticipantId },
    /// The promotion could not be evaluated; the cancellation went ahead.
    Failed { reason: String },
}

impl PromotionOutcome {
    pub fn promoted(&self) -> Option<ParticipantId> {
        match self {
            Self::Promoted { participant_id } => Some(*participant_id),
            _ => None,
        }
    }
}

/// Read-only projection of one calendar item's roster.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSnapshot {
    pub calendar_item: CalendarItem,
    /// All participants in arrival order.
    pub participants: Vec<Participant>,
    pub view: RosterView,
    pub free_seats: usize,
}

/// Registration and promotion engine.
#[derive(Clone)]
pub struct Registrar {
    store: Arc<dyn EntityStore>,
    notifier: Arc<dyn Notifier>,
    locks: RosterLocks,
    config: RegistrarConfig,
}

impl std::fmt::Debug for Registrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registrar")
            .field("config", &self.config)
            .field("active_locks", &self.locks.active())
            .finish_non_exhaustive()
    }
}

impl Registrar {
    pub fn new(
        store: Arc<dyn EntityStore>,
        notifier: Arc<dyn Notifier>,
        config: RegistrarConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            locks: RosterLocks::new(),
            config,
        }
    }

    /// Builds a registrar over the store selected by `config`, delivering
    /// notices through the log.
    pub fn open(config: RegistrarConfig) -> Result<Self, EngineError> {
        let store = store::open(&config)?;
        Ok(Self::new(store, Arc::new(LogNotifier), config))
    }

    pub fn config(&self) -> &RegistrarConfig {
        &self.config
    }

    /// Number of calendar items with a roster operation in flight.
    pub fn active_locks(&self) -> usize {
        self.locks.active()
    }

    /// Current confirmed and waiting lists of a calendar item.
    #[instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn roster(
        &self,
        ctx: &RequestContext,
        calendar_item_id: CalendarItemId,
    ) -> Result<RosterSnapshot, EngineError> {
        let item = self.visible_item(ctx, calendar_item_id).await?;
        let participants = self.store.list_participants(calendar_item_id).await?;
        let view = RosterView::build(&participants);
        let free_seats = (item.max_registrations as usize).saturating_sub(view.confirmed_count());

        debug!(
            confirmed = view.confirmed_count(),
            waiting = view.waiting_count(),
            free_seats,
            "roster read"
        );

        Ok(RosterSnapshot {
            calendar_item: item,
            participants,
            view,
            free_seats,
        })
    }

    /// Loads a calendar item on behalf of the caller. Items of another
    /// tenant are reported as missing.
    async fn visible_item(
        &self,
        ctx: &RequestContext,
        calendar_item_id: CalendarItemId,
    ) -> Result<CalendarItem, EngineError> {
        match self.store.get_calendar_item(calendar_item_id).await? {
            Some(item) if item.is_visible_to(ctx.tenant.as_ref()) => Ok(item),
            Some(_) => {
                debug!(%calendar_item_id, "calendar item belongs to another tenant");
                Err(EngineError::calendar_item_not_found(calendar_item_id))
            }
            None => Err(EngineError::calendar_item_not_found(calendar_item_id)),
        }
    }

    /// Sends the promotion notice. Failures and timeouts are logged only.
    async fn deliver_promotion_notice(&self, item: &CalendarItem, participant: &Participant) {
        let message = self.config.promotion_message.as_str();
        let delivery = self.notifier.notify(item, participant, message);

        match tokio::time::timeout(self.config.notify_timeout, delivery).await {
            Ok(Ok(())) => {
                debug!(
                    calendar_item_id = %item.id,
                    participant_id = %participant.id,
                    "promotion notice delivered"
                );
            }
            Ok(Err(e)) => {
                warn!(
                    calendar_item_id = %item.id,
                    participant_id = %participant.id,
                    error = %e,
                    "promotion notice failed"
                );
            }
            Err(_) => {
                warn!(
                    calendar_item_id = %item.id,
                    participant_id = %participant.id,
                    timeout_ms = self.config.notify_timeout.as_millis() as u64,
                    "promotion notice timed out"
                );
            }
        }
    }
}
