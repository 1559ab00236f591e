use meetup_roster::{CalendarItem, HeadOfLine, Participant, PromotionDecision};
use tracing::{debug, error, info, instrument, warn};

use super::{Cancellation, PromotionOutcome, Registrar};
use crate::context::RequestContext;
use crate::error::EngineError;
use crate::requests::CancelRequest;

/// A promotion that still has to be announced once the roster lock is gone.
struct PendingNotice {
    item: CalendarItem,
    participant: Participant,
}

impl Registrar {
    /// Removes a participant. When the participant held a seat, the head of
    /// the waiting list is promoted if it fits.
    ///
    /// Cancelling an already removed participant succeeds with
    /// `removed == false`. The promotion notice is sent once the roster lock
    /// is released, also when the delete itself failed, and never affects
    /// the result.
    #[instrument(skip(self, ctx, request), fields(request_id = %ctx.request_id))]
    pub async fn cancel_participant(
        &self,
        ctx: &RequestContext,
        request: &CancelRequest,
    ) -> Result<Cancellation, EngineError> {
        let participant_id = request.validate()?;

        let Some(participant) = self.store.get_participant(participant_id).await? else {
            debug!(%participant_id, "participant already removed");
            return Ok(Cancellation::already_removed());
        };

        let (deleted, promotion, notice) = {
            let _guard = self.locks.acquire(participant.calendar_item_id).await;

            // A racing cancellation may have finished while we waited.
            let Some(participant) = self.store.get_participant(participant_id).await? else {
                debug!(%participant_id, "participant removed while waiting for the roster lock");
                return Ok(Cancellation::already_removed());
            };

            let (promotion, notice) = if participant.is_waiting {
                (PromotionOutcome::NotAttempted, None)
            } else {
                self.promote_head(&participant).await?
            };

            let deleted = self.store.delete_participant(participant_id).await;
            match &deleted {
                Ok(removed) => info!(
                    %participant_id,
                    calendar_item_id = %participant.calendar_item_id,
                    was_waiting = participant.is_waiting,
                    removed,
                    "participant cancelled"
                ),
                Err(e) => error!(
                    %participant_id,
                    calendar_item_id = %participant.calendar_item_id,
                    promoted = notice.is_some(),
                    error = %e,
                    "participant not deleted"
                ),
            }

            (deleted, promotion, notice)
        };

        // The promotion is already written, so it is announced even when the
        // delete failed.
        if let Some(notice) = notice {
            self.deliver_promotion_notice(&notice.item, &notice.participant)
                .await;
        }

        let removed = deleted?;
        Ok(Cancellation { removed, promotion })
    }

    /// Decides on and writes the promotion freed up by `cancelled`.
    ///
    /// Only the first waiting participant is considered. A stale write
    /// restarts the decision from a fresh roster read.
    async fn promote_head(
        &self,
        cancelled: &Participant,
    ) -> Result<(PromotionOutcome, Option<PendingNotice>), EngineError> {
        let calendar_item_id = cancelled.calendar_item_id;

        let mut attempts = 0;
        loop {
            attempts += 1;
            let participants = self.store.list_participants(calendar_item_id).await?;

            let Some(head) = HeadOfLine::find(&participants, cancelled.id) else {
                debug!(%calendar_item_id, "waiting list empty");
                return Ok((PromotionOutcome::NoCandidate, None));
            };

            let Some(item) = self.store.get_calendar_item(calendar_item_id).await? else {
                error!(
                    %calendar_item_id,
                    participant_id = %head.participant.id,
                    "calendar item missing, waiting list not promoted"
                );
                return Ok((
                    PromotionOutcome::Failed {
                        reason: format!("calendar item {calendar_item_id} not found"),
                    },
                    None,
                ));
            };

            let promoted = match head.decide(&item) {
                PromotionDecision::DoesNotFit {
                    participant_id,
                    confirmed_ahead,
                    capacity,
                } => {
                    debug!(
                        %calendar_item_id,
                        %participant_id,
                        confirmed_ahead,
                        capacity,
                        "head of waiting list does not fit"
                    );
                    return Ok((PromotionOutcome::HeadDidNotFit { participant_id }, None));
                }
                PromotionDecision::Promote {
                    participant_id,
                    confirmed_ahead,
                    capacity,
                } => {
                    debug!(
                        %calendar_item_id,
                        %participant_id,
                        confirmed_ahead,
                        capacity,
                        "promoting head of waiting list"
                    );
                    let mut promoted = head.participant.clone();
                    promoted.is_waiting = false;
                    promoted
                }
            };

            match self.store.upsert_participant(&promoted).await {
                Ok(stored) => {
                    info!(
                        %calendar_item_id,
                        participant_id = %stored.id,
                        is_co_guide = stored.is_co_guide,
                        attempts,
                        "participant promoted from waiting list"
                    );
                    let outcome = PromotionOutcome::Promoted {
                        participant_id: stored.id,
                    };
                    let notice = PendingNotice {
                        item,
                        participant: stored,
                    };
                    return Ok((outcome, Some(notice)));
                }
                Err(e) if e.is_conflict() && attempts <= self.config.max_conflict_retries => {
                    warn!(
                        %calendar_item_id,
                        participant_id = %promoted.id,
                        attempts,
                        error = %e,
                        "roster changed during promotion, retrying"
                    );
                }
                Err(e) if e.is_conflict() => {
                    error!(
                        %calendar_item_id,
                        attempts,
                        "promotion kept conflicting, giving up"
                    );
                    return Err(EngineError::ConcurrencyConflict {
                        calendar_item_id,
                        attempts,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use meetup_roster::CalendarItem;

    use super::*;
    use crate::config::RegistrarConfig;
    use crate::notify::RecordingNotifier;
    use crate::store::{EntityStore, InMemoryStore};

    async fn setup(max: u32, co: u32) -> (Registrar, Arc<InMemoryStore>, CalendarItem) {
        let store = Arc::new(InMemoryStore::new());
        let item = CalendarItem::new("Ridge walk", Utc::now()).with_capacity(max, co);
        store.put_calendar_item(item.clone()).await;
        let registrar = Registrar::new(
            store.clone(),
            Arc::new(RecordingNotifier::new()),
            RegistrarConfig::default(),
        );
        (registrar, store, item)
    }

    async fn seed(store: &InMemoryStore, item: &CalendarItem, waiting: bool) -> Participant {
        let mut p = Participant::new(item.id, "p");
        p.is_waiting = waiting;
        store.upsert_participant(&p).await.unwrap()
    }

    #[tokio::test]
    async fn test_promote_head_leaves_store_untouched_when_head_does_not_fit() {
        let (registrar, store, item) = setup(2, 0).await;
        let a = seed(&store, &item, false).await;
        seed(&store, &item, false).await;
        seed(&store, &item, false).await; // over capacity, e.g. quota lowered later
        let w = seed(&store, &item, true).await;

        let (outcome, notice) = registrar.promote_head(&a).await.unwrap();
        assert_eq!(
            outcome,
            PromotionOutcome::HeadDidNotFit {
                participant_id: w.id
            }
        );
        assert!(notice.is_none());
        assert!(store.get_participant(w.id).await.unwrap().unwrap().is_waiting);
    }

    #[tokio::test]
    async fn test_promote_head_retries_after_conflict() {
        let (registrar, store, item) = setup(2, 0).await;
        let a = seed(&store, &item, false).await;
        let w = seed(&store, &item, true).await;
        store.inject_conflicts(1);

        let (outcome, notice) = registrar.promote_head(&a).await.unwrap();
        assert_eq!(outcome.promoted(), Some(w.id));
        assert_eq!(notice.unwrap().participant.revision, 2);
    }

    #[tokio::test]
    async fn test_missing_item_without_waiting_list_is_no_candidate() {
        let (registrar, store, item) = setup(2, 0).await;
        let a = seed(&store, &item, false).await;
        seed(&store, &item, false).await;
        store.remove_calendar_item(item.id).await;

        let (outcome, notice) = registrar.promote_head(&a).await.unwrap();
        assert_eq!(outcome, PromotionOutcome::NoCandidate);
        assert!(notice.is_none());
    }

    #[tokio::test]
    async fn test_promote_head_reports_missing_item() {
        let (registrar, store, item) = setup(2, 0).await;
        let a = seed(&store, &item, false).await;
        seed(&store, &item, true).await;
        store.remove_calendar_item(item.id).await;

        let (outcome, notice) = registrar.promote_head(&a).await.unwrap();
        assert!(matches!(outcome, PromotionOutcome::Failed { .. }));
        assert!(notice.is_none());
    }
}
