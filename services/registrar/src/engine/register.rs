use meetup_roster::{can_confirm, Participant, RosterView};
use tracing::{debug, info, instrument};

use super::{Registrar, Registration};
use crate::context::RequestContext;
use crate::error::EngineError;
use crate::requests::RegistrationDraft;

impl Registrar {
    /// Adds a participant to a calendar item, confirmed if the capacity
    /// rules allow it and waiting otherwise. Never promotes anyone.
    #[instrument(
        skip(self, ctx, draft),
        fields(request_id = %ctx.request_id, calendar_item_id = %draft.calendar_item_id)
    )]
    pub async fn register_participant(
        &self,
        ctx: &RequestContext,
        draft: &RegistrationDraft,
    ) -> Result<Registration, EngineError> {
        let draft = draft.validate()?;
        let _guard = self.locks.acquire(draft.calendar_item_id).await;

        let item = self.visible_item(ctx, draft.calendar_item_id).await?;
        item.validate()?;

        let participants = self.store.list_participants(item.id).await?;
        let view = RosterView::build(&participants);
        let confirmable = can_confirm(&item, &view, draft.is_co_guide);
        debug!(
            confirmed = view.confirmed_count(),
            co_guides = view.co_guides_confirmed(),
            is_co_guide = draft.is_co_guide,
            confirmable,
            "capacity checked"
        );

        let mut participant = Participant::new(item.id, draft.first_name);
        participant.last_name = draft.last_name;
        participant.is_co_guide = draft.is_co_guide;
        participant.is_waiting = !confirmable;

        let stored = self.store.upsert_participant(&participant).await?;
        info!(
            participant_id = %stored.id,
            is_waiting = stored.is_waiting,
            is_co_guide = stored.is_co_guide,
            "participant registered"
        );

        Ok(Registration {
            was_waiting: stored.is_waiting,
            participant: stored,
        })
    }
}
