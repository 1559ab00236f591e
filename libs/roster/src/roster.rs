//! Confirmed/waiting projection of one calendar item's participants.

use meetup_id::ParticipantId;
use serde::Serialize;

use crate::model::Participant;

/// Snapshot-derived view of a roster.
///
/// Built from the complete participant set in arrival order. The waiting list
/// keeps that order; it is the FIFO queue promotions are taken from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterView {
    confirmed: Vec<ParticipantId>,
    waiting: Vec<ParticipantId>,
    co_guides_confirmed: usize,
}

impl RosterView {
    /// Projects `participants`, which must already be in arrival order.
    pub fn build<'a, I>(participants: I) -> Self
    where
        I: IntoIterator<Item = &'a Participant>,
    {
        let mut view = Self::default();
        for p in participants {
            if p.is_waiting {
                view.waiting.push(p.id);
            } else {
                view.confirmed.push(p.id);
                if p.is_co_guide {
                    view.co_guides_confirmed += 1;
                }
            }
        }
        view
    }

    /// Projects the roster as it will look once `excluded` is gone.
    pub fn build_excluding<'a, I>(participants: I, excluded: ParticipantId) -> Self
    where
        I: IntoIterator<Item = &'a Participant>,
    {
        Self::build(participants.into_iter().filter(|p| p.id != excluded))
    }

    pub fn confirmed(&self) -> &[ParticipantId] {
        &self.confirmed
    }

    pub fn waiting(&self) -> &[ParticipantId] {
        &self.waiting
    }

    pub fn confirmed_count(&self) -> usize {
        self.confirmed.len()
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    pub fn co_guides_confirmed(&self) -> usize {
        self.co_guides_confirmed
    }

    /// First participant in the waiting line, if any.
    pub fn waiting_head(&self) -> Option<ParticipantId> {
        self.waiting.first().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.confirmed.is_empty() && self.waiting.is_empty()
    }
}
