//! Capacity rules for registration and promotion.
//!
//! Registration never exceeds the base quota: a co-guide needs a free seat
//! *and* a free co-guide slot. Promotion is more lenient for co-guides: the
//! unused part of the co-guide quota is added on top of the base quota.

use meetup_id::ParticipantId;

use crate::model::{CalendarItem, Participant};
use crate::roster::RosterView;

/// Whether a new participant of the given class can be confirmed right away.
pub fn can_confirm(item: &CalendarItem, roster: &RosterView, is_co_guide: bool) -> bool {
    let seat_free = roster.confirmed_count() < item.max_registrations as usize;
    if !is_co_guide {
        return seat_free;
    }
    seat_free && roster.co_guides_confirmed() < item.max_co_guides as usize
}

/// The first waiting participant behind a cancellation, together with the
/// counters accumulated in front of it.
#[derive(Debug, Clone, Copy)]
pub struct HeadOfLine<'a> {
    pub participant: &'a Participant,
    /// Confirmed participants ahead of the head in arrival order.
    pub confirmed_ahead: usize,
    /// Confirmed co-guides ahead of the head in arrival order.
    pub co_guides_ahead: usize,
}

impl<'a> HeadOfLine<'a> {
    /// Walks `participants` (arrival order) with `cancelled` left out and
    /// stops at the first waiting participant.
    pub fn find(participants: &'a [Participant], cancelled: ParticipantId) -> Option<Self> {
        let mut confirmed_ahead = 0;
        let mut co_guides_ahead = 0;

        for p in participants.iter().filter(|p| p.id != cancelled) {
            if p.is_waiting {
                return Some(Self {
                    participant: p,
                    confirmed_ahead,
                    co_guides_ahead,
                });
            }
            confirmed_ahead += 1;
            if p.is_co_guide {
                co_guides_ahead += 1;
            }
        }

        None
    }

    /// Seats the head may be promoted into.
    ///
    /// `max_registrations`, plus `max_co_guides - co_guides_ahead` when the
    /// head is a co-guide. Signed, so an over-full co-guide quota shrinks it.
    pub fn effective_capacity(&self, item: &CalendarItem) -> i64 {
        let base = i64::from(item.max_registrations);
        if self.participant.is_co_guide {
            base + (i64::from(item.max_co_guides) - self.co_guides_ahead as i64)
        } else {
            base
        }
    }

    pub fn decide(&self, item: &CalendarItem) -> PromotionDecision {
        let capacity = self.effective_capacity(item);
        let participant_id = self.participant.id;
        if (self.confirmed_ahead as i64) < capacity {
            PromotionDecision::Promote {
                participant_id,
                confirmed_ahead: self.confirmed_ahead,
                capacity,
            }
        } else {
            PromotionDecision::DoesNotFit {
                participant_id,
                confirmed_ahead: self.confirmed_ahead,
                capacity,
            }
        }
    }
}

/// Outcome of evaluating the head of the waiting line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionDecision {
    Promote {
        participant_id: ParticipantId,
        confirmed_ahead: usize,
        capacity: i64,
    },
    /// The head stays waiting; nobody behind it is considered.
    DoesNotFit {
        participant_id: ParticipantId,
        confirmed_ahead: usize,
        capacity: i64,
    },
}

impl PromotionDecision {
    pub fn participant_id(&self) -> ParticipantId {
        match self {
            Self::Promote { participant_id, .. } | Self::DoesNotFit { participant_id, .. } => {
                *participant_id
            }
        }
    }

    pub fn is_promote(&self) -> bool {
        matches!(self, Self::Promote { .. })
    }
}
