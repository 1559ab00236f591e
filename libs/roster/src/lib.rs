//! Roster projection and capacity rules.
//!
//! This crate holds the parts of the registration engine that need no I/O:
//!
//! - **Model**: [`CalendarItem`], [`Participant`], [`Tenant`] and their validation.
//! - **Roster view**: [`RosterView`], the confirmed/waiting split of one
//!   calendar item's participants.
//! - **Capacity policy**: [`can_confirm`] for new registrations and
//!   [`HeadOfLine`] / [`PromotionDecision`] for promotions after a cancellation.
//!
//! # Invariants
//!
//! - Views are always derived from a complete snapshot of the roster in
//!   arrival order, never from a stored counter.
//! - Every function is deterministic given the same snapshot.
//! - Only the head of the waiting line is ever considered for promotion.

mod model;
mod policy;
mod roster;

pub use model::{CalendarItem, Participant, Tenant, ValidationError};
pub use policy::{can_confirm, HeadOfLine, PromotionDecision};
pub use roster::RosterView;
