//! Registration and waiting-list promotion for capacity-limited calendar items.
//!
//! The crate exposes a [`Registrar`] with three entry points:
//!
//! - [`Registrar::register_participant`] admits a participant directly or
//!   puts them on the waiting list.
//! - [`Registrar::cancel_participant`] removes a participant and, when a
//!   confirmed seat frees up, promotes the head of the waiting list.
//! - [`Registrar::roster`] returns the current confirmed/waiting projection.
//!
//! Persistence and notification delivery are injected through the
//! [`EntityStore`] and [`Notifier`] traits. Mutations of one calendar item's
//! roster are serialized through a per-item lock; different items proceed in
//! parallel.

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod locks;
pub mod notify;
pub mod requests;
pub mod store;
pub mod telemetry;

pub use config::RegistrarConfig;
pub use context::RequestContext;
pub use engine::{Cancellation, PromotionOutcome, Registrar, Registration, RosterSnapshot};
pub use error::EngineError;
pub use notify::{LogNotifier, Notifier, NotifyError, RecordingNotifier};
pub use requests::{CancelRequest, RegistrationDraft};
pub use store::{EntityStore, InMemoryStore, SqliteStore, StoreError};
