//! Notification delivery interface and implementations.
//!
//! The engine hands a notification to a [`Notifier`] after a promotion has
//! been persisted. Delivery is best effort: failures are logged by the
//! caller and never change roster state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use meetup_id::{CalendarItemId, ParticipantId};
use meetup_roster::{CalendarItem, Participant};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("notification rejected: {0}")]
    Rejected(String),
}

/// Delivers a message about a calendar item to one participant.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        item: &CalendarItem,
        participant: &Participant,
        message: &str,
    ) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        item: &CalendarItem,
        participant: &Participant,
        message: &str,
    ) -> Result<(), NotifyError> {
        info!(
            calendar_item_id = %item.id,
            title = %item.title,
            start_date = %item.start_date,
            participant_id = %participant.id,
            participant = %participant.display_name(),
            text = message,
            "notification"
        );
        Ok(())
    }
}

/// A notification captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub calendar_item_id: CalendarItemId,
    pub participant_id: ParticipantId,
    pub message: String,
}

/// Notifier for tests and local runs: records what would have been sent.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    deliveries: Mutex<Vec<Delivery>>,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every delivery fails as unreachable.
    pub fn failing() -> Self {
        Self {
            failing: AtomicBool::new(true),
            ..Self::default()
        }
    }

    /// A notifier that takes `delay` per delivery.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        item: &CalendarItem,
        participant: &Participant,
        message: &str,
    ) -> Result<(), NotifyError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Unreachable(
                "recording notifier configured to fail".to_string(),
            ));
        }

        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Delivery {
                calendar_item_id: item.id,
                participant_id: participant.id,
                message: message.to_string(),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fixtures() -> (CalendarItem, Participant) {
        let item = CalendarItem::new("Sunday tour", Utc::now());
        let participant = Participant::new(item.id, "Anna");
        (item, participant)
    }

    #[tokio::test]
    async fn test_recording_notifier_records() {
        let (item, participant) = fixtures();
        let notifier = RecordingNotifier::new();
        notifier.notify(&item, &participant, "hello").await.unwrap();

        assert_eq!(
            notifier.deliveries(),
            vec![Delivery {
                calendar_item_id: item.id,
                participant_id: participant.id,
                message: "hello".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_failing_notifier_records_nothing() {
        let (item, participant) = fixtures();
        let notifier = RecordingNotifier::failing();
        let err = notifier.notify(&item, &participant, "hello").await.unwrap_err();
        assert!(matches!(err, NotifyError::Unreachable(_)));
        assert!(notifier.deliveries().is_empty());

        notifier.set_failing(false);
        notifier.notify(&item, &participant, "hello").await.unwrap();
        assert_eq!(notifier.deliveries().len(), 1);
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        let (item, participant) = fixtures();
        LogNotifier.notify(&item, &participant, "hello").await.unwrap();
    }
}
