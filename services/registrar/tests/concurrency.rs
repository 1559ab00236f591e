//! Racing requests on the same calendar item.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::Harness;
use meetup_registrar::{
    CancelRequest, InMemoryStore, RecordingNotifier, RegistrarConfig, RegistrationDraft,
};

fn slow_harness() -> Harness {
    Harness::with_parts(
        InMemoryStore::new().with_latency(Duration::from_millis(2)),
        RecordingNotifier::new(),
        RegistrarConfig::default(),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_cancellations_promote_two_participants() {
    let h = Arc::new(slow_harness());
    let item = h.item(2, 0).await;
    let a = h.register(&item, "Anna").await;
    let b = h.register(&item, "Ben").await;
    let w1 = h.register(&item, "Waiting one").await;
    let w2 = h.register(&item, "Waiting two").await;
    let w3 = h.register(&item, "Waiting three").await;

    let first = {
        let h = h.clone();
        tokio::spawn(async move { h.cancel(&a).await })
    };
    let second = {
        let h = h.clone();
        tokio::spawn(async move { h.cancel(&b).await })
    };
    let first = first.await.unwrap();
    let second = second.await.unwrap();

    let mut promoted = vec![
        first.promotion.promoted().unwrap(),
        second.promotion.promoted().unwrap(),
    ];
    promoted.sort();
    let mut expected = vec![w1.id, w2.id];
    expected.sort();
    assert_eq!(promoted, expected);

    assert!(h.is_waiting(&w3).await);
    assert_eq!(h.confirmed_count(&item).await, 2);
    assert_eq!(h.notifier.deliveries().len(), 2);
    assert_eq!(h.registrar.active_locks(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_cancellations_promote_once() {
    let h = Arc::new(slow_harness());
    let item = h.item(2, 0).await;
    let a = h.register(&item, "Anna").await;
    h.register(&item, "Ben").await;
    h.register(&item, "Waiting one").await;
    let w2 = h.register(&item, "Waiting two").await;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let h = h.clone();
            let a = a.clone();
            tokio::spawn(async move { h.cancel(&a).await })
        })
        .collect();

    let mut removed = 0;
    let mut promotions = 0;
    for task in tasks {
        let cancellation = task.await.unwrap();
        removed += usize::from(cancellation.removed);
        promotions += usize::from(cancellation.promotion.promoted().is_some());
    }

    assert_eq!(removed, 1);
    assert_eq!(promotions, 1);
    assert!(h.is_waiting(&w2).await);
    assert_eq!(h.notifier.deliveries().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registrations_respect_capacity() {
    let h = Arc::new(slow_harness());
    let item = h.item(5, 2).await;

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let h = h.clone();
            let mut draft = RegistrationDraft::new(item.id, format!("p{i}"));
            if i % 3 == 0 {
                draft = draft.as_co_guide();
            }
            tokio::spawn(async move {
                h.registrar
                    .register_participant(&h.ctx, &draft)
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut confirmed = 0;
    for task in tasks {
        if !task.await.unwrap().was_waiting {
            confirmed += 1;
        }
    }

    let roster = h.registrar.roster(&h.ctx, item.id).await.unwrap();
    assert_eq!(confirmed, 5);
    assert_eq!(roster.view.confirmed_count(), 5);
    assert!(roster.view.co_guides_confirmed() <= 2);
    assert_eq!(roster.view.waiting_count(), 15);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_items_do_not_block_each_other() {
    let h = Arc::new(Harness::with_parts(
        InMemoryStore::new(),
        RecordingNotifier::slow(Duration::from_millis(200)),
        RegistrarConfig::default(),
    ));
    let busy = h.item(2, 0).await;
    let other = h.item(2, 0).await;
    let a = h.register(&busy, "Anna").await;
    h.register(&busy, "Ben").await;
    h.register(&busy, "Clara").await;

    // The promotion notice is slow, but the roster lock is already released.
    let cancel = {
        let h = h.clone();
        tokio::spawn(async move {
            h.registrar
                .cancel_participant(&h.ctx, &CancelRequest::from(a.id))
                .await
                .unwrap()
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let registration = tokio::time::timeout(
        Duration::from_millis(100),
        h.registrar
            .register_participant(&h.ctx, &RegistrationDraft::new(busy.id, "Dora")),
    )
    .await
    .expect("registration blocked behind notification")
    .unwrap();
    assert!(registration.was_waiting);

    let elsewhere = tokio::time::timeout(
        Duration::from_millis(100),
        h.registrar
            .register_participant(&h.ctx, &RegistrationDraft::new(other.id, "Emil")),
    )
    .await
    .expect("registration blocked by another item")
    .unwrap();
    assert!(!elsewhere.was_waiting);

    assert!(cancel.await.unwrap().promotion.promoted().is_some());
}
