//! Index repair after partially applied writes
//!
//! Each test damages the store directly, then checks that the reconciler
//! restores "one entry, one status index" and the active-claim hash.

#[macro_use]
mod common;

use common::{open_engine, queue_error, COURSE, OTHER_COURSE, TA};
use ohq_core::application::queue::keys;
use ohq_core::domain::{EntryStatus, QueueError};
use ohq_core::port::QueueStore;
use ohq_core::IndexReconciler;
use std::sync::Arc;

for_each_store!(
    consistent_store_reports_clean,
    entry_in_wrong_status_index_is_moved,
    dangling_index_members_are_dropped,
    missing_claim_is_restored,
    stale_claim_is_dropped,
    reconcile_all_covers_every_course,
    take_next_skips_stale_waiting_member,
);

async fn members(store: &Arc<dyn QueueStore>, key: &str) -> Vec<String> {
    store.sorted_set_range(key, 0, -1).await.unwrap()
}

async fn consistent_store_reports_clean(store: Arc<dyn QueueStore>) {
    let engine = open_engine(store.clone()).await;
    let a = engine.join(COURSE, 1).await.unwrap();
    engine.join(COURSE, 2).await.unwrap();
    engine.assign(a.id, TA).await.unwrap();
    engine.start_session(a.id).await.unwrap();
    engine.resolve(a.id).await.unwrap();

    let report = IndexReconciler::new(store).reconcile_course(COURSE).await.unwrap();
    assert!(report.is_clean(), "{:?}", report);
    assert_eq!(report.courses, 1);
}

async fn entry_in_wrong_status_index_is_moved(store: Arc<dyn QueueStore>) {
    let engine = open_engine(store.clone()).await;
    let entry = engine.join(COURSE, 1).await.unwrap();
    engine.assign(entry.id, TA).await.unwrap();

    // Simulate an index move that only half happened
    let member = entry.id.to_string();
    let waiting = keys::status_index(COURSE, EntryStatus::Waiting);
    let assigned = keys::status_index(COURSE, EntryStatus::Assigned);
    store.sorted_set_add(&waiting, entry.joined_at, &member).await.unwrap();
    store.sorted_set_remove(&assigned, &member).await.unwrap();

    let report = IndexReconciler::new(store.clone())
        .reconcile_course(COURSE)
        .await
        .unwrap();
    assert_eq!(report.memberships_repaired, 2);
    assert_eq!(report.dangling_removed, 0);

    assert!(members(&store, &waiting).await.is_empty());
    assert_eq!(members(&store, &assigned).await, vec![member]);
    assert!(!engine.get_position(COURSE, 1).await.unwrap().is_waiting());
}

async fn dangling_index_members_are_dropped(store: Arc<dyn QueueStore>) {
    let engine = open_engine(store.clone()).await;
    let entry = engine.join(COURSE, 1).await.unwrap();

    // An id whose record was never written
    let full = keys::full_index(COURSE);
    let waiting = keys::status_index(COURSE, EntryStatus::Waiting);
    store.sorted_set_add(&full, 1, "9999").await.unwrap();
    store.sorted_set_add(&waiting, 1, "9999").await.unwrap();

    let report = IndexReconciler::new(store.clone())
        .reconcile_course(COURSE)
        .await
        .unwrap();
    assert_eq!(report.dangling_removed, 1);
    assert_eq!(report.memberships_repaired, 1);

    let expected = vec![entry.id.to_string()];
    assert_eq!(members(&store, &full).await, expected);
    assert_eq!(members(&store, &waiting).await, expected);
    assert_eq!(engine.get_position(COURSE, 1).await.unwrap().position, 1);
}

async fn missing_claim_is_restored(store: Arc<dyn QueueStore>) {
    let engine = open_engine(store.clone()).await;
    let entry = engine.join(COURSE, 1).await.unwrap();

    store.delete_object(&keys::active_claims(COURSE)).await.unwrap();
    assert!(engine.active_entry(COURSE, 1).await.unwrap().is_none());

    let report = IndexReconciler::new(store.clone())
        .reconcile_course(COURSE)
        .await
        .unwrap();
    assert_eq!(report.claims_rebuilt, 1);

    assert_eq!(
        engine.active_entry(COURSE, 1).await.unwrap().map(|e| e.id),
        Some(entry.id)
    );
    assert!(matches!(
        queue_error(engine.join(COURSE, 1).await),
        QueueError::AlreadyJoined { .. }
    ));
}

async fn stale_claim_is_dropped(store: Arc<dyn QueueStore>) {
    let engine = open_engine(store.clone()).await;
    let entry = engine.join(COURSE, 1).await.unwrap();
    engine.assign(entry.id, TA).await.unwrap();
    engine.start_session(entry.id).await.unwrap();
    engine.resolve(entry.id).await.unwrap();

    // Claim still pointing at the finished entry
    let claims = keys::active_claims(COURSE);
    store
        .set_field(&claims, "1", &entry.id.to_string())
        .await
        .unwrap();

    let report = IndexReconciler::new(store.clone())
        .reconcile_course(COURSE)
        .await
        .unwrap();
    assert_eq!(report.claims_rebuilt, 1);
    assert!(store.get_field(&claims, "1").await.unwrap().is_none());

    // A stale claim never blocks a new join either
    store
        .set_field(&claims, "1", &entry.id.to_string())
        .await
        .unwrap();
    let again = engine.join(COURSE, 1).await.unwrap();
    assert_eq!(
        store.get_field(&claims, "1").await.unwrap(),
        Some(again.id.to_string())
    );
}

async fn reconcile_all_covers_every_course(store: Arc<dyn QueueStore>) {
    let engine = open_engine(store.clone()).await;
    engine.set_queue_open(OTHER_COURSE, true).await.unwrap();
    engine.join(COURSE, 1).await.unwrap();
    let other = engine.join(OTHER_COURSE, 1).await.unwrap();

    let waiting = keys::status_index(OTHER_COURSE, EntryStatus::Waiting);
    store
        .sorted_set_remove(&waiting, &other.id.to_string())
        .await
        .unwrap();

    let report = IndexReconciler::new(store.clone()).reconcile_all().await.unwrap();
    assert_eq!(report.courses, 2);
    assert_eq!(report.memberships_repaired, 1);
    assert_eq!(engine.get_position(OTHER_COURSE, 1).await.unwrap().position, 1);

    let second = IndexReconciler::new(store).reconcile_all().await.unwrap();
    assert!(second.is_clean());
}

async fn take_next_skips_stale_waiting_member(store: Arc<dyn QueueStore>) {
    let engine = open_engine(store.clone()).await;
    let first = engine.join(COURSE, 1).await.unwrap();
    let second = engine.join(COURSE, 2).await.unwrap();
    engine.assign(first.id, TA).await.unwrap();

    // Leftover membership at the head of the waiting line
    let waiting = keys::status_index(COURSE, EntryStatus::Waiting);
    store
        .sorted_set_add(&waiting, 0, &first.id.to_string())
        .await
        .unwrap();

    let taken = engine.take_next(COURSE, TA).await.unwrap().unwrap();
    assert_eq!(taken.id, second.id);
    assert!(members(&store, &waiting).await.is_empty());
}
