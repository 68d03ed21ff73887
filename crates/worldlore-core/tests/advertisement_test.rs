//! Integration test: advertisement claims.
//!
//! ## Scenario
//! 1. Post an advertisement; agent A claims it, agent B is refused.
//! 2. Cancel releases the claim; B can now claim it.
//! 3. Complete raises `AdvertisementCompleted`, then `Removed`, and the record is gone.

use std::sync::{Arc, Mutex};
use worldlore_core::{
    EntityId, EventFilter, KnowledgeConfig, KnowledgeEvent, KnowledgeEventKind, KnowledgeHandle,
    KnowledgeRecord, KnowledgeStore, ManualClock, TagQuery, TagSet, Vec3,
};

type Log = Arc<Mutex<Vec<(KnowledgeEventKind, KnowledgeHandle)>>>;

fn recording_store() -> (KnowledgeStore, Log) {
    let mut store = KnowledgeStore::new(KnowledgeConfig::default(), Arc::new(ManualClock::new(0.0)));
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    store.subscribe(EventFilter::all(), move |e: &KnowledgeEvent| {
        sink.lock().unwrap().push((e.kind, e.handle));
    });
    (store, log)
}

fn job() -> KnowledgeRecord {
    let tags: TagSet = ["Job.Harvest"].into_iter().collect();
    KnowledgeRecord::new(tags, Vec3::new(250.0, 0.0, 0.0))
}

#[test]
fn claim_is_exclusive_until_cancelled() {
    let (mut store, _) = recording_store();
    let a = EntityId(1);
    let b = EntityId(2);
    let ad = store.post(job());

    assert!(store.claim(ad, a));
    assert!(!store.claim(ad, b), "second claimant refused");
    assert_eq!(store.claimant(ad), Some(a));

    assert!(store.cancel(ad));
    assert!(!store.is_claimed(ad));
    assert_eq!(store.claimant(ad), None);

    assert!(store.claim(ad, b));
    assert_eq!(store.claimant(ad), Some(b));
}

#[test]
fn claim_on_missing_record_fails() {
    let (mut store, _) = recording_store();
    let ghost = KnowledgeHandle::from_raw(999);
    assert!(!store.claim(ghost, EntityId(1)));
    assert!(!store.cancel(ghost));
    assert!(!store.complete(ghost));
    assert!(!store.claim(KnowledgeHandle::INVALID, EntityId(1)));
}

#[test]
fn lifecycle_raises_events_in_order() {
    let (mut store, log) = recording_store();
    let ad = store.post(job());
    assert!(store.claim(ad, EntityId(7)));
    assert!(store.cancel(ad));
    assert!(store.complete(ad));

    assert!(!store.contains(ad));
    assert!(store.query_in_radius(Vec3::new(250.0, 0.0, 0.0), 1.0, &TagQuery::Empty).is_empty());

    let kinds: Vec<KnowledgeEventKind> = log.lock().unwrap().iter().map(|(k, _)| *k).collect();
    assert_eq!(
        kinds,
        vec![
            KnowledgeEventKind::Registered,
            KnowledgeEventKind::AdvertisementPosted,
            KnowledgeEventKind::AdvertisementClaimed,
            KnowledgeEventKind::AdvertisementCompleted,
            KnowledgeEventKind::Removed,
        ],
        "cancel raises no event"
    );
    assert!(log.lock().unwrap().iter().all(|(_, h)| *h == ad));
    store.verify_indices().expect("consistent after completion");
}

#[test]
fn claimed_event_carries_claimant() {
    let mut store = KnowledgeStore::new(KnowledgeConfig::default(), Arc::new(ManualClock::new(0.0)));
    let seen: Arc<Mutex<Vec<KnowledgeEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    store.subscribe(
        EventFilter::kinds([KnowledgeEventKind::AdvertisementClaimed]),
        move |e: &KnowledgeEvent| sink.lock().unwrap().push(e.clone()),
    );

    let ad = store.post(job());
    store.claim(ad, EntityId(42));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].claimed_by, Some(EntityId(42)));
}
