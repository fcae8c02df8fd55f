//! End-to-end friend-request lifecycle against the in-memory document store.

use futures_util::StreamExt;
use rapport::app::App;
use rapport::application_port::{RelationError, RelationFeed};
use rapport::domain_model::{PageSize, RelationChange, UserId};
use rapport::domain_port::{CollectionPath, DocumentStore, StoreError};
use rapport::infra_memory::{InMemoryDocumentStore, WriteOp};
use std::sync::Arc;
use std::time::Duration;

fn id(s: &str) -> UserId {
    s.parse().unwrap()
}

fn setup() -> (Arc<InMemoryDocumentStore>, App) {
    let store = Arc::new(InMemoryDocumentStore::new());
    let app = App::with_store(store.clone(), PageSize(10), PageSize(20));
    (store, app)
}

async fn next_change(feed: &mut RelationFeed) -> RelationChange {
    tokio::time::timeout(Duration::from_secs(1), feed.next())
        .await
        .expect("no notification within a second")
        .expect("feed ended")
        .expect("feed failed")
}

#[tokio::test]
async fn send_then_accept_makes_mutual_friends() {
    let (_, app) = setup();
    let relations = &app.relationship_service;
    let (u1, u2) = (id("u1"), id("u2"));

    relations.send(&u1, &u2).await.unwrap();
    assert_eq!(relations.waiting_ids(&u2).await.unwrap(), vec![u1.clone()]);
    assert_eq!(relations.request_ids(&u1).await.unwrap(), vec![u2.clone()]);

    relations.accept(&u2, &u1).await.unwrap();
    assert_eq!(relations.friend_ids(&u1).await.unwrap(), vec![u2.clone()]);
    assert_eq!(relations.friend_ids(&u2).await.unwrap(), vec![u1.clone()]);
    assert!(relations.waiting_ids(&u2).await.unwrap().is_empty());
    assert!(relations.request_ids(&u1).await.unwrap().is_empty());
}

#[tokio::test]
async fn send_then_cancel_clears_both_sides() {
    let (_, app) = setup();
    let relations = &app.relationship_service;
    let (u1, u2) = (id("u1"), id("u2"));

    relations.send(&u1, &u2).await.unwrap();
    relations.cancel_request(&u1, &u2).await.unwrap();

    assert!(relations.request_ids(&u1).await.unwrap().is_empty());
    assert!(relations.waiting_ids(&u2).await.unwrap().is_empty());
}

#[tokio::test]
async fn deny_clears_both_sides() {
    let (_, app) = setup();
    let relations = &app.relationship_service;
    let (a, b) = (id("a"), id("b"));

    relations.send(&a, &b).await.unwrap();
    relations.deny(&b, &a).await.unwrap();

    assert!(relations.request_ids(&a).await.unwrap().is_empty());
    assert!(relations.waiting_ids(&b).await.unwrap().is_empty());
    assert!(relations.friend_ids(&a).await.unwrap().is_empty());
}

#[tokio::test]
async fn remove_friend_is_symmetric() {
    let (_, app) = setup();
    let relations = &app.relationship_service;
    let (a, b) = (id("a"), id("b"));
    relations.send(&a, &b).await.unwrap();
    relations.accept(&b, &a).await.unwrap();

    relations.remove_friend(&a, &b).await.unwrap();

    assert!(relations.friend_ids(&a).await.unwrap().is_empty());
    assert!(relations.friend_ids(&b).await.unwrap().is_empty());
}

#[tokio::test]
async fn repeated_send_does_not_duplicate() {
    let (_, app) = setup();
    let relations = &app.relationship_service;
    let (a, b) = (id("a"), id("b"));

    relations.send(&a, &b).await.unwrap();
    relations.send(&a, &b).await.unwrap();

    assert_eq!(relations.request_ids(&a).await.unwrap(), vec![b.clone()]);
    assert_eq!(relations.waiting_ids(&b).await.unwrap(), vec![a.clone()]);
}

#[tokio::test]
async fn half_applied_send_is_finished_by_retry() {
    let (store, app) = setup();
    let relations = &app.relationship_service;
    let (a, b) = (id("a"), id("b"));
    let incoming_b = CollectionPath::relation(&b, rapport::domain_model::RelationKind::Incoming);
    store.fail_next(
        WriteOp::Set,
        incoming_b.clone(),
        StoreError::Unavailable("timeout".into()),
    );

    let err = relations.send(&a, &b).await.unwrap_err();
    assert!(matches!(err, RelationError::PartialWrite { .. }), "{err}");
    assert_eq!(relations.request_ids(&a).await.unwrap(), vec![b.clone()]);
    assert!(relations.waiting_ids(&b).await.unwrap().is_empty());

    relations.send(&a, &b).await.unwrap();
    assert_eq!(relations.waiting_ids(&b).await.unwrap(), vec![a.clone()]);
    assert!(store.get_document(&incoming_b, "a").await.unwrap().is_some());
}

#[tokio::test]
async fn request_feed_reports_arrival_and_each_resolution() {
    let (_, app) = setup();
    let relations = &app.relationship_service;
    let (a, b, c, d) = (id("a"), id("b"), id("c"), id("d"));

    let mut requests = relations.subscribe_requests(&b).await.unwrap();
    assert!(next_change(&mut requests).await.is_empty());

    for (sender, resolve) in [(&a, "deny"), (&c, "cancel"), (&d, "accept")] {
        relations.send(sender, &b).await.unwrap();
        let arrived = next_change(&mut requests).await;
        assert_eq!(arrived.added, vec![sender.clone()]);

        match resolve {
            "deny" => relations.deny(&b, sender).await.unwrap(),
            "cancel" => relations.cancel_request(sender, &b).await.unwrap(),
            _ => relations.accept(&b, sender).await.unwrap(),
        }
        let resolved = next_change(&mut requests).await;
        assert_eq!(resolved.removed, vec![sender.clone()], "{resolve}");
        assert!(resolved.added.is_empty());
    }
}

#[tokio::test]
async fn friends_and_sent_feeds_follow_the_lifecycle() {
    let (_, app) = setup();
    let relations = &app.relationship_service;
    let (a, b) = (id("a"), id("b"));

    let mut sent = relations.subscribe_sent_requests(&a).await.unwrap();
    let mut friends = relations.subscribe_friends(&a).await.unwrap();
    next_change(&mut sent).await;
    next_change(&mut friends).await;

    relations.send(&a, &b).await.unwrap();
    assert_eq!(next_change(&mut sent).await.added, vec![b.clone()]);

    relations.accept(&b, &a).await.unwrap();
    assert_eq!(next_change(&mut sent).await.removed, vec![b.clone()]);
    assert_eq!(next_change(&mut friends).await.added, vec![b.clone()]);

    relations.remove_friend(&b, &a).await.unwrap();
    assert_eq!(next_change(&mut friends).await.removed, vec![b.clone()]);
}

#[tokio::test]
async fn re_added_member_is_reported_every_time() {
    let (_, app) = setup();
    let relations = &app.relationship_service;
    let (a, b) = (id("a"), id("b"));
    let mut requests = relations.subscribe_requests(&b).await.unwrap();
    next_change(&mut requests).await;

    relations.send(&a, &b).await.unwrap();
    relations.cancel_request(&a, &b).await.unwrap();
    relations.send(&a, &b).await.unwrap();

    assert_eq!(next_change(&mut requests).await.added, vec![a.clone()]);
    assert_eq!(next_change(&mut requests).await.removed, vec![a.clone()]);
    assert_eq!(next_change(&mut requests).await.added, vec![a.clone()]);
}

#[tokio::test]
async fn cancelled_feed_ends() {
    let (_, app) = setup();
    let relations = &app.relationship_service;
    let (a, b) = (id("a"), id("b"));
    let mut requests = relations.subscribe_requests(&b).await.unwrap();
    next_change(&mut requests).await;

    requests.cancel();
    relations.send(&a, &b).await.unwrap();

    let end = tokio::time::timeout(Duration::from_secs(1), requests.next())
        .await
        .unwrap();
    assert!(end.is_none());
}
