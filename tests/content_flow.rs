//! Profiles, posts and chat traffic through the wired services.

use chrono::{TimeZone, Utc};
use futures_util::StreamExt;
use rapport::app::App;
use rapport::domain_model::{Message, PageSize, Post, Profile, UserId};
use rapport::domain_port::{CollectionPath, DocumentStore};
use rapport::infra_memory::InMemoryDocumentStore;
use std::sync::Arc;
use std::time::Duration;

fn id(s: &str) -> UserId {
    s.parse().unwrap()
}

fn setup() -> (Arc<InMemoryDocumentStore>, App) {
    let store = Arc::new(InMemoryDocumentStore::new());
    let app = App::with_store(store.clone(), PageSize(2), PageSize(2));
    (store, app)
}

async fn put_profile(store: &InMemoryDocumentStore, user: &str, active_at_ms: i64) {
    let mut profile = Profile::new(id(user), user);
    profile.last_activity = Utc.timestamp_millis_opt(active_at_ms).single();
    store
        .set_document(&CollectionPath::users(), user, profile.to_fields().unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn profile_paging_survives_the_cursor_account_going_offline() {
    let (store, app) = setup();
    for (user, ms) in [("a", 4_000), ("b", 3_000), ("c", 2_000), ("d", 1_000)] {
        put_profile(&store, user, ms).await;
    }

    let first = app
        .profile_service
        .list_profile_ids(app.profile_page_size, None)
        .await
        .unwrap();
    assert_eq!(first.ids, vec![id("a"), id("b")]);

    app.account_service.set_offline(&id("b")).await.unwrap();

    let second = app
        .profile_service
        .list_profile_ids(app.profile_page_size, first.next)
        .await
        .unwrap();
    assert_eq!(second.ids, vec![id("c"), id("d")]);
}

#[tokio::test]
async fn profile_feed_reports_going_offline() {
    let (store, app) = setup();
    put_profile(&store, "u1", 1_000).await;
    let mut feed = app.profile_service.subscribe_profile(&id("u1")).await.unwrap();
    assert!(feed.next().await.unwrap().unwrap().online);

    app.account_service.set_offline(&id("u1")).await.unwrap();

    let offline = tokio::time::timeout(Duration::from_secs(1), feed.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(!offline.online);
    assert!(offline.last_activity.unwrap().timestamp_millis() > 1_000);
}

#[tokio::test]
async fn post_lifecycle_with_likes_and_paging() {
    let (store, app) = setup();
    put_profile(&store, "u1", 1_000).await;
    let posts = &app.post_service;

    let mut created = Vec::new();
    for (n, ms) in [(1, 1_000), (2, 2_000), (3, 3_000)] {
        let mut post = Post::new(id("u1"), format!("post {n}"));
        post.date = Utc.timestamp_millis_opt(ms).unwrap();
        posts.create_post(&post).await.unwrap();
        created.push(post);
    }
    posts.like_post(&created[2], &id("u2")).await.unwrap();

    let first = posts.all_posts(app.post_page_size, None).await.unwrap();
    let texts: Vec<_> = first.posts.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(texts, ["post 3", "post 2"]);
    assert!(first.posts[0].liked_by(&id("u2")));
    assert_eq!(
        first.posts[0].owner_profile.as_ref().unwrap().posts_count,
        3
    );

    let second = posts.all_posts(app.post_page_size, first.next).await.unwrap();
    assert_eq!(second.posts.len(), 1);
    assert_eq!(second.posts[0].text, "post 1");
    assert!(second.next.is_none());

    posts.unlike_post(&created[2], &id("u2")).await.unwrap();
    posts.delete_post(&created[2]).await.unwrap();
    let mine = posts
        .user_posts(&id("u1"), PageSize(10), None)
        .await
        .unwrap();
    let texts: Vec<_> = mine.posts.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(texts, ["post 2", "post 1"]);
}

#[tokio::test]
async fn chat_exchange_delivers_messages_and_receipts() {
    let (_, app) = setup();
    let chat = &app.messaging_service;
    let (ann, bob) = (id("ann"), id("bob"));
    let mut bob_inbox = chat.subscribe_messages(&bob).await.unwrap();
    let mut ann_receipts = chat.subscribe_looked(&ann).await.unwrap();

    chat.send_typing(&ann, &bob).await.unwrap();
    assert!(chat.is_typing(&bob, &ann).await.unwrap());
    chat.send_message(&Message::text(ann.clone(), bob.clone(), "hello"))
        .await
        .unwrap();
    chat.send_finish_typing(&ann, &bob).await.unwrap();

    let delivered = bob_inbox.next().await.unwrap().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].content, "hello");
    assert_eq!(delivered[0].sender, ann);

    chat.send_looked(&bob, &ann).await.unwrap();
    assert_eq!(ann_receipts.next().await.unwrap().unwrap(), vec![bob.clone()]);
    assert!(!chat.is_typing(&bob, &ann).await.unwrap());
}
