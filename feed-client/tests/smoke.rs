use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::StreamExt;
use tokio::time::timeout;

use feed_client::{FeedClient, FeedClientError, PostDraft, ProfilePatch, PublishError};

fn unique_suffix() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock must be after unix epoch")
        .as_nanos();
    format!("{nanos}")
}

fn base_url() -> String {
    std::env::var("FEED_HTTP_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string())
}

// Минимальный валидный однопиксельный PNG.
const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x62, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

#[tokio::test]
#[ignore = "requires running HTTP server and database"]
async fn http_smoke_flow() {
    let mut alice = FeedClient::new(base_url());
    let mut bob = FeedClient::new(base_url());

    let suffix = unique_suffix();
    let password = "password123";

    let alice_auth = alice
        .register(
            &format!("alice_{suffix}"),
            &format!("alice_{suffix}@example.com"),
            password,
        )
        .await
        .expect("alice register must succeed");
    assert!(!alice_auth.access_token.is_empty());

    bob.register(
        &format!("bob_{suffix}"),
        &format!("bob_{suffix}@example.com"),
        password,
    )
    .await
    .expect("bob register must succeed");

    // Профиль: merge-патч меняет только переданные поля.
    let patched = alice
        .update_profile(&ProfilePatch {
            bio: Some("coffee and cameras".to_string()),
            ..Default::default()
        })
        .await
        .expect("profile patch must succeed");
    assert_eq!(patched.bio, "coffee and cameras");
    assert_eq!(patched.username, alice_auth.user.username);

    // Публикация текстового поста.
    let created = alice
        .publish(PostDraft::text("hi"))
        .await
        .expect("publish must succeed");
    assert_eq!(created.post.text.as_deref(), Some("hi"));
    assert!(!created.liked_by_viewer);

    // Лента глазами автора.
    let alice_feed = alice.feed().await.expect("feed must succeed");
    let entry = alice_feed
        .posts
        .iter()
        .find(|entry| entry.post.id == created.post.id)
        .expect("created post must be in the feed");
    assert!(!entry.liked_by_viewer);

    // Два последовательных переключения лайка возвращают исходное состояние.
    let liked = alice
        .toggle_like(created.post.id)
        .await
        .expect("first toggle must succeed");
    assert!(liked.liked);
    assert_eq!(liked.like_count, 1);

    // Лайк виден только тому, кто его поставил.
    let alice_feed = alice.feed().await.expect("feed must succeed");
    assert!(
        alice_feed
            .posts
            .iter()
            .find(|entry| entry.post.id == created.post.id)
            .expect("post must be in the feed")
            .liked_by_viewer
    );
    let bob_feed = bob.feed().await.expect("feed must succeed");
    let bob_entry = bob_feed
        .posts
        .iter()
        .find(|entry| entry.post.id == created.post.id)
        .expect("post must be in bob's feed");
    assert!(!bob_entry.liked_by_viewer);
    assert_eq!(bob_entry.post.like_count, 1);

    let unliked = alice
        .toggle_like(created.post.id)
        .await
        .expect("second toggle must succeed");
    assert!(!unliked.liked);
    assert_eq!(unliked.like_count, 0);

    // Комментарий с денормализованным автором.
    let comment = bob
        .add_comment(created.post.id, "nice")
        .await
        .expect("add_comment must succeed");
    assert_eq!(comment.author_username, format!("bob_{suffix}"));

    let comments = alice
        .comments(created.post.id)
        .await
        .expect("comments must succeed");
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].text, "nice");

    // Редактируется только текст; updated_at появляется после правки.
    let updated = alice
        .update_post(created.post.id, "hi, edited")
        .await
        .expect("update_post must succeed");
    assert_eq!(updated.text.as_deref(), Some("hi, edited"));
    assert!(updated.updated_at.is_some());

    alice
        .delete_post(created.post.id)
        .await
        .expect("delete_post must succeed");

    let after_delete = alice.get_post(created.post.id).await;
    assert!(matches!(after_delete, Err(FeedClientError::NotFound)));

    // После удаления пост не появляется ни в одном снапшоте.
    let final_feed = alice.feed().await.expect("feed must succeed");
    assert!(
        final_feed
            .posts
            .iter()
            .all(|entry| entry.post.id != created.post.id)
    );
}

#[tokio::test]
#[ignore = "requires running HTTP server and database"]
async fn photo_post_uploads_then_inserts() {
    let mut client = FeedClient::new(base_url());

    let suffix = unique_suffix();
    client
        .register(
            &format!("photo_{suffix}"),
            &format!("photo_{suffix}@example.com"),
            "password123",
        )
        .await
        .expect("register must succeed");

    let draft = PostDraft::text("look at this").with_image(TINY_PNG.to_vec(), "image/png");
    let created = client.publish(draft).await.expect("publish must succeed");

    let image_url = created
        .post
        .image_url
        .as_deref()
        .expect("photo post must carry an image url");
    assert!(image_url.contains("/media/"));

    // URL публичный: картинка должна отдаваться без токена.
    let fetched = reqwest::get(image_url)
        .await
        .expect("image request must succeed");
    assert!(fetched.status().is_success());

    client
        .delete_post(created.post.id)
        .await
        .expect("delete_post must succeed");
}

#[tokio::test]
#[ignore = "requires running HTTP server and database"]
async fn publish_with_bad_image_keeps_draft() {
    let mut client = FeedClient::new(base_url());

    let suffix = unique_suffix();
    client
        .register(
            &format!("draft_{suffix}"),
            &format!("draft_{suffix}@example.com"),
            "password123",
        )
        .await
        .expect("register must succeed");

    // Неподдерживаемый тип не ретраится и возвращает черновик целиком.
    let draft = PostDraft::text("keep me").with_image(b"not an image".to_vec(), "text/plain");
    let err = client
        .publish(draft)
        .await
        .expect_err("publish must fail on upload");

    match err {
        PublishError::Upload { draft, .. } => {
            assert_eq!(draft.text.as_deref(), Some("keep me"));
            assert!(draft.image.is_some());
        }
        other => panic!("expected upload failure, got: {other}"),
    }
}

#[tokio::test]
#[ignore = "requires running HTTP server and database"]
async fn feed_stream_delivers_snapshots() {
    let mut watcher = FeedClient::new(base_url());
    let mut author = FeedClient::new(base_url());

    let suffix = unique_suffix();
    watcher
        .register(
            &format!("watch_{suffix}"),
            &format!("watch_{suffix}@example.com"),
            "password123",
        )
        .await
        .expect("watcher register must succeed");
    author
        .register(
            &format!("author_{suffix}"),
            &format!("author_{suffix}@example.com"),
            "password123",
        )
        .await
        .expect("author register must succeed");

    let stream = watcher
        .watch_feed()
        .await
        .expect("subscription must open");
    tokio::pin!(stream);

    // Начальный снапшот приходит сразу после подписки.
    timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("initial snapshot must arrive")
        .expect("stream must be open")
        .expect("snapshot must decode");

    let marker = format!("stream marker {suffix}");
    let created = author
        .publish(PostDraft::text(marker.clone()))
        .await
        .expect("publish must succeed");

    // Следующий снапшот отражает новый пост.
    let mut seen = false;
    for _ in 0..5 {
        let snapshot = timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("snapshot must arrive")
            .expect("stream must be open")
            .expect("snapshot must decode");
        if snapshot
            .posts
            .iter()
            .any(|entry| entry.post.text.as_deref() == Some(marker.as_str()))
        {
            seen = true;
            break;
        }
    }
    assert!(seen, "published post must show up in the stream");

    author
        .delete_post(created.post.id)
        .await
        .expect("delete_post must succeed");
}
