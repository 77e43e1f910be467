use std::sync::Arc;

use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::warn;

use crate::data::post_repository::{NewComment, NewPost, PostRepository};
use crate::data::user_repository::UserRepository;
use crate::domain::comment::{AddCommentRequest, Comment};
use crate::domain::error::DomainError;
use crate::domain::post::{
    CreatePostRequest, FeedPost, FeedSnapshot, LikeOutcome, Post, UpdatePostRequest,
};
use crate::infrastructure::changefeed::{ChangeFeed, StoreEvent};

/// Живая лента: начальный снапшот и по одному на каждое релевантное событие
/// стора. Снапшоты самодостаточны, поэтому пропущенные события не ломают
/// консистентность. Отписка — бросить receiver.
pub(crate) struct FeedSubscription {
    rx: mpsc::Receiver<FeedSnapshot>,
}

impl FeedSubscription {
    pub(crate) async fn next_snapshot(&mut self) -> Option<FeedSnapshot> {
        self.rx.recv().await
    }

    pub(crate) fn into_receiver(self) -> mpsc::Receiver<FeedSnapshot> {
        self.rx
    }
}

#[derive(Debug)]
pub(crate) struct CommentsSubscription {
    rx: mpsc::Receiver<Vec<Comment>>,
}

impl CommentsSubscription {
    pub(crate) async fn next_snapshot(&mut self) -> Option<Vec<Comment>> {
        self.rx.recv().await
    }

    pub(crate) fn into_receiver(self) -> mpsc::Receiver<Vec<Comment>> {
        self.rx
    }
}

pub(crate) struct FeedService<P: PostRepository, U: UserRepository> {
    posts: P,
    users: U,
    changes: Arc<ChangeFeed>,
    snapshot_limit: u32,
}

impl<P, U> FeedService<P, U>
where
    P: PostRepository + Clone + 'static,
    U: UserRepository + Clone + 'static,
{
    pub(crate) fn new(posts: P, users: U, changes: Arc<ChangeFeed>, snapshot_limit: u32) -> Self {
        Self {
            posts,
            users,
            changes,
            snapshot_limit,
        }
    }

    pub(crate) async fn fetch(
        &self,
        viewer_id: i64,
        limit: Option<u32>,
    ) -> Result<FeedSnapshot, DomainError> {
        let limit = limit.unwrap_or(self.snapshot_limit);
        let posts = self.posts.feed(viewer_id, limit).await?;
        Ok(FeedSnapshot { posts })
    }

    pub(crate) fn subscribe(&self, viewer_id: i64, limit: Option<u32>) -> FeedSubscription {
        // Receiver создаётся до возврата: события, опубликованные после
        // вызова subscribe, уже не теряются.
        let mut events = self.changes.subscribe();
        let posts = self.posts.clone();
        let limit = limit.unwrap_or(self.snapshot_limit);
        let (tx, rx) = mpsc::channel(8);

        tokio::spawn(async move {
            match posts.feed(viewer_id, limit).await {
                Ok(list) => {
                    if tx.send(FeedSnapshot { posts: list }).await.is_err() {
                        return;
                    }
                }
                Err(err) => {
                    warn!(viewer_id, error = %err, "feed subscription: initial read failed");
                    return;
                }
            }

            loop {
                match events.recv().await {
                    Ok(event) if event.touches_feed() => {}
                    Ok(_) => continue,
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }

                match posts.feed(viewer_id, limit).await {
                    Ok(list) => {
                        if tx.send(FeedSnapshot { posts: list }).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(viewer_id, error = %err, "feed subscription: re-read failed");
                    }
                }
            }
        });

        FeedSubscription { rx }
    }

    pub(crate) async fn create_post(
        &self,
        author_id: i64,
        req: CreatePostRequest,
    ) -> Result<FeedPost, DomainError> {
        let req = req.validate()?;

        // Авторские поля денормализуются на момент записи и дальше не
        // пересинхронизируются.
        let author = self
            .users
            .get_profile(author_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("user id: {author_id}")))?;

        let new_post = NewPost {
            author_id,
            author_username: author.username,
            author_avatar_url: author.avatar_url,
            text: req.text,
            image_url: req.image_url,
            idempotency_key: req.idempotency_key,
        };
        let post = self.posts.create_post(new_post).await?;

        self.changes
            .publish(StoreEvent::PostCreated { post_id: post.id });
        Ok(FeedPost {
            post,
            liked_by_viewer: false,
        })
    }

    pub(crate) async fn get_post(&self, id: i64) -> Result<Post, DomainError> {
        self.posts
            .get_post(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("post id: {id}")))
    }

    pub(crate) async fn update_post(
        &self,
        actor_id: i64,
        post_id: i64,
        req: UpdatePostRequest,
    ) -> Result<Post, DomainError> {
        let req = req.validate()?;

        let post = self
            .posts
            .update_post_owned(post_id, actor_id, req.text)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("post id: {post_id}")))?;

        self.changes.publish(StoreEvent::PostUpdated { post_id });
        Ok(post)
    }

    pub(crate) async fn delete_post(&self, actor_id: i64, post_id: i64) -> Result<(), DomainError> {
        let original_post = self
            .posts
            .get_post(post_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("post id: {post_id}")))?;

        if original_post.author_id != actor_id {
            return Err(DomainError::Forbidden);
        }

        let deleted = self.posts.delete_post(post_id).await?;
        if !deleted {
            return Err(DomainError::NotFound(format!("post id: {post_id}")));
        }

        self.changes.publish(StoreEvent::PostDeleted { post_id });
        Ok(())
    }

    pub(crate) async fn toggle_like(
        &self,
        viewer_id: i64,
        post_id: i64,
    ) -> Result<LikeOutcome, DomainError> {
        let outcome = self.posts.toggle_like(post_id, viewer_id).await?;
        self.changes.publish(StoreEvent::LikeToggled { post_id });
        Ok(outcome)
    }

    pub(crate) async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, DomainError> {
        // Точечная проверка, чтобы отличать «нет комментариев» от «нет поста».
        self.posts
            .get_post(post_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("post id: {post_id}")))?;

        self.posts.list_comments(post_id).await
    }

    pub(crate) async fn add_comment(
        &self,
        author_id: i64,
        post_id: i64,
        req: AddCommentRequest,
    ) -> Result<Comment, DomainError> {
        let req = req.validate()?;

        let author = self
            .users
            .get_profile(author_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("user id: {author_id}")))?;

        let comment = self
            .posts
            .add_comment(NewComment {
                post_id,
                author_id,
                author_username: author.username,
                author_avatar_url: author.avatar_url,
                text: req.text,
            })
            .await?;

        self.changes.publish(StoreEvent::CommentAdded { post_id });
        Ok(comment)
    }

    pub(crate) async fn subscribe_comments(
        &self,
        post_id: i64,
    ) -> Result<CommentsSubscription, DomainError> {
        self.posts
            .get_post(post_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("post id: {post_id}")))?;

        let mut events = self.changes.subscribe();
        let posts = self.posts.clone();
        let (tx, rx) = mpsc::channel(8);

        tokio::spawn(async move {
            match posts.list_comments(post_id).await {
                Ok(list) => {
                    if tx.send(list).await.is_err() {
                        return;
                    }
                }
                Err(err) => {
                    warn!(post_id, error = %err, "comments subscription: initial read failed");
                    return;
                }
            }

            loop {
                match events.recv().await {
                    Ok(StoreEvent::CommentAdded { post_id: id }) if id == post_id => {}
                    // Пост удалён — стрим комментариев закрывается.
                    Ok(StoreEvent::PostDeleted { post_id: id }) if id == post_id => break,
                    Ok(_) => continue,
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }

                match posts.list_comments(post_id).await {
                    Ok(list) => {
                        if tx.send(list).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(post_id, error = %err, "comments subscription: re-read failed");
                    }
                }
            }
        });

        Ok(CommentsSubscription { rx })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::time::timeout;

    use super::FeedService;
    use crate::data::post_repository::{NewComment, NewPost, PostRepository};
    use crate::data::user_repository::{NewUser, ProfilePatch, UserCredentials, UserRepository};
    use crate::domain::comment::{AddCommentRequest, Comment};
    use crate::domain::error::DomainError;
    use crate::domain::post::{CreatePostRequest, FeedPost, LikeOutcome, Post, UpdatePostRequest};
    use crate::domain::user::Profile;
    use crate::infrastructure::changefeed::ChangeFeed;

    #[derive(Default)]
    struct PostStoreState {
        posts: Vec<Post>,
        likes: BTreeSet<(i64, i64)>,
        comments: Vec<Comment>,
        next_post_id: i64,
        next_comment_id: i64,
        create_calls: usize,
        update_calls: usize,
    }

    /// Поведенческий fake: хранит посты/лайки/комментарии в памяти и
    /// воспроизводит контракт Postgres-репозитория.
    #[derive(Clone)]
    struct InMemoryPostRepo {
        state: Arc<Mutex<PostStoreState>>,
    }

    impl InMemoryPostRepo {
        fn new() -> Self {
            Self {
                state: Arc::new(Mutex::new(PostStoreState {
                    next_post_id: 1,
                    next_comment_id: 1,
                    ..Default::default()
                })),
            }
        }

        fn create_calls(&self) -> usize {
            self.state.lock().expect("state mutex poisoned").create_calls
        }

        fn update_calls(&self) -> usize {
            self.state.lock().expect("state mutex poisoned").update_calls
        }
    }

    #[async_trait]
    impl PostRepository for InMemoryPostRepo {
        async fn create_post(&self, input: NewPost) -> Result<Post, DomainError> {
            let mut state = self.state.lock().expect("state mutex poisoned");
            state.create_calls += 1;

            let id = state.next_post_id;
            state.next_post_id += 1;
            let post = Post::new(
                id,
                input.author_id,
                input.author_username,
                input.author_avatar_url,
                input.text,
                input.image_url,
                0,
                Utc::now(),
                None,
            )?;
            state.posts.push(post.clone());
            Ok(post)
        }

        async fn get_post(&self, id: i64) -> Result<Option<Post>, DomainError> {
            let state = self.state.lock().expect("state mutex poisoned");
            Ok(state.posts.iter().find(|post| post.id == id).cloned())
        }

        async fn update_post_owned(
            &self,
            post_id: i64,
            owner_id: i64,
            text: String,
        ) -> Result<Option<Post>, DomainError> {
            let mut state = self.state.lock().expect("state mutex poisoned");
            state.update_calls += 1;
            let Some(post) = state
                .posts
                .iter_mut()
                .find(|post| post.id == post_id && post.author_id == owner_id)
            else {
                return Ok(None);
            };
            post.text = Some(text);
            post.updated_at = Some(Utc::now());
            Ok(Some(post.clone()))
        }

        async fn delete_post(&self, id: i64) -> Result<bool, DomainError> {
            let mut state = self.state.lock().expect("state mutex poisoned");
            let before = state.posts.len();
            state.posts.retain(|post| post.id != id);
            state.likes.retain(|(post_id, _)| *post_id != id);
            state.comments.retain(|comment| comment.post_id != id);
            Ok(state.posts.len() < before)
        }

        async fn feed(&self, viewer_id: i64, limit: u32) -> Result<Vec<FeedPost>, DomainError> {
            let state = self.state.lock().expect("state mutex poisoned");
            let mut posts: Vec<_> = state.posts.clone();
            posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(posts
                .into_iter()
                .take(limit as usize)
                .map(|post| {
                    let liked_by_viewer = state.likes.contains(&(post.id, viewer_id));
                    FeedPost {
                        post,
                        liked_by_viewer,
                    }
                })
                .collect())
        }

        async fn toggle_like(
            &self,
            post_id: i64,
            user_id: i64,
        ) -> Result<LikeOutcome, DomainError> {
            let mut state = self.state.lock().expect("state mutex poisoned");
            if !state.posts.iter().any(|post| post.id == post_id) {
                return Err(DomainError::NotFound(format!("post id: {post_id}")));
            }

            let liked = state.likes.insert((post_id, user_id));
            if !liked {
                state.likes.remove(&(post_id, user_id));
            }
            let delta = if liked { 1 } else { -1 };
            let post = state
                .posts
                .iter_mut()
                .find(|post| post.id == post_id)
                .expect("post existence checked above");
            post.like_count += delta;
            Ok(LikeOutcome {
                liked,
                like_count: post.like_count,
            })
        }

        async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, DomainError> {
            let state = self.state.lock().expect("state mutex poisoned");
            Ok(state
                .comments
                .iter()
                .filter(|comment| comment.post_id == post_id)
                .cloned()
                .collect())
        }

        async fn add_comment(&self, input: NewComment) -> Result<Comment, DomainError> {
            let mut state = self.state.lock().expect("state mutex poisoned");
            if !state.posts.iter().any(|post| post.id == input.post_id) {
                return Err(DomainError::NotFound("post".to_string()));
            }

            let id = state.next_comment_id;
            state.next_comment_id += 1;
            let comment = Comment::new(
                id,
                input.post_id,
                input.author_id,
                input.author_username,
                input.author_avatar_url,
                input.text,
                Utc::now(),
            )?;
            state.comments.push(comment.clone());
            Ok(comment)
        }
    }

    #[derive(Clone)]
    struct FakeUserRepo {
        profiles: Arc<Mutex<HashMap<i64, Profile>>>,
    }

    impl FakeUserRepo {
        fn with_profiles(profiles: Vec<Profile>) -> Self {
            Self {
                profiles: Arc::new(Mutex::new(
                    profiles
                        .into_iter()
                        .map(|profile| (profile.id, profile))
                        .collect(),
                )),
            }
        }
    }

    #[async_trait]
    impl UserRepository for FakeUserRepo {
        async fn create_user(&self, _input: NewUser) -> Result<Profile, DomainError> {
            Err(DomainError::Unexpected("not used".to_string()))
        }

        async fn find_by_username(
            &self,
            _username: &str,
        ) -> Result<Option<UserCredentials>, DomainError> {
            Ok(None)
        }

        async fn get_profile(&self, user_id: i64) -> Result<Option<Profile>, DomainError> {
            Ok(self
                .profiles
                .lock()
                .expect("profiles mutex poisoned")
                .get(&user_id)
                .cloned())
        }

        async fn update_profile(
            &self,
            _user_id: i64,
            _patch: ProfilePatch,
        ) -> Result<Option<Profile>, DomainError> {
            Ok(None)
        }
    }

    fn service_with_users(
        users: Vec<Profile>,
    ) -> (FeedService<InMemoryPostRepo, FakeUserRepo>, InMemoryPostRepo) {
        let posts = InMemoryPostRepo::new();
        let service = FeedService::new(
            posts.clone(),
            FakeUserRepo::with_profiles(users),
            Arc::new(ChangeFeed::new(16)),
            50,
        );
        (service, posts)
    }

    fn sample_profile(id: i64, username: &str) -> Profile {
        Profile::new(
            id,
            username.to_string(),
            format!("{username}@example.com"),
            None,
            "",
            Some(format!("https://cdn.example.com/{username}.png")),
            0,
            0,
            0,
            Utc::now(),
            None,
        )
        .expect("sample profile must be valid")
    }

    fn text_post(text: &str) -> CreatePostRequest {
        CreatePostRequest {
            text: Some(text.to_string()),
            image_url: None,
            idempotency_key: None,
        }
    }

    #[tokio::test]
    async fn create_post_denormalizes_author_fields() {
        let (service, _) = service_with_users(vec![sample_profile(10, "alice")]);

        let created = service
            .create_post(10, text_post("hi"))
            .await
            .expect("create_post must succeed");

        assert_eq!(created.post.author_username, "alice");
        assert_eq!(
            created.post.author_avatar_url.as_deref(),
            Some("https://cdn.example.com/alice.png")
        );
        assert!(!created.liked_by_viewer);
    }

    #[tokio::test]
    async fn create_post_without_content_is_rejected_before_repo_call() {
        let (service, posts) = service_with_users(vec![sample_profile(10, "alice")]);

        let req = CreatePostRequest {
            text: Some("".to_string()),
            image_url: None,
            idempotency_key: None,
        };
        let err = service
            .create_post(10, req)
            .await
            .expect_err("empty post must be rejected");

        assert!(matches!(err, DomainError::Validation { field: "post", .. }));
        assert_eq!(posts.create_calls(), 0);
    }

    #[tokio::test]
    async fn update_post_with_empty_text_does_not_contact_store() {
        let (service, posts) = service_with_users(vec![sample_profile(10, "alice")]);
        service
            .create_post(10, text_post("hi"))
            .await
            .expect("create_post must succeed");

        let err = service
            .update_post(
                10,
                1,
                UpdatePostRequest {
                    text: "   ".to_string(),
                },
            )
            .await
            .expect_err("empty text must be rejected");

        assert!(matches!(err, DomainError::Validation { field: "text", .. }));
        assert_eq!(posts.update_calls(), 0);
    }

    #[tokio::test]
    async fn update_post_sets_updated_at() {
        let (service, _) = service_with_users(vec![sample_profile(10, "alice")]);
        let created = service
            .create_post(10, text_post("hi"))
            .await
            .expect("create_post must succeed");
        assert!(created.post.updated_at.is_none());

        let updated = service
            .update_post(
                10,
                created.post.id,
                UpdatePostRequest {
                    text: "edited".to_string(),
                },
            )
            .await
            .expect("update must succeed");

        assert_eq!(updated.text.as_deref(), Some("edited"));
        assert!(updated.updated_at.is_some());
    }

    #[tokio::test]
    async fn delete_post_is_forbidden_for_non_author() {
        let (service, _) =
            service_with_users(vec![sample_profile(10, "alice"), sample_profile(20, "bob")]);
        let created = service
            .create_post(10, text_post("hi"))
            .await
            .expect("create_post must succeed");

        let err = service
            .delete_post(20, created.post.id)
            .await
            .expect_err("must be forbidden");
        assert!(matches!(err, DomainError::Forbidden));
    }

    #[tokio::test]
    async fn deleted_post_never_appears_in_later_snapshots() {
        let (service, _) = service_with_users(vec![sample_profile(10, "alice")]);
        let created = service
            .create_post(10, text_post("hi"))
            .await
            .expect("create_post must succeed");

        let mut subscription = service.subscribe(10, None);
        let initial = timeout(Duration::from_secs(1), subscription.next_snapshot())
            .await
            .expect("initial snapshot must arrive")
            .expect("subscription must be open");
        assert_eq!(initial.posts.len(), 1);

        service
            .delete_post(10, created.post.id)
            .await
            .expect("delete must succeed");

        let after_delete = timeout(Duration::from_secs(1), subscription.next_snapshot())
            .await
            .expect("snapshot after delete must arrive")
            .expect("subscription must be open");
        assert!(
            after_delete
                .posts
                .iter()
                .all(|entry| entry.post.id != created.post.id)
        );
    }

    #[tokio::test]
    async fn toggling_like_twice_restores_original_state() {
        let (service, _) = service_with_users(vec![sample_profile(10, "alice")]);
        let created = service
            .create_post(10, text_post("hi"))
            .await
            .expect("create_post must succeed");

        let first = service
            .toggle_like(10, created.post.id)
            .await
            .expect("first toggle must succeed");
        assert!(first.liked);
        assert_eq!(first.like_count, 1);

        let second = service
            .toggle_like(10, created.post.id)
            .await
            .expect("second toggle must succeed");
        assert!(!second.liked);
        assert_eq!(second.like_count, 0);
    }

    #[tokio::test]
    async fn like_state_is_per_viewer() {
        let (service, _) =
            service_with_users(vec![sample_profile(10, "alice"), sample_profile(20, "bob")]);
        service
            .create_post(10, text_post("hi"))
            .await
            .expect("create_post must succeed");

        service
            .toggle_like(10, 1)
            .await
            .expect("toggle must succeed");

        let alice_feed = service.fetch(10, None).await.expect("fetch must succeed");
        assert!(alice_feed.posts[0].liked_by_viewer);
        assert_eq!(alice_feed.posts[0].post.like_count, 1);

        let bob_feed = service.fetch(20, None).await.expect("fetch must succeed");
        assert!(!bob_feed.posts[0].liked_by_viewer);
        assert_eq!(bob_feed.posts[0].post.like_count, 1);
    }

    #[tokio::test]
    async fn subscribe_emits_snapshot_on_new_post() {
        let (service, _) = service_with_users(vec![sample_profile(10, "alice")]);

        let mut subscription = service.subscribe(10, None);
        let initial = timeout(Duration::from_secs(1), subscription.next_snapshot())
            .await
            .expect("initial snapshot must arrive")
            .expect("subscription must be open");
        assert!(initial.posts.is_empty());

        service
            .create_post(10, text_post("hi"))
            .await
            .expect("create_post must succeed");

        let updated = timeout(Duration::from_secs(1), subscription.next_snapshot())
            .await
            .expect("snapshot after create must arrive")
            .expect("subscription must be open");
        assert_eq!(updated.posts.len(), 1);
        assert_eq!(updated.posts[0].post.text.as_deref(), Some("hi"));
        assert!(!updated.posts[0].liked_by_viewer);
    }

    #[tokio::test]
    async fn add_comment_rejects_empty_text() {
        let (service, _) = service_with_users(vec![sample_profile(10, "alice")]);
        let created = service
            .create_post(10, text_post("hi"))
            .await
            .expect("create_post must succeed");

        let err = service
            .add_comment(
                10,
                created.post.id,
                AddCommentRequest {
                    text: "   ".to_string(),
                },
            )
            .await
            .expect_err("empty comment must be rejected");
        assert!(matches!(err, DomainError::Validation { field: "text", .. }));
    }

    #[tokio::test]
    async fn add_comment_denormalizes_author_and_notifies_subscription() {
        let (service, _) =
            service_with_users(vec![sample_profile(10, "alice"), sample_profile(20, "bob")]);
        let created = service
            .create_post(10, text_post("hi"))
            .await
            .expect("create_post must succeed");

        let mut subscription = service
            .subscribe_comments(created.post.id)
            .await
            .expect("subscription must open");
        let initial = timeout(Duration::from_secs(1), subscription.next_snapshot())
            .await
            .expect("initial snapshot must arrive")
            .expect("subscription must be open");
        assert!(initial.is_empty());

        let comment = service
            .add_comment(
                20,
                created.post.id,
                AddCommentRequest {
                    text: "nice".to_string(),
                },
            )
            .await
            .expect("add_comment must succeed");
        assert_eq!(comment.author_username, "bob");

        let updated = timeout(Duration::from_secs(1), subscription.next_snapshot())
            .await
            .expect("snapshot after comment must arrive")
            .expect("subscription must be open");
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].text, "nice");
    }

    #[tokio::test]
    async fn subscribe_comments_requires_existing_post() {
        let (service, _) = service_with_users(vec![sample_profile(10, "alice")]);

        let err = service
            .subscribe_comments(999)
            .await
            .expect_err("missing post must be rejected");
        assert!(matches!(err, DomainError::NotFound(_)));
    }
}
