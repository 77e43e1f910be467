use std::sync::Arc;

use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::warn;

use crate::data::user_repository::{ProfilePatch, UserRepository};
use crate::domain::error::DomainError;
use crate::domain::user::{Profile, ProfilePatchRequest};
use crate::infrastructure::changefeed::{ChangeFeed, StoreEvent};

pub(crate) struct ProfileSubscription {
    rx: mpsc::Receiver<Profile>,
}

impl ProfileSubscription {
    pub(crate) async fn next_snapshot(&mut self) -> Option<Profile> {
        self.rx.recv().await
    }

    pub(crate) fn into_receiver(self) -> mpsc::Receiver<Profile> {
        self.rx
    }
}

pub(crate) struct ProfileService<R: UserRepository> {
    repo: R,
    changes: Arc<ChangeFeed>,
}

impl<R> ProfileService<R>
where
    R: UserRepository + Clone + 'static,
{
    pub(crate) fn new(repo: R, changes: Arc<ChangeFeed>) -> Self {
        Self { repo, changes }
    }

    pub(crate) async fn get_profile(&self, user_id: i64) -> Result<Profile, DomainError> {
        self.repo
            .get_profile(user_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("user id: {user_id}")))
    }

    pub(crate) async fn update_profile(
        &self,
        actor_id: i64,
        req: ProfilePatchRequest,
    ) -> Result<Profile, DomainError> {
        let req = req.validate()?;
        if req.is_empty() {
            return Err(DomainError::Validation {
                field: "patch",
                message: "at least one field required",
            });
        }

        let patch = ProfilePatch {
            username: req.username,
            display_name: req.display_name,
            bio: req.bio,
            avatar_url: req.avatar_url,
        };
        let profile = self
            .repo
            .update_profile(actor_id, patch)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("user id: {actor_id}")))?;

        self.changes
            .publish(StoreEvent::ProfileUpdated { user_id: actor_id });
        Ok(profile)
    }

    /// Живая подписка на профиль: начальный снапшот и по одному на каждое
    /// обновление. Отписка — просто бросить receiver.
    pub(crate) fn subscribe(&self, user_id: i64) -> ProfileSubscription {
        let mut events = self.changes.subscribe();
        let repo = self.repo.clone();
        let (tx, rx) = mpsc::channel(8);

        tokio::spawn(async move {
            match repo.get_profile(user_id).await {
                Ok(Some(profile)) => {
                    if tx.send(profile).await.is_err() {
                        return;
                    }
                }
                Ok(None) => return,
                Err(err) => {
                    warn!(user_id, error = %err, "profile subscription: initial read failed");
                    return;
                }
            }

            loop {
                match events.recv().await {
                    Ok(StoreEvent::ProfileUpdated { user_id: id }) if id == user_id => {}
                    Ok(_) => continue,
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }

                match repo.get_profile(user_id).await {
                    Ok(Some(profile)) => {
                        if tx.send(profile).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!(user_id, error = %err, "profile subscription: re-read failed");
                    }
                }
            }
        });

        ProfileSubscription { rx }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::time::timeout;

    use super::ProfileService;
    use crate::data::user_repository::{NewUser, ProfilePatch, UserCredentials, UserRepository};
    use crate::domain::error::DomainError;
    use crate::domain::user::{Profile, ProfilePatchRequest};
    use crate::infrastructure::changefeed::ChangeFeed;

    #[derive(Clone)]
    struct FakeUserRepo {
        profile: Arc<Mutex<Option<Profile>>>,
        patch_call: Arc<Mutex<Option<(i64, ProfilePatch)>>>,
    }

    impl FakeUserRepo {
        fn new(profile: Option<Profile>) -> Self {
            Self {
                profile: Arc::new(Mutex::new(profile)),
                patch_call: Arc::new(Mutex::new(None)),
            }
        }

        fn take_patch_call(&self) -> Option<(i64, ProfilePatch)> {
            self.patch_call
                .lock()
                .expect("patch call mutex poisoned")
                .take()
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

        async fn get_profile(&self, _user_id: i64) -> Result<Option<Profile>, DomainError> {
            Ok(self
                .profile
                .lock()
                .expect("profile mutex poisoned")
                .clone())
        }

        async fn update_profile(
            &self,
            user_id: i64,
            patch: ProfilePatch,
        ) -> Result<Option<Profile>, DomainError> {
            *self.patch_call.lock().expect("patch call mutex poisoned") =
                Some((user_id, patch.clone()));

            let mut profile = self.profile.lock().expect("profile mutex poisoned");
            let Some(current) = profile.as_mut() else {
                return Ok(None);
            };
            if let Some(username) = patch.username {
                current.username = username;
            }
            if let Some(display_name) = patch.display_name {
                current.display_name = Some(display_name);
            }
            if let Some(bio) = patch.bio {
                current.bio = bio;
            }
            if let Some(avatar_url) = patch.avatar_url {
                current.avatar_url = Some(avatar_url);
            }
            Ok(Some(current.clone()))
        }
    }

    #[tokio::test]
    async fn get_profile_returns_not_found_when_missing() {
        let service = ProfileService::new(FakeUserRepo::new(None), test_changes());

        let err = service
            .get_profile(42)
            .await
            .expect_err("profile must be missing");
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_profile_passes_only_provided_fields() {
        let repo = FakeUserRepo::new(Some(sample_profile(1, "alice")));
        let service = ProfileService::new(repo.clone(), test_changes());

        let req = ProfilePatchRequest {
            bio: Some("  travel, coffee  ".to_string()),
            ..Default::default()
        };

        let updated = service
            .update_profile(1, req)
            .await
            .expect("update must succeed");
        assert_eq!(updated.bio, "travel, coffee");
        assert_eq!(updated.username, "alice");

        let (user_id, patch) = repo.take_patch_call().expect("patch must be captured");
        assert_eq!(user_id, 1);
        assert!(patch.username.is_none());
        assert_eq!(patch.bio.as_deref(), Some("travel, coffee"));
    }

    #[tokio::test]
    async fn update_profile_rejects_empty_patch_without_repo_call() {
        let repo = FakeUserRepo::new(Some(sample_profile(1, "alice")));
        let service = ProfileService::new(repo.clone(), test_changes());

        let err = service
            .update_profile(1, ProfilePatchRequest::default())
            .await
            .expect_err("empty patch must be rejected");
        assert!(matches!(err, DomainError::Validation { .. }));
        assert!(repo.take_patch_call().is_none());
    }

    #[tokio::test]
    async fn subscribe_emits_initial_and_updated_snapshots() {
        let repo = FakeUserRepo::new(Some(sample_profile(1, "alice")));
        let service = ProfileService::new(repo.clone(), test_changes());

        let mut subscription = service.subscribe(1);

        let initial = timeout(Duration::from_secs(1), subscription.next_snapshot())
            .await
            .expect("initial snapshot must arrive")
            .expect("subscription must be open");
        assert_eq!(initial.username, "alice");

        let req = ProfilePatchRequest {
            display_name: Some("Alice".to_string()),
            ..Default::default()
        };
        service
            .update_profile(1, req)
            .await
            .expect("update must succeed");

        let updated = timeout(Duration::from_secs(1), subscription.next_snapshot())
            .await
            .expect("updated snapshot must arrive")
            .expect("subscription must be open");
        assert_eq!(updated.display_name.as_deref(), Some("Alice"));
    }

    fn sample_profile(id: i64, username: &str) -> Profile {
        Profile::new(
            id,
            username.to_string(),
            format!("{username}@example.com"),
            None,
            "",
            None,
            0,
            0,
            0,
            Utc::now(),
            None,
        )
        .expect("sample profile must be valid")
    }

    fn test_changes() -> Arc<ChangeFeed> {
        Arc::new(ChangeFeed::new(16))
    }
}
