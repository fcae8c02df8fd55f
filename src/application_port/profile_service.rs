use crate::application_port::Feed;
use crate::domain_model::{PageSize, Profile, ProfileCursor, ProfilePage, UserId};
use crate::domain_port::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("profile not found: {0}")]
    NotFound(UserId),
    #[error("malformed profile {id}: {reason}")]
    Malformed { id: UserId, reason: String },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("profile feed closed by the store")]
    FeedClosed,
}

/// Live profile updates. Updates carry no posts count.
pub type ProfileFeed = Feed<Result<Profile, ProfileError>>;

#[async_trait::async_trait]
pub trait ProfileService: Send + Sync {
    async fn get_profile(&self, user: &UserId) -> Result<Profile, ProfileError>;
    /// Profile ids, most recently active first.
    async fn list_profile_ids(
        &self,
        page_size: PageSize,
        after: Option<ProfileCursor>,
    ) -> Result<ProfilePage, ProfileError>;
    /// Current profile, then every later version of it. Moments when the
    /// document is missing or unreadable are skipped.
    async fn subscribe_profile(&self, user: &UserId) -> Result<ProfileFeed, ProfileError>;
}
