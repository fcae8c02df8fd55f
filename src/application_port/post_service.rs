use crate::application_port::ProfileError;
use crate::domain_model::{PageSize, Post, PostCursor, PostId, PostPage, UserId};
use crate::domain_port::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum PostError {
    #[error("cannot encode post {id}: {reason}")]
    Encode { id: PostId, reason: String },
    #[error("malformed post {id}: {reason}")]
    Malformed { id: PostId, reason: String },
    #[error("owner profile: {0}")]
    Profile(#[from] ProfileError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("partial write: applied [{}], failed `{failed}`: {source}", .applied.join(", "))]
    PartialWrite {
        applied: Vec<String>,
        failed: String,
        source: StoreError,
    },
}

/// Posts are kept twice, globally and under their owner, and so are their
/// likers. Both copies are written one after the other, stopping at the
/// first failure; repeating the call completes it.
#[async_trait::async_trait]
pub trait PostService: Send + Sync {
    async fn create_post(&self, post: &Post) -> Result<(), PostError>;
    /// Remove both copies of the post along with their likers.
    async fn delete_post(&self, post: &Post) -> Result<(), PostError>;

    /// Posts of one user, newest first. A removed account has none.
    async fn user_posts(
        &self,
        owner: &UserId,
        page_size: PageSize,
        after: Option<PostCursor>,
    ) -> Result<PostPage, PostError>;
    /// Posts of every user, newest first, each with its owner's profile.
    async fn all_posts(
        &self,
        page_size: PageSize,
        after: Option<PostCursor>,
    ) -> Result<PostPage, PostError>;

    async fn like_post(&self, post: &Post, liker: &UserId) -> Result<(), PostError>;
    async fn unlike_post(&self, post: &Post, liker: &UserId) -> Result<(), PostError>;
    async fn likers(&self, post: &PostId) -> Result<Vec<UserId>, PostError>;
}
