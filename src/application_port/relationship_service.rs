use crate::application_port::RelationFeed;
use crate::domain_model::*;
use crate::domain_port::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum RelationError {
    #[error("invalid relation: {0}")]
    InvalidRelation(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("partial write: applied [{}], failed `{failed}`: {source}", .applied.join(", "))]
    PartialWrite {
        applied: Vec<String>,
        failed: String,
        source: StoreError,
    },
    #[error("inconsistent relation state between {me} and {other}")]
    Inconsistent { me: UserId, other: UserId },
    #[error("change feed closed")]
    FeedClosed,
}

/// Friend-request lifecycle between two users.
///
/// Every transition writes both users' sub-collections one after the other
/// and stops at the first failure. Nothing is rolled back: a failed call may
/// leave one side written, and repeating the same call is the way to finish
/// it since every write is idempotent.
#[async_trait::async_trait]
pub trait RelationshipService: Send + Sync {
    async fn send(&self, from: &UserId, to: &UserId) -> Result<(), RelationError>;
    async fn accept(&self, me: &UserId, requester: &UserId) -> Result<(), RelationError>;
    async fn deny(&self, me: &UserId, requester: &UserId) -> Result<(), RelationError>;
    async fn cancel_request(&self, me: &UserId, recipient: &UserId) -> Result<(), RelationError>;
    async fn remove_friend(&self, me: &UserId, friend: &UserId) -> Result<(), RelationError>;

    async fn friend_ids(&self, user: &UserId) -> Result<Vec<UserId>, RelationError>;
    /// Users whose requests to `user` are pending.
    async fn waiting_ids(&self, user: &UserId) -> Result<Vec<UserId>, RelationError>;
    /// Users `user` has sent a pending request to.
    async fn request_ids(&self, user: &UserId) -> Result<Vec<UserId>, RelationError>;
    async fn relation_state(
        &self,
        me: &UserId,
        other: &UserId,
    ) -> Result<RelationState, RelationError>;

    async fn subscribe_requests(&self, user: &UserId) -> Result<RelationFeed, RelationError>;
    async fn subscribe_sent_requests(&self, user: &UserId) -> Result<RelationFeed, RelationError>;
    async fn subscribe_friends(&self, user: &UserId) -> Result<RelationFeed, RelationError>;
}
