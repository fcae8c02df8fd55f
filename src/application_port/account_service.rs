use crate::domain_model::{Profile, UserId};
use crate::domain_port::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("invalid account operation: {0}")]
    InvalidAccount(String),
    #[error("account not found: {0}")]
    NotFound(UserId),
    #[error("cannot encode account {id}: {reason}")]
    Encode { id: UserId, reason: String },
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("partial write: applied [{}], failed `{failed}`: {source}", .applied.join(", "))]
    PartialWrite {
        applied: Vec<String>,
        failed: String,
        source: StoreError,
    },
}

#[async_trait::async_trait]
pub trait AccountService: Send + Sync {
    async fn create_account(&self, profile: &Profile) -> Result<(), AccountError>;
    async fn edit_account(&self, profile: &Profile) -> Result<(), AccountError>;
    /// Flag the account as removed. The document is kept.
    async fn remove_account(&self, account: &UserId) -> Result<(), AccountError>;
    async fn recover_account(&self, account: &UserId) -> Result<(), AccountError>;

    async fn set_online(&self, account: &UserId) -> Result<(), AccountError>;
    async fn set_offline(&self, account: &UserId) -> Result<(), AccountError>;

    async fn block_user(&self, account: &UserId, user: &UserId) -> Result<(), AccountError>;
    async fn unblock_user(&self, account: &UserId, user: &UserId) -> Result<(), AccountError>;
    async fn blocked_ids(&self, account: &UserId) -> Result<Vec<UserId>, AccountError>;
    /// Users who have blocked `account`.
    async fn iam_blocked_ids(&self, account: &UserId) -> Result<Vec<UserId>, AccountError>;
}
