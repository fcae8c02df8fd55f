use crate::application_port::Feed;
use crate::domain_model::{ActiveChat, Message, MessageId, TypingChange, UserId};
use crate::domain_port::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("cannot encode message {id}: {reason}")]
    Encode { id: MessageId, reason: String },
    #[error("invalid chat id {0:?}")]
    InvalidChatId(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("messaging feed closed by the store")]
    FeedClosed,
}

pub type MessageFeed = Feed<Result<Vec<Message>, MessagingError>>;
pub type LookedFeed = Feed<Result<Vec<UserId>, MessagingError>>;
pub type TypingFeed = Feed<Result<TypingChange, MessagingError>>;
pub type ChatStatusFeed = Feed<Result<Vec<ActiveChat>, MessagingError>>;

/// Delivery of chat traffic through per-user inbox collections.
///
/// Inbox feeds (messages, looked receipts, active chats) consume what they
/// deliver: each delivered document is deleted from the inbox afterwards, so
/// a document whose deletion failed is delivered again to the next
/// subscriber.
#[async_trait::async_trait]
pub trait MessagingService: Send + Sync {
    async fn send_message(&self, message: &Message) -> Result<(), MessagingError>;
    /// Tell `friend` that `account` has read their messages.
    async fn send_looked(&self, account: &UserId, friend: &UserId) -> Result<(), MessagingError>;
    /// Tell `friend` that `account` has the chat `chat_id` open.
    async fn send_chat_active(
        &self,
        account: &UserId,
        friend: &UserId,
        chat_id: &str,
    ) -> Result<(), MessagingError>;

    async fn send_typing(&self, account: &UserId, friend: &UserId) -> Result<(), MessagingError>;
    async fn send_finish_typing(
        &self,
        account: &UserId,
        friend: &UserId,
    ) -> Result<(), MessagingError>;
    /// Whether `friend` is currently typing to `account`.
    async fn is_typing(&self, account: &UserId, friend: &UserId) -> Result<bool, MessagingError>;

    async fn subscribe_messages(&self, account: &UserId) -> Result<MessageFeed, MessagingError>;
    async fn subscribe_looked(&self, account: &UserId) -> Result<LookedFeed, MessagingError>;
    async fn subscribe_typing(&self, account: &UserId) -> Result<TypingFeed, MessagingError>;
    async fn subscribe_chat_status(
        &self,
        account: &UserId,
    ) -> Result<ChatStatusFeed, MessagingError>;
}
