use crate::domain_model::{PostId, RelationKind, UserId};
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc::UnboundedReceiver;

/// Field map of one document.
pub type Fields = serde_json::Map<String, Value>;

pub const USERS: &str = "users";
pub const BLOCKED: &str = "blocked";
pub const IAM_BLOCKED: &str = "iamblocked";
pub const POSTS: &str = "posts";
pub const LIKERS: &str = "likers";
pub const MESSAGES: &str = "messages";
pub const NOTIFICATIONS: &str = "notifications";
pub const TYPING: &str = "typing";
pub const ACTIVE_CHAT: &str = "activeChat";

pub const FIELD_ID: &str = "id";
pub const FIELD_ONLINE: &str = "online";
pub const FIELD_REMOVED: &str = "removed";
pub const FIELD_LAST_ACTIVITY: &str = "lastActivity";
pub const FIELD_DATE: &str = "date";
pub const FIELD_LOOKED: &str = "looked";
pub const FIELD_SENDER_ID: &str = "senderID";

/// Slash-separated collection path, e.g. `users/u1/friendIDs`.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn users() -> Self {
        Self(USERS.to_owned())
    }

    pub fn user_collection(user: &UserId, name: &str) -> Self {
        Self(format!("{USERS}/{user}/{name}"))
    }

    pub fn relation(user: &UserId, kind: RelationKind) -> Self {
        Self::user_collection(user, kind.collection())
    }

    /// Top-level `posts`, every user's posts together.
    pub fn posts() -> Self {
        Self(POSTS.to_owned())
    }

    pub fn post_likers(post: &PostId) -> Self {
        Self(format!("{POSTS}/{post}/{LIKERS}"))
    }

    /// Likers of the owner's copy of a post.
    pub fn user_post_likers(owner: &UserId, post: &PostId) -> Self {
        Self(format!("{USERS}/{owner}/{POSTS}/{post}/{LIKERS}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DocumentChange {
    pub kind: ChangeKind,
    pub document_id: String,
    /// Content after the change; for a removal, the content it had.
    pub fields: Fields,
}

/// Changes reported by one listener notification.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ChangeBatch {
    /// Set on the first batch, which lists every pre-existing document as added.
    pub initial: bool,
    pub changes: Vec<DocumentChange>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OrderDirection {
    Ascending,
    Descending,
}

/// Sort key of the last document of a previous page. Results resume strictly
/// after it in query order, with the document id breaking ties, whether or
/// not that document still exists or still has the same key.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCursor {
    pub value: Value,
    pub document_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct CollectionQuery {
    /// Documents lacking the field (or holding null) are excluded.
    pub order_by: Option<(String, OrderDirection)>,
    /// Without `order_by` only the document id of the cursor is used.
    pub start_after: Option<QueryCursor>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("internal store error: {0}")]
    Internal(String),
}

/// Receiving end of a realtime listener. Dropping it unregisters the
/// listener.
#[derive(Debug)]
pub struct Listener<T> {
    receiver: UnboundedReceiver<Result<T, StoreError>>,
}

impl<T> Listener<T> {
    pub fn new(receiver: UnboundedReceiver<Result<T, StoreError>>) -> Self {
        Self { receiver }
    }

    /// Next notification; `None` once the store has closed the listener.
    pub async fn next(&mut self) -> Option<Result<T, StoreError>> {
        self.receiver.recv().await
    }
}

pub type CollectionListener = Listener<ChangeBatch>;

/// Yields the document's content (`None` while it does not exist), first as
/// it is at registration and then after every write to it.
pub type DocumentListener = Listener<Option<Fields>>;

/// Remote document database. Every call is atomic for a single document only.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create or overwrite a document.
    async fn set_document(
        &self,
        path: &CollectionPath,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError>;

    /// Merge fields into an existing document; `NotFound` when it is missing.
    async fn update_document(
        &self,
        path: &CollectionPath,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError>;

    /// Delete a document. Deleting a missing document succeeds.
    async fn delete_document(&self, path: &CollectionPath, id: &str) -> Result<(), StoreError>;

    async fn get_document(
        &self,
        path: &CollectionPath,
        id: &str,
    ) -> Result<Option<Fields>, StoreError>;

    async fn list_documents(
        &self,
        path: &CollectionPath,
        query: &CollectionQuery,
    ) -> Result<Vec<Document>, StoreError>;

    async fn list_document_ids(&self, path: &CollectionPath) -> Result<Vec<String>, StoreError> {
        let documents = self
            .list_documents(path, &CollectionQuery::default())
            .await?;
        Ok(documents.into_iter().map(|d| d.id).collect())
    }

    async fn count_documents(&self, path: &CollectionPath) -> Result<usize, StoreError> {
        Ok(self.list_document_ids(path).await?.len())
    }

    /// Start listening to a collection. The first notification is the
    /// initial snapshot.
    async fn listen_collection(
        &self,
        path: &CollectionPath,
    ) -> Result<CollectionListener, StoreError>;

    async fn listen_document(
        &self,
        path: &CollectionPath,
        id: &str,
    ) -> Result<DocumentListener, StoreError>;
}
