use super::listener_task::{ListenerEvent, spawn_subscription};
use crate::application_port::{
    ChatStatusFeed, Feed, LookedFeed, MessageFeed, MessagingError, MessagingService, TypingFeed,
};
use crate::domain_model::{ActiveChat, Message, TypingChange, UserId};
use crate::domain_port::{
    ACTIVE_CHAT, ChangeBatch, ChangeKind, CollectionPath, DocumentChange, DocumentStore, FIELD_ID,
    FIELD_LOOKED, FIELD_SENDER_ID, Fields, MESSAGES, NOTIFICATIONS, TYPING,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct RealMessagingService {
    store: Arc<dyn DocumentStore>,
}

impl RealMessagingService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Feed over `users/{account}/{inbox}`. `read` turns a notification into
    /// the item to deliver plus the documents it consumed; consumed documents
    /// are deleted once the item is delivered.
    async fn inbox_feed<T, R>(
        &self,
        account: &UserId,
        inbox: &str,
        read: R,
    ) -> Result<Feed<Result<T, MessagingError>>, MessagingError>
    where
        T: Send + 'static,
        R: Fn(&CollectionPath, ChangeBatch) -> Option<(T, Vec<String>)> + Send + 'static,
    {
        let path = CollectionPath::user_collection(account, inbox);
        let listener = self.store.listen_collection(&path).await?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let store = self.store.clone();
        let inbox_path = path.clone();
        let subscription = spawn_subscription(path.to_string(), listener, move |event| {
            let store = store.clone();
            let path = inbox_path.clone();
            let sender = sender.clone();
            let read_batch = match event {
                ListenerEvent::Next(batch) => read(&path, batch),
                ListenerEvent::Failed(e) => {
                    let _ = sender.send(Err(MessagingError::Store(e)));
                    None
                }
                ListenerEvent::Closed => {
                    let _ = sender.send(Err(MessagingError::FeedClosed));
                    None
                }
            };
            async move {
                let Some((item, consumed)) = read_batch else {
                    return;
                };
                let _ = sender.send(Ok(item));
                for document in consumed {
                    if let Err(e) = store.delete_document(&path, &document).await {
                        tracing::warn!(%path, %document, error = %e, "delivered document was not consumed");
                    }
                }
            }
        });

        Ok(Feed::new(receiver, subscription))
    }
}

fn id_fields(field: &str, id: &UserId) -> Fields {
    let mut fields = Fields::new();
    fields.insert(field.to_owned(), Value::String(id.to_string()));
    fields
}

/// User id held in `field`, or `None` with a warning.
fn user_in(path: &CollectionPath, change: &DocumentChange, field: &str) -> Option<UserId> {
    let id = change
        .fields
        .get(field)
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<UserId>().ok());
    if id.is_none() {
        tracing::warn!(%path, document = %change.document_id, field, "skipping document without a valid user id");
    }
    id
}

fn added(batch: ChangeBatch) -> impl Iterator<Item = DocumentChange> {
    batch
        .changes
        .into_iter()
        .filter(|change| change.kind == ChangeKind::Added)
}

fn read_messages(path: &CollectionPath, batch: ChangeBatch) -> Option<(Vec<Message>, Vec<String>)> {
    let mut messages = Vec::new();
    let mut consumed = Vec::new();
    for change in added(batch) {
        match Message::from_fields(change.fields) {
            Ok(message) => {
                messages.push(message);
                consumed.push(change.document_id);
            }
            Err(e) => {
                tracing::warn!(%path, document = %change.document_id, error = %e, "skipping unreadable message")
            }
        }
    }
    (!messages.is_empty()).then_some((messages, consumed))
}

fn read_looked(path: &CollectionPath, batch: ChangeBatch) -> Option<(Vec<UserId>, Vec<String>)> {
    let mut friends = Vec::new();
    let mut consumed = Vec::new();
    for change in added(batch) {
        if let Some(friend) = user_in(path, &change, FIELD_LOOKED) {
            friends.push(friend);
            consumed.push(change.document_id);
        }
    }
    (!friends.is_empty()).then_some((friends, consumed))
}

fn read_chat_status(
    path: &CollectionPath,
    batch: ChangeBatch,
) -> Option<(Vec<ActiveChat>, Vec<String>)> {
    let mut chats = Vec::new();
    let mut consumed = Vec::new();
    for change in added(batch) {
        if let Some(sender) = user_in(path, &change, FIELD_SENDER_ID) {
            chats.push(ActiveChat {
                sender,
                chat_id: change.document_id.clone(),
            });
            consumed.push(change.document_id);
        }
    }
    (!chats.is_empty()).then_some((chats, consumed))
}

/// Typing indicators are state, not inbox traffic: nothing is consumed.
fn read_typing(path: &CollectionPath, batch: ChangeBatch) -> Option<(TypingChange, Vec<String>)> {
    let mut change = TypingChange::default();
    for document in batch.changes {
        match document.kind {
            ChangeKind::Added => change.started.extend(user_in(path, &document, FIELD_ID)),
            ChangeKind::Removed => change.finished.extend(user_in(path, &document, FIELD_ID)),
            ChangeKind::Modified => {}
        }
    }
    (!change.is_empty()).then_some((change, Vec::new()))
}

#[async_trait::async_trait]
impl MessagingService for RealMessagingService {
    async fn send_message(&self, message: &Message) -> Result<(), MessagingError> {
        let fields = message.to_fields().map_err(|e| MessagingError::Encode {
            id: message.id.clone(),
            reason: e.to_string(),
        })?;
        self.store
            .set_document(
                &CollectionPath::user_collection(&message.recipient, MESSAGES),
                message.id.as_str(),
                fields,
            )
            .await?;
        tracing::debug!(message = %message.id, sender = %message.sender, recipient = %message.recipient, "message sent");
        Ok(())
    }

    async fn send_looked(&self, account: &UserId, friend: &UserId) -> Result<(), MessagingError> {
        self.store
            .set_document(
                &CollectionPath::user_collection(friend, NOTIFICATIONS),
                account.as_str(),
                id_fields(FIELD_LOOKED, account),
            )
            .await?;
        Ok(())
    }

    async fn send_chat_active(
        &self,
        account: &UserId,
        friend: &UserId,
        chat_id: &str,
    ) -> Result<(), MessagingError> {
        if chat_id.is_empty() || chat_id.contains('/') {
            return Err(MessagingError::InvalidChatId(chat_id.to_owned()));
        }
        self.store
            .set_document(
                &CollectionPath::user_collection(friend, ACTIVE_CHAT),
                chat_id,
                id_fields(FIELD_SENDER_ID, account),
            )
            .await?;
        Ok(())
    }

    async fn send_typing(&self, account: &UserId, friend: &UserId) -> Result<(), MessagingError> {
        self.store
            .set_document(
                &CollectionPath::user_collection(friend, TYPING),
                account.as_str(),
                id_fields(FIELD_ID, account),
            )
            .await?;
        Ok(())
    }

    async fn send_finish_typing(
        &self,
        account: &UserId,
        friend: &UserId,
    ) -> Result<(), MessagingError> {
        self.store
            .delete_document(&CollectionPath::user_collection(friend, TYPING), account.as_str())
            .await?;
        Ok(())
    }

    async fn is_typing(&self, account: &UserId, friend: &UserId) -> Result<bool, MessagingError> {
        let indicator = self
            .store
            .get_document(&CollectionPath::user_collection(account, TYPING), friend.as_str())
            .await?;
        Ok(indicator
            .as_ref()
            .and_then(|fields| fields.get(FIELD_ID))
            .and_then(Value::as_str)
            .is_some_and(|id| id == friend.as_str()))
    }

    async fn subscribe_messages(&self, account: &UserId) -> Result<MessageFeed, MessagingError> {
        self.inbox_feed(account, MESSAGES, read_messages).await
    }

    async fn subscribe_looked(&self, account: &UserId) -> Result<LookedFeed, MessagingError> {
        self.inbox_feed(account, NOTIFICATIONS, read_looked).await
    }

    async fn subscribe_typing(&self, account: &UserId) -> Result<TypingFeed, MessagingError> {
        self.inbox_feed(account, TYPING, read_typing).await
    }

    async fn subscribe_chat_status(
        &self,
        account: &UserId,
    ) -> Result<ChatStatusFeed, MessagingError> {
        self.inbox_feed(account, ACTIVE_CHAT, read_chat_status).await
    }
}
