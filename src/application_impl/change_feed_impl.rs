use super::listener_task::{ListenerEvent, spawn_subscription};
use crate::application_port::{ChangeFeed, RelationChangeHandler, RelationError, Subscription};
use crate::domain_model::{RelationChange, RelationKind, UserId};
use crate::domain_port::{ChangeBatch, ChangeKind, CollectionPath, DocumentStore};
use std::sync::Arc;

/// Change feed backed by the document store's collection listeners. Each
/// subscription owns one listener and one task draining it.
pub struct StoreChangeFeed {
    store: Arc<dyn DocumentStore>,
}

impl StoreChangeFeed {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl ChangeFeed for StoreChangeFeed {
    async fn subscribe(
        &self,
        user: &UserId,
        kind: RelationKind,
        handler: Arc<dyn RelationChangeHandler>,
    ) -> Result<Subscription, RelationError> {
        let path = CollectionPath::relation(user, kind);
        let listener = self.store.listen_collection(&path).await?;

        let subscription = spawn_subscription(path.to_string(), listener, move |event| {
            let handler = handler.clone();
            async move {
                match event {
                    ListenerEvent::Next(batch) => {
                        let initial = batch.initial;
                        let change = classify(batch);
                        // modification-only batches carry no membership change
                        if initial || !change.is_empty() {
                            handler.handle(Ok(change));
                        }
                    }
                    ListenerEvent::Failed(e) => handler.handle(Err(RelationError::Store(e))),
                    ListenerEvent::Closed => handler.handle(Err(RelationError::FeedClosed)),
                }
            }
        });

        tracing::debug!(%user, %kind, "relation feed subscribed");
        Ok(subscription)
    }
}

fn classify(batch: ChangeBatch) -> RelationChange {
    let mut change = RelationChange::default();
    for document in batch.changes {
        match document.kind {
            ChangeKind::Added => change
                .added
                .push(UserId::from_document_id(document.document_id)),
            ChangeKind::Removed => change
                .removed
                .push(UserId::from_document_id(document.document_id)),
            ChangeKind::Modified => {}
        }
    }
    change
}
