use crate::application_port::{Feed, RelationError, Subscription};
use crate::domain_model::{RelationChange, RelationKind, UserId};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Receives every notification of a subscription, on the runtime's worker
/// threads. After an `Err` nothing else is delivered.
pub trait RelationChangeHandler: Send + Sync {
    fn handle(&self, result: Result<RelationChange, RelationError>);
}

impl<F> RelationChangeHandler for F
where
    F: Fn(Result<RelationChange, RelationError>) + Send + Sync,
{
    fn handle(&self, result: Result<RelationChange, RelationError>) {
        self(result)
    }
}

#[async_trait::async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(
        &self,
        user: &UserId,
        kind: RelationKind,
        handler: Arc<dyn RelationChangeHandler>,
    ) -> Result<Subscription, RelationError>;
}

pub type RelationFeed = Feed<Result<RelationChange, RelationError>>;

impl RelationFeed {
    pub async fn open(
        change_feed: &dyn ChangeFeed,
        user: &UserId,
        kind: RelationKind,
    ) -> Result<Self, RelationError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handler = Arc::new(move |result: Result<RelationChange, RelationError>| {
            let _ = sender.send(result);
        });
        let subscription = change_feed.subscribe(user, kind, handler).await?;

        Ok(Feed::new(receiver, subscription))
    }
}
