use crate::application_impl::{run_sequential, PlanFailure, PlannedWrite};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::{CollectionPath, DocumentStore};
use std::sync::Arc;

pub struct RealRelationshipService {
    store: Arc<dyn DocumentStore>,
    change_feed: Arc<dyn ChangeFeed>,
}

impl RealRelationshipService {
    pub fn new(store: Arc<dyn DocumentStore>, change_feed: Arc<dyn ChangeFeed>) -> Self {
        Self { store, change_feed }
    }

    async fn apply(&self, transition: Transition) -> Result<(), RelationError> {
        if transition.actor() == transition.counterpart() {
            return Err(RelationError::InvalidRelation(format!(
                "{} between {} and itself",
                transition.name(),
                transition.actor()
            )));
        }

        tracing::debug!(
            transition = transition.name(),
            actor = %transition.actor(),
            counterpart = %transition.counterpart(),
            "applying relationship transition"
        );

        let writes = transition
            .writes()
            .into_iter()
            .map(PlannedWrite::from)
            .collect();

        run_sequential(self.store.as_ref(), writes)
            .await
            .map_err(|failure| {
                if let PlanFailure::Partial { .. } = failure {
                    tracing::warn!(
                        transition = transition.name(),
                        actor = %transition.actor(),
                        counterpart = %transition.counterpart(),
                        "relationship left half-applied, retry the same call to finish it"
                    );
                }
                RelationError::from(failure)
            })
    }

    async fn member_ids(
        &self,
        user: &UserId,
        kind: RelationKind,
    ) -> Result<Vec<UserId>, RelationError> {
        let ids = self
            .store
            .list_document_ids(&CollectionPath::relation(user, kind))
            .await?;
        Ok(ids.into_iter().map(UserId::from_document_id).collect())
    }

    async fn is_member(
        &self,
        owner: &UserId,
        kind: RelationKind,
        other: &UserId,
    ) -> Result<bool, RelationError> {
        Ok(self
            .store
            .get_document(&CollectionPath::relation(owner, kind), other.as_str())
            .await?
            .is_some())
    }
}

#[async_trait::async_trait]
impl RelationshipService for RealRelationshipService {
    async fn send(&self, from: &UserId, to: &UserId) -> Result<(), RelationError> {
        self.apply(Transition::Send {
            from: from.clone(),
            to: to.clone(),
        })
        .await
    }

    async fn accept(&self, me: &UserId, requester: &UserId) -> Result<(), RelationError> {
        self.apply(Transition::Accept {
            me: me.clone(),
            requester: requester.clone(),
        })
        .await
    }

    async fn deny(&self, me: &UserId, requester: &UserId) -> Result<(), RelationError> {
        self.apply(Transition::Deny {
            me: me.clone(),
            requester: requester.clone(),
        })
        .await
    }

    async fn cancel_request(&self, me: &UserId, recipient: &UserId) -> Result<(), RelationError> {
        self.apply(Transition::CancelRequest {
            me: me.clone(),
            recipient: recipient.clone(),
        })
        .await
    }

    async fn remove_friend(&self, me: &UserId, friend: &UserId) -> Result<(), RelationError> {
        self.apply(Transition::RemoveFriend {
            me: me.clone(),
            friend: friend.clone(),
        })
        .await
    }

    async fn friend_ids(&self, user: &UserId) -> Result<Vec<UserId>, RelationError> {
        self.member_ids(user, RelationKind::Friends).await
    }

    async fn waiting_ids(&self, user: &UserId) -> Result<Vec<UserId>, RelationError> {
        self.member_ids(user, RelationKind::Incoming).await
    }

    async fn request_ids(&self, user: &UserId) -> Result<Vec<UserId>, RelationError> {
        self.member_ids(user, RelationKind::Outgoing).await
    }

    async fn relation_state(
        &self,
        me: &UserId,
        other: &UserId,
    ) -> Result<RelationState, RelationError> {
        let outgoing = self.is_member(me, RelationKind::Outgoing, other).await?;
        let incoming = self.is_member(me, RelationKind::Incoming, other).await?;
        let friends = self.is_member(me, RelationKind::Friends, other).await?;

        RelationState::from_memberships(outgoing, incoming, friends).ok_or_else(|| {
            RelationError::Inconsistent {
                me: me.clone(),
                other: other.clone(),
            }
        })
    }

    async fn subscribe_requests(&self, user: &UserId) -> Result<RelationFeed, RelationError> {
        RelationFeed::open(self.change_feed.as_ref(), user, RelationKind::Incoming).await
    }

    async fn subscribe_sent_requests(&self, user: &UserId) -> Result<RelationFeed, RelationError> {
        RelationFeed::open(self.change_feed.as_ref(), user, RelationKind::Outgoing).await
    }

    async fn subscribe_friends(&self, user: &UserId) -> Result<RelationFeed, RelationError> {
        RelationFeed::open(self.change_feed.as_ref(), user, RelationKind::Friends).await
    }
}
