use super::listener_task::{ListenerEvent, spawn_subscription};
use crate::application_port::{Feed, ProfileError, ProfileFeed, ProfileService};
use crate::domain_model::{PageSize, Profile, ProfileCursor, ProfilePage, UserId};
use crate::domain_port::{
    CollectionPath, CollectionQuery, Document, DocumentStore, FIELD_LAST_ACTIVITY, OrderDirection,
    POSTS, QueryCursor,
};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct RealProfileService {
    store: Arc<dyn DocumentStore>,
}

impl RealProfileService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

/// Cursor positioned on `document`, the last one of a page.
fn cursor_at(document: &Document) -> Result<ProfileCursor, ProfileError> {
    let id = UserId::from_document_id(document.id.clone());
    let last_activity = document
        .fields
        .get(FIELD_LAST_ACTIVITY)
        .and_then(Value::as_i64)
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .ok_or_else(|| ProfileError::Malformed {
            id: id.clone(),
            reason: format!("{FIELD_LAST_ACTIVITY} is not a timestamp"),
        })?;
    Ok(ProfileCursor { last_activity, id })
}

#[async_trait::async_trait]
impl ProfileService for RealProfileService {
    async fn get_profile(&self, user: &UserId) -> Result<Profile, ProfileError> {
        let fields = self
            .store
            .get_document(&CollectionPath::users(), user.as_str())
            .await?
            .ok_or_else(|| ProfileError::NotFound(user.clone()))?;

        let mut profile = Profile::from_fields(fields).map_err(|e| ProfileError::Malformed {
            id: user.clone(),
            reason: e.to_string(),
        })?;

        let posts = self
            .store
            .count_documents(&CollectionPath::user_collection(user, POSTS))
            .await?;
        profile.posts_count = u32::try_from(posts).unwrap_or(u32::MAX);

        Ok(profile)
    }

    async fn list_profile_ids(
        &self,
        page_size: PageSize,
        after: Option<ProfileCursor>,
    ) -> Result<ProfilePage, ProfileError> {
        let limit = page_size.0 as usize;
        if limit == 0 {
            return Ok(ProfilePage {
                ids: Vec::new(),
                next: None,
            });
        }

        let query = CollectionQuery {
            order_by: Some((FIELD_LAST_ACTIVITY.to_owned(), OrderDirection::Descending)),
            start_after: after.map(|cursor| QueryCursor {
                value: Value::from(cursor.last_activity.timestamp_millis()),
                document_id: cursor.id.to_string(),
            }),
            limit: Some(limit),
        };
        let documents = self
            .store
            .list_documents(&CollectionPath::users(), &query)
            .await?;

        // a short page is the last one
        let next = match documents.last() {
            Some(last) if documents.len() == limit => Some(cursor_at(last)?),
            _ => None,
        };
        let ids = documents
            .into_iter()
            .map(|document| UserId::from_document_id(document.id))
            .collect();

        Ok(ProfilePage { ids, next })
    }

    async fn subscribe_profile(&self, user: &UserId) -> Result<ProfileFeed, ProfileError> {
        let listener = self
            .store
            .listen_document(&CollectionPath::users(), user.as_str())
            .await?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let id = user.clone();
        let target = format!("{}/{user}", CollectionPath::users());
        let subscription = spawn_subscription(target, listener, move |event| {
            let result = match event {
                ListenerEvent::Next(None) => None,
                ListenerEvent::Next(Some(fields)) => match Profile::from_fields(fields) {
                    Ok(profile) => Some(Ok(profile)),
                    Err(e) => {
                        tracing::warn!(user = %id, error = %e, "skipping unreadable profile update");
                        None
                    }
                },
                ListenerEvent::Failed(e) => Some(Err(ProfileError::Store(e))),
                ListenerEvent::Closed => Some(Err(ProfileError::FeedClosed)),
            };
            if let Some(result) = result {
                let _ = sender.send(result);
            }
            async {}
        });

        Ok(Feed::new(receiver, subscription))
    }
}
