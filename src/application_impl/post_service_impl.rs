use crate::application_impl::{PlannedWrite, run_sequential};
use crate::application_port::{PostError, PostService, ProfileService};
use crate::domain_model::{PageSize, Post, PostCursor, PostId, PostPage, Profile, UserId};
use crate::domain_port::{
    CollectionPath, CollectionQuery, Document, DocumentStore, FIELD_DATE, FIELD_ID, Fields,
    OrderDirection, POSTS, QueryCursor,
};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct RealPostService {
    store: Arc<dyn DocumentStore>,
    profile_service: Arc<dyn ProfileService>,
}

fn owner_posts(owner: &UserId) -> CollectionPath {
    CollectionPath::user_collection(owner, POSTS)
}

fn liker_fields(liker: &UserId) -> Fields {
    let mut fields = Fields::new();
    fields.insert(FIELD_ID.to_owned(), Value::String(liker.to_string()));
    fields
}

fn cursor_at(document: &Document) -> Result<PostCursor, PostError> {
    let id = PostId::from_document_id(document.id.clone());
    let date = document
        .fields
        .get(FIELD_DATE)
        .and_then(Value::as_i64)
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .ok_or_else(|| PostError::Malformed {
            id: id.clone(),
            reason: format!("{FIELD_DATE} is not a timestamp"),
        })?;
    Ok(PostCursor { date, id })
}

impl RealPostService {
    pub fn new(store: Arc<dyn DocumentStore>, profile_service: Arc<dyn ProfileService>) -> Self {
        Self {
            store,
            profile_service,
        }
    }

    fn encode(post: &Post) -> Result<Fields, PostError> {
        post.to_fields().map_err(|e| PostError::Encode {
            id: post.id.clone(),
            reason: e.to_string(),
        })
    }

    /// One page of `path`, newest first, each post with its likers.
    async fn page(
        &self,
        path: &CollectionPath,
        page_size: PageSize,
        after: Option<PostCursor>,
    ) -> Result<PostPage, PostError> {
        let limit = page_size.0 as usize;
        if limit == 0 {
            return Ok(PostPage {
                posts: Vec::new(),
                next: None,
            });
        }

        let query = CollectionQuery {
            order_by: Some((FIELD_DATE.to_owned(), OrderDirection::Descending)),
            start_after: after.map(|cursor| QueryCursor {
                value: Value::from(cursor.date.timestamp_millis()),
                document_id: cursor.id.to_string(),
            }),
            limit: Some(limit),
        };
        let documents = self.store.list_documents(path, &query).await?;

        let next = match documents.last() {
            Some(last) if documents.len() == limit => Some(cursor_at(last)?),
            _ => None,
        };

        let mut posts = Vec::with_capacity(documents.len());
        for document in documents {
            match Post::from_fields(document.fields) {
                Ok(mut post) => {
                    post.likers = self.likers(&post.id).await?;
                    posts.push(post);
                }
                Err(e) => {
                    tracing::warn!(%path, document = %document.id, error = %e, "skipping unreadable post")
                }
            }
        }

        Ok(PostPage { posts, next })
    }
}

#[async_trait::async_trait]
impl PostService for RealPostService {
    async fn create_post(&self, post: &Post) -> Result<(), PostError> {
        let fields = Self::encode(post)?;
        tracing::debug!(post = %post.id, owner = %post.owner, "creating post");

        let writes = vec![
            PlannedWrite::set(CollectionPath::posts(), post.id.as_str(), fields.clone()),
            PlannedWrite::set(owner_posts(&post.owner), post.id.as_str(), fields),
        ];
        run_sequential(self.store.as_ref(), writes).await?;
        Ok(())
    }

    async fn delete_post(&self, post: &Post) -> Result<(), PostError> {
        let global_likers = CollectionPath::post_likers(&post.id);
        let owner_likers = CollectionPath::user_post_likers(&post.owner, &post.id);

        let mut writes = Vec::new();
        for liker in self.store.list_document_ids(&global_likers).await? {
            writes.push(PlannedWrite::delete(global_likers.clone(), liker));
        }
        writes.push(PlannedWrite::delete(CollectionPath::posts(), post.id.as_str()));
        for liker in self.store.list_document_ids(&owner_likers).await? {
            writes.push(PlannedWrite::delete(owner_likers.clone(), liker));
        }
        writes.push(PlannedWrite::delete(owner_posts(&post.owner), post.id.as_str()));

        tracing::debug!(post = %post.id, writes = writes.len(), "deleting post");
        run_sequential(self.store.as_ref(), writes).await?;
        Ok(())
    }

    async fn user_posts(
        &self,
        owner: &UserId,
        page_size: PageSize,
        after: Option<PostCursor>,
    ) -> Result<PostPage, PostError> {
        let profile = self.profile_service.get_profile(owner).await?;
        if profile.removed {
            return Ok(PostPage {
                posts: Vec::new(),
                next: None,
            });
        }

        let mut page = self.page(&owner_posts(owner), page_size, after).await?;
        for post in &mut page.posts {
            post.owner_profile = Some(profile.clone());
        }
        Ok(page)
    }

    async fn all_posts(
        &self,
        page_size: PageSize,
        after: Option<PostCursor>,
    ) -> Result<PostPage, PostError> {
        let mut page = self.page(&CollectionPath::posts(), page_size, after).await?;

        let mut owners: BTreeMap<UserId, Profile> = BTreeMap::new();
        for post in &page.posts {
            if !owners.contains_key(&post.owner) {
                let profile = self.profile_service.get_profile(&post.owner).await?;
                owners.insert(post.owner.clone(), profile);
            }
        }
        for post in &mut page.posts {
            post.owner_profile = owners.get(&post.owner).cloned();
        }
        Ok(page)
    }

    async fn like_post(&self, post: &Post, liker: &UserId) -> Result<(), PostError> {
        let writes = vec![
            PlannedWrite::set(
                CollectionPath::post_likers(&post.id),
                liker.to_string(),
                liker_fields(liker),
            ),
            PlannedWrite::set(
                CollectionPath::user_post_likers(&post.owner, &post.id),
                liker.to_string(),
                liker_fields(liker),
            ),
        ];
        run_sequential(self.store.as_ref(), writes).await?;
        Ok(())
    }

    async fn unlike_post(&self, post: &Post, liker: &UserId) -> Result<(), PostError> {
        let writes = vec![
            PlannedWrite::delete(CollectionPath::post_likers(&post.id), liker.to_string()),
            PlannedWrite::delete(
                CollectionPath::user_post_likers(&post.owner, &post.id),
                liker.to_string(),
            ),
        ];
        run_sequential(self.store.as_ref(), writes).await?;
        Ok(())
    }

    async fn likers(&self, post: &PostId) -> Result<Vec<UserId>, PostError> {
        let path = CollectionPath::post_likers(post);
        let documents = self
            .store
            .list_documents(&path, &CollectionQuery::default())
            .await?;

        let ids = documents
            .into_iter()
            .filter_map(|document| {
                let id = document
                    .fields
                    .get(FIELD_ID)
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<UserId>().ok());
                if id.is_none() {
                    tracing::warn!(%path, document = %document.id, "skipping liker without a valid id");
                }
                id
            })
            .collect();
        Ok(ids)
    }
}
