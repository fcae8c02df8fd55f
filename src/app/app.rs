use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::PageSize;
use crate::domain_port::DocumentStore;
use crate::infra_memory::InMemoryDocumentStore;
use crate::logger::*;
use crate::settings::Settings;
use std::sync::Arc;

/// The wired service graph.
pub struct App {
    pub relationship_service: Arc<dyn RelationshipService>,
    pub account_service: Arc<dyn AccountService>,
    pub profile_service: Arc<dyn ProfileService>,
    pub post_service: Arc<dyn PostService>,
    pub messaging_service: Arc<dyn MessagingService>,
    pub change_feed: Arc<dyn ChangeFeed>,
    pub profile_page_size: PageSize,
    pub post_page_size: PageSize,
}

impl App {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let store: Arc<dyn DocumentStore> = match settings.store.backend.as_str() {
            "memory" => Arc::new(InMemoryDocumentStore::new()),
            other => return Err(anyhow::anyhow!("Unknown store backend: {}", other)),
        };
        if settings.profile.page_size == 0 {
            return Err(anyhow::anyhow!("profile.page_size must be positive"));
        }
        if settings.posts.page_size == 0 {
            return Err(anyhow::anyhow!("posts.page_size must be positive"));
        }

        let app = Self::with_store(
            store,
            PageSize(settings.profile.page_size),
            PageSize(settings.posts.page_size),
        );
        info!(backend = %settings.store.backend, "services wired");
        Ok(app)
    }

    pub fn with_store(
        store: Arc<dyn DocumentStore>,
        profile_page_size: PageSize,
        post_page_size: PageSize,
    ) -> Self {
        let change_feed: Arc<dyn ChangeFeed> = Arc::new(StoreChangeFeed::new(store.clone()));
        let relationship_service: Arc<dyn RelationshipService> = Arc::new(
            RealRelationshipService::new(store.clone(), change_feed.clone()),
        );
        let account_service: Arc<dyn AccountService> =
            Arc::new(RealAccountService::new(store.clone()));
        let profile_service: Arc<dyn ProfileService> =
            Arc::new(RealProfileService::new(store.clone()));
        let post_service: Arc<dyn PostService> = Arc::new(RealPostService::new(
            store.clone(),
            profile_service.clone(),
        ));
        let messaging_service: Arc<dyn MessagingService> =
            Arc::new(RealMessagingService::new(store));

        Self {
            relationship_service,
            account_service,
            profile_service,
            post_service,
            messaging_service,
            change_feed,
            profile_page_size,
            post_page_size,
        }
    }
}
