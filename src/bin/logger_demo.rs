use rapport::app::App;
use rapport::domain_model::{PageSize, UserId};
use rapport::infra_memory::InMemoryDocumentStore;
use rapport::logger::*;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    let app = App::with_store(Arc::new(InMemoryDocumentStore::new()), PageSize(10), PageSize(20));
    let (a, b): (UserId, UserId) = ("alice".parse()?, "bob".parse()?);

    // transition logs are at debug level and hidden by the bootstrap filter
    info!("bootstrap filter");
    app.relationship_service.send(&a, &b).await?;

    let config = LogConfig {
        filter: "debug".to_string(),
    };
    logger.reload_from_config(&config)?;
    info!("debug filter");
    app.relationship_service.accept(&b, &a).await?;

    // a self relation is rejected before any write
    if let Err(e) = app.relationship_service.send(&a, &a).await {
        warn!("expected failure: {e}");
    }

    Ok(())
}
