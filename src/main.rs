use futures_util::StreamExt;
use rapport::app::App;
use rapport::application_port::RelationError;
use rapport::domain_model::{Message, Post, Profile, RelationChange, UserId};
use rapport::logger::*;
use rapport::settings::*;

fn log_change(feed: &str, change: Result<RelationChange, RelationError>) {
    match change {
        Ok(change) => info!(feed, added = ?change.added, removed = ?change.removed, "relation change"),
        Err(e) => warn!(feed, error = %e, "relation feed stopped"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    info!(?project_settings);
    let logger_config = LogConfig {
        filter: project_settings.log.filter.clone(),
    };
    logger.reload_from_config(&logger_config)?;

    let from: UserId = cli.from.parse()?;
    let to: UserId = cli.to.parse()?;

    let app = App::try_new(&project_settings).await?;
    for user in [&from, &to] {
        app.account_service
            .create_account(&Profile::new(user.clone(), user.to_string()))
            .await?;
    }

    let relations = app.relationship_service.clone();

    // region watch feeds

    let mut incoming = relations.subscribe_requests(&to).await?;
    let mut friends = relations.subscribe_friends(&from).await?;
    let unfriended = to.clone();
    // runs until the friends feed reports the final removal or ends
    let watcher = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(change) = incoming.next() => log_change("incoming", change),
                change = friends.next() => {
                    let Some(change) = change else { break };
                    let last = matches!(&change, Ok(c) if c.removed.contains(&unfriended));
                    log_change("friends", change);
                    if last {
                        break;
                    }
                }
            }
        }
        incoming.cancel();
        while let Some(change) = incoming.next().await {
            log_change("incoming", change);
        }
    });

    let mut inbox = app.messaging_service.subscribe_messages(&to).await?;

    // endregion

    // region lifecycle walk

    relations.send(&from, &to).await?;
    let waiting = relations.waiting_ids(&to).await?;
    info!(?waiting, "{to} has pending requests");

    relations.accept(&to, &from).await?;
    for user in [&from, &to] {
        let friends = relations.friend_ids(user).await?;
        info!(?friends, "{user} friends");
    }
    let state = relations.relation_state(&from, &to).await?;
    info!(?state, "{from} -> {to}");

    let post = Post::new(from.clone(), "hello from the walkthrough");
    app.post_service.create_post(&post).await?;
    app.post_service.like_post(&post, &to).await?;
    let posts = app.post_service.all_posts(app.post_page_size, None).await?;
    for post in &posts.posts {
        info!(post = %post.id, owner = %post.owner, likers = ?post.likers, "feed post");
    }

    app.messaging_service
        .send_message(&Message::text(from.clone(), to.clone(), "hi"))
        .await?;
    if let Some(messages) = inbox.next().await {
        let messages = messages?;
        info!(?messages, "{to} inbox");
    }
    inbox.cancel();

    app.account_service.set_offline(&from).await?;
    let page = app
        .profile_service
        .list_profile_ids(app.profile_page_size, None)
        .await?;
    info!(ids = ?page.ids, "most recently active profiles");

    relations.remove_friend(&from, &to).await?;
    let state = relations.relation_state(&from, &to).await?;
    info!(?state, "{from} -> {to}");

    // endregion

    match watcher.await {
        Ok(()) => info!("walkthrough finished"),
        Err(e) => error!("feed watcher failed: {e}"),
    }

    Ok(())
}
