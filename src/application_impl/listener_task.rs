use crate::application_port::Subscription;
use crate::domain_port::{Listener, StoreError};
use std::future::Future;
use tokio_util::sync::CancellationToken;

pub(crate) enum ListenerEvent<T> {
    Next(T),
    /// Transport error. Nothing follows it.
    Failed(StoreError),
    /// The store closed the listener. Nothing follows it.
    Closed,
}

/// Drain `listener` on a spawned task, awaiting `on_event` for every
/// notification in order, until the returned subscription is cancelled or
/// the listener fails or closes. Cancellation is not reported.
pub(crate) fn spawn_subscription<T, F, Fut>(
    target: String,
    mut listener: Listener<T>,
    mut on_event: F,
) -> Subscription
where
    T: Send + 'static,
    F: FnMut(ListenerEvent<T>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let token = CancellationToken::new();
    let cancelled = token.clone();
    let feed = target.clone();

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {
                    tracing::debug!(%feed, "feed cancelled");
                    break;
                }
                next = listener.next() => match next {
                    Some(Ok(item)) => on_event(ListenerEvent::Next(item)).await,
                    Some(Err(e)) => {
                        tracing::warn!(%feed, error = %e, "feed failed");
                        on_event(ListenerEvent::Failed(e)).await;
                        break;
                    }
                    None => {
                        tracing::warn!(%feed, "feed closed by the store");
                        on_event(ListenerEvent::Closed).await;
                        break;
                    }
                }
            }
        }
    });

    Subscription::new(target, token, task)
}
