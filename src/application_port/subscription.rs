use futures_util::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A live listener task. Dropping it cancels.
#[derive(Debug)]
pub struct Subscription {
    target: String,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(target: String, token: CancellationToken, task: JoinHandle<()>) -> Self {
        Self {
            target,
            token,
            task: Some(task),
        }
    }

    /// Store path the subscription listens to.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Stop delivery. A notification already being handled may still finish.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled() && self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Wait until the subscription has stopped delivering, either because it
    /// was cancelled or because the underlying listener failed or closed.
    pub async fn stopped(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Stream surface over a [`Subscription`]. The stream ends once the
/// subscription has stopped and every delivered item was read.
#[derive(Debug)]
pub struct Feed<T> {
    receiver: UnboundedReceiver<T>,
    subscription: Subscription,
}

impl<T> Feed<T> {
    pub fn new(receiver: UnboundedReceiver<T>, subscription: Subscription) -> Self {
        Self {
            receiver,
            subscription,
        }
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    pub fn cancel(&self) {
        self.subscription.cancel();
    }
}

impl<T> Unpin for Feed<T> {}

impl<T> Stream for Feed<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}
