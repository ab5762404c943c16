//! Broadcast signals for notifications that originate outside the store.
//!
//! A [`Signal`] is posted to by the host platform (a redirect URL arrived, the
//! application came back to the foreground) and consumed by any number of
//! subscribers. Only values posted *after* a subscription was created are
//! delivered to it.

use futures::Stream;
use std::fmt;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 16;

/// Multi-subscriber notification channel
pub struct Signal<T> {
    sender: broadcast::Sender<T>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl<T: Clone + Send + 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Signal<T> {
    /// Create a signal with the default buffer capacity
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a signal buffering up to `capacity` undelivered values per subscriber
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Deliver `value` to every current subscriber; returns how many there were
    pub fn post(&self, value: T) -> usize {
        let delivered = self.sender.send(value).unwrap_or(0);
        tracing::trace!(delivered, "Signal posted");
        delivered
    }

    /// Subscribe to values posted from now on
    #[must_use]
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live subscriptions
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A live subscription to a [`Signal`]
pub struct Subscription<T> {
    receiver: broadcast::Receiver<T>,
}

impl<T: Clone + Send + 'static> Subscription<T> {
    /// Wait for the next value; `None` once every sender is gone
    ///
    /// Values dropped because this subscriber lagged behind are skipped.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.recv().await {
                Ok(value) => return Some(value),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Signal subscriber lagged, values dropped");
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Turn the subscription into a stream of values
    pub fn into_stream(mut self) -> impl Stream<Item = T> + Send + 'static {
        async_stream::stream! {
            while let Some(value) = self.recv().await {
                yield value;
            }
        }
    }
}
