use futures_util::stream::{BoxStream, Stream, StreamExt};
use std::fmt;

use crate::StoreResult;

/// A registered listener on the store.
///
/// Items arrive in delivery order. The listener is deregistered as soon as
/// the subscription is dropped, so tying it to the owning view's lifetime is
/// enough to avoid leaked callbacks.
pub struct Subscription<T> {
    stream: BoxStream<'static, StoreResult<T>>,
}

impl<T> Subscription<T> {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = StoreResult<T>> + Send + 'static,
    {
        Self {
            stream: stream.boxed(),
        }
    }

    /// Wait for the next pushed value. `None` once the store closed the feed.
    pub async fn next(&mut self) -> Option<StoreResult<T>> {
        self.stream.next().await
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
