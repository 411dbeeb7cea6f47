use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::trace;

use super::{ChangeEvent, Observer};
use crate::{Preferences, key::AnyKey};

/// Changes to a set of keys as an async stream.
///
/// Events are queued on the writer's thread and consumed asynchronously.
/// Dropping the stream invalidates its observer; once invalidated, the
/// stream yields whatever was already queued and then ends.
///
/// The queue is unbounded: a stream that is kept alive but never polled
/// buffers every change until it is polled or dropped.
pub struct ChangeStream {
    observer: Observer,
    receiver: UnboundedReceiverStream<ChangeEvent>,
}

impl ChangeStream {
    /// The observer feeding this stream.
    pub fn observer(&self) -> &Observer {
        &self.observer
    }
}

impl Stream for ChangeStream {
    type Item = ChangeEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_next_unpin(cx)
    }
}

impl Preferences {
    /// Streams every change to `keys`.
    ///
    /// ```
    /// use futures::StreamExt;
    /// use typed_prefs::{Key, Preferences};
    ///
    /// const VOLUME: Key<u8> = Key::from_static("volume");
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let prefs = Preferences::in_memory();
    /// let mut changes = prefs.changes(&[VOLUME.any().clone()]);
    ///
    /// prefs.set(&VOLUME, &4).unwrap();
    /// let change = changes.next().await.unwrap();
    /// assert_eq!(change.value_for(&VOLUME), Some(4));
    /// # });
    /// ```
    pub fn changes(&self, keys: &[AnyKey]) -> ChangeStream {
        let (sender, receiver) = mpsc::unbounded_channel();

        let observer = self.observe_any(keys, move |_, event| {
            if sender.send(event.clone()).is_err() {
                trace!(key = %event.key, "change stream receiver closed");
            }
        });

        ChangeStream {
            observer,
            receiver: UnboundedReceiverStream::new(receiver),
        }
    }
}
