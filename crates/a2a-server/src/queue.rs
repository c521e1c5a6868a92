//! Streaming Response Queue — unbounded single-consumer async channel.
//!
//! Decouples how fast an executor produces events from how fast the SSE
//! writer can flush them. Producers never block; the consumer suspends in
//! [`StreamingQueue::next`] until an item arrives or the queue is closed.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Cloneable handle to a shared queue. Any clone may push or close; only one
/// consumer should call [`next`](Self::next) at a time.
pub struct StreamingQueue<T> {
    tx: mpsc::UnboundedSender<T>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<T>>>,
    closed: CancellationToken,
}

impl<T> Clone for StreamingQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: Arc::clone(&self.rx),
            closed: self.closed.clone(),
        }
    }
}

impl<T> Default for StreamingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for StreamingQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingQueue")
            .field("buffered", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<T> StreamingQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            closed: CancellationToken::new(),
        }
    }

    /// Enqueue an item, waking a suspended consumer. Returns `false` (and
    /// drops the item) once the queue is closed or its reader is gone.
    pub fn push(&self, item: T) -> bool {
        if self.closed.is_cancelled() {
            return false;
        }
        self.tx.send(item).is_ok()
    }

    /// Mark the end of production. Buffered items remain readable.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Number of buffered items. Reads as zero while a consumer is parked
    /// in [`next`](Self::next), since it only parks on an empty channel.
    pub fn len(&self) -> usize {
        self.rx.try_lock().map(|rx| rx.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Next item, or `None` once the queue is closed and drained.
    pub async fn next(&self) -> Option<T> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            item = rx.recv() => return item,
            () = self.closed.cancelled() => {}
        }
        rx.try_recv().ok()
    }

    /// Consume the queue as a [`Stream`]. Dropping the stream closes the
    /// queue, so producers see `push == false` once the reader is gone.
    pub fn into_stream(self) -> QueueStream<T>
    where
        T: Send + 'static,
    {
        let closed = self.closed.clone();
        let items = stream::unfold(self, |queue| async move {
            let item = queue.next().await?;
            Some((item, queue))
        })
        .boxed();
        QueueStream { items, closed }
    }
}

/// [`Stream`] view over a [`StreamingQueue`].
pub struct QueueStream<T> {
    items: BoxStream<'static, T>,
    closed: CancellationToken,
}

impl<T> std::fmt::Debug for QueueStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueStream")
            .field("closed", &self.closed.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<T> Stream for QueueStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.items.poll_next_unpin(cx)
    }
}

impl<T> Drop for QueueStream<T> {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}
