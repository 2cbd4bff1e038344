//! Frame delivery toward the capture consumer

use bytes::BytesMut;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

/// Accepts finished capture frames
///
/// Delivery is fire-and-forget from the hook's point of view; the sink owns
/// the buffer afterwards and must preserve submission order.
pub trait FrameSink {
    fn deliver(&self, frame: BytesMut);
}

impl<T: FrameSink + ?Sized> FrameSink for &T {
    fn deliver(&self, frame: BytesMut) {
        (**self).deliver(frame)
    }
}

impl<T: FrameSink + ?Sized> FrameSink for Arc<T> {
    fn deliver(&self, frame: BytesMut) {
        (**self).deliver(frame)
    }
}

/// Hands frames to an async consumer over an unbounded channel
///
/// Sending never blocks, so the sink is safe to call from the receive path.
/// Frames sent after the receiver is gone are counted and dropped. The queue
/// grows while the consumer lags and allocates as it does; the consumer must
/// keep up, or use [`BoundedChannelSink`] to cap the backlog.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<BytesMut>,
    lost: AtomicU64,
}

impl ChannelSink {
    /// Create a sink together with the receiving end of its channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BytesMut>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                lost: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Frames that could not be delivered because the receiver was closed
    pub fn lost(&self) -> u64 {
        self.lost.load(Ordering::Relaxed)
    }
}

impl FrameSink for ChannelSink {
    fn deliver(&self, frame: BytesMut) {
        if let Err(e) = self.tx.send(frame) {
            self.lost.fetch_add(1, Ordering::Relaxed);
            debug!("Capture consumer gone, dropping {} byte frame", e.0.len());
        }
    }
}

/// Hands frames to an async consumer over a fixed-capacity channel
///
/// Never blocks and never grows: a frame that finds the queue full, or the
/// receiver gone, is counted in [`lost`](Self::lost) and dropped.
#[derive(Debug)]
pub struct BoundedChannelSink {
    tx: mpsc::Sender<BytesMut>,
    lost: AtomicU64,
}

impl BoundedChannelSink {
    /// Create a sink holding at most `capacity` undelivered frames
    /// (at least one)
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<BytesMut>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                lost: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Frames dropped because the queue was full or the receiver closed
    pub fn lost(&self) -> u64 {
        self.lost.load(Ordering::Relaxed)
    }
}

impl FrameSink for BoundedChannelSink {
    fn deliver(&self, frame: BytesMut) {
        match self.tx.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => {
                self.lost.fetch_add(1, Ordering::Relaxed);
                debug!("Capture queue full, dropping {} byte frame", frame.len());
            }
            Err(TrySendError::Closed(frame)) => {
                self.lost.fetch_add(1, Ordering::Relaxed);
                debug!("Capture consumer gone, dropping {} byte frame", frame.len());
            }
        }
    }
}
