//! Per-frame outcome reporting
//!
//! The hook reports every dropped frame exactly once, and optionally every
//! forwarded one. Reporters run inside the receive path and must not block.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

use crate::hook::DropReason;

/// Receives the outcome of each hook invocation
pub trait Diagnostics {
    /// A frame was dropped
    fn frame_dropped(&self, reason: &DropReason);

    /// A frame was forwarded with `len` output bytes
    fn frame_forwarded(&self, _len: usize) {}
}

impl<T: Diagnostics + ?Sized> Diagnostics for &T {
    fn frame_dropped(&self, reason: &DropReason) {
        (**self).frame_dropped(reason)
    }

    fn frame_forwarded(&self, len: usize) {
        (**self).frame_forwarded(len)
    }
}

impl<T: Diagnostics + ?Sized> Diagnostics for Arc<T> {
    fn frame_dropped(&self, reason: &DropReason) {
        (**self).frame_dropped(reason)
    }

    fn frame_forwarded(&self, len: usize) {
        (**self).frame_forwarded(len)
    }
}

/// Report to both
impl<A: Diagnostics, B: Diagnostics> Diagnostics for (A, B) {
    fn frame_dropped(&self, reason: &DropReason) {
        self.0.frame_dropped(reason);
        self.1.frame_dropped(reason);
    }

    fn frame_forwarded(&self, len: usize) {
        self.0.frame_forwarded(len);
        self.1.frame_forwarded(len);
    }
}

/// Logs dropped frames as warnings
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn frame_dropped(&self, reason: &DropReason) {
        warn!("Dropping frame: {}", reason);
    }
}

/// Lock-free hook counters
#[derive(Debug, Default)]
pub struct HookCounters {
    forwarded: AtomicU64,
    bytes_forwarded: AtomicU64,
    too_large: AtomicU64,
    no_buffer: AtomicU64,
}

/// Snapshot of [`HookCounters`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HookStats {
    /// Frames handed to the sink
    pub forwarded: u64,
    /// Output bytes handed to the sink, headers included
    pub bytes_forwarded: u64,
    /// Frames dropped for exceeding the transport ceiling
    pub too_large: u64,
    /// Frames dropped because no buffer was available
    pub no_buffer: u64,
}

impl HookStats {
    pub fn dropped(&self) -> u64 {
        self.too_large + self.no_buffer
    }

    /// Get drop rate over all processed frames
    pub fn drop_rate(&self) -> f64 {
        let total = self.forwarded + self.dropped();
        if total == 0 {
            0.0
        } else {
            self.dropped() as f64 / total as f64
        }
    }
}

impl HookCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> HookStats {
        HookStats {
            forwarded: self.forwarded.load(Ordering::Relaxed),
            bytes_forwarded: self.bytes_forwarded.load(Ordering::Relaxed),
            too_large: self.too_large.load(Ordering::Relaxed),
            no_buffer: self.no_buffer.load(Ordering::Relaxed),
        }
    }
}

impl Diagnostics for HookCounters {
    fn frame_dropped(&self, reason: &DropReason) {
        let counter = match reason {
            DropReason::FrameTooLarge { .. } => &self.too_large,
            DropReason::NoBufferAvailable { .. } => &self.no_buffer,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn frame_forwarded(&self, len: usize) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
        self.bytes_forwarded.fetch_add(len as u64, Ordering::Relaxed);
    }
}
