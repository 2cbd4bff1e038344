//! Output buffer allocation
//!
//! The hook asks for exactly one buffer per forwarded frame. Allocators hand
//! out zero-filled buffers whose length equals the requested size, or `None`
//! when they cannot satisfy the request.

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Source of output buffers
pub trait BufferAllocator {
    /// Acquire a zero-filled buffer of exactly `size` bytes
    fn acquire(&self, size: usize) -> Option<BytesMut>;
}

impl<T: BufferAllocator + ?Sized> BufferAllocator for &T {
    fn acquire(&self, size: usize) -> Option<BytesMut> {
        (**self).acquire(size)
    }
}

impl<T: BufferAllocator + ?Sized> BufferAllocator for Arc<T> {
    fn acquire(&self, size: usize) -> Option<BytesMut> {
        (**self).acquire(size)
    }
}

impl<T: BufferAllocator + ?Sized> BufferAllocator for Box<T> {
    fn acquire(&self, size: usize) -> Option<BytesMut> {
        (**self).acquire(size)
    }
}

/// Allocates a fresh heap buffer for every request
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapAllocator;

impl BufferAllocator for HeapAllocator {
    fn acquire(&self, size: usize) -> Option<BytesMut> {
        Some(BytesMut::zeroed(size))
    }
}

/// Bounded pool of fixed-capacity buffers
///
/// At most `max_buffers` buffers are handed out at any time. Buffers come
/// back through [`FramePool::recycle`]; once every buffer is out and none has
/// been returned, requests fail. A returned buffer is only taken back while
/// the pool has buffers outstanding, so recycling can never grow it past
/// `max_buffers`.
#[derive(Debug)]
pub struct FramePool {
    /// Returned buffers ready for reuse
    available: Mutex<VecDeque<BytesMut>>,
    /// Capacity of each buffer
    buffer_size: usize,
    /// Maximum number of buffers ever allocated
    max_buffers: usize,
    /// Buffers allocated so far
    allocated: AtomicUsize,
    /// Buffers handed out and not yet returned
    outstanding: AtomicUsize,
    stats: PoolCounters,
}

#[derive(Debug, Default)]
struct PoolCounters {
    created: AtomicU64,
    reused: AtomicU64,
    recycled: AtomicU64,
    discarded: AtomicU64,
    exhausted: AtomicU64,
    oversized: AtomicU64,
}

/// Pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolStats {
    /// Buffers allocated
    pub created: u64,
    /// Requests served from returned buffers
    pub reused: u64,
    /// Buffers returned to the pool
    pub recycled: u64,
    /// Returned buffers dropped because they did not fit the pool
    pub discarded: u64,
    /// Requests refused because every buffer was in use
    pub exhausted: u64,
    /// Requests refused because they exceeded the buffer size
    pub oversized: u64,
}

impl PoolStats {
    /// Get total number of successful acquisitions
    pub fn served(&self) -> u64 {
        self.created + self.reused
    }

    /// Get buffer reuse rate
    pub fn reuse_rate(&self) -> f64 {
        let served = self.served();
        if served == 0 {
            0.0
        } else {
            self.reused as f64 / served as f64
        }
    }
}

impl FramePool {
    /// Create new pool. No buffer is allocated until first requested.
    pub fn new(buffer_size: usize, max_buffers: usize) -> Self {
        Self {
            available: Mutex::new(VecDeque::with_capacity(max_buffers)),
            buffer_size,
            max_buffers,
            allocated: AtomicUsize::new(0),
            outstanding: AtomicUsize::new(0),
            stats: PoolCounters::default(),
        }
    }

    /// Capacity of each pooled buffer
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn max_buffers(&self) -> usize {
        self.max_buffers
    }

    /// Number of buffers currently waiting for reuse
    pub fn available(&self) -> usize {
        self.lock_available().len()
    }

    /// Number of buffers handed out and not yet returned
    pub fn in_use(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Return a buffer to the pool
    pub fn recycle(&self, mut buffer: BytesMut) {
        if buffer.capacity() < self.buffer_size {
            self.stats.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }

        buffer.clear();
        let mut available = self.lock_available();
        let returned = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if returned {
            available.push_back(buffer);
            self.stats.recycled.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.stats.created.load(Ordering::Relaxed),
            reused: self.stats.reused.load(Ordering::Relaxed),
            recycled: self.stats.recycled.load(Ordering::Relaxed),
            discarded: self.stats.discarded.load(Ordering::Relaxed),
            exhausted: self.stats.exhausted.load(Ordering::Relaxed),
            oversized: self.stats.oversized.load(Ordering::Relaxed),
        }
    }

    fn lock_available(&self) -> std::sync::MutexGuard<'_, VecDeque<BytesMut>> {
        // A poisoned free list is still a valid free list
        self.available.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reserve an allocation slot if the pool has not reached its limit
    fn reserve_slot(&self) -> bool {
        self.allocated
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_buffers).then_some(n + 1)
            })
            .is_ok()
    }
}

impl BufferAllocator for FramePool {
    fn acquire(&self, size: usize) -> Option<BytesMut> {
        if size > self.buffer_size {
            self.stats.oversized.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let reused = self.lock_available().pop_front();
        let mut buffer = match reused {
            Some(buffer) => {
                self.stats.reused.fetch_add(1, Ordering::Relaxed);
                buffer
            }
            None if self.reserve_slot() => {
                self.stats.created.fetch_add(1, Ordering::Relaxed);
                BytesMut::with_capacity(self.buffer_size)
            }
            None => {
                self.stats.exhausted.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        self.outstanding.fetch_add(1, Ordering::AcqRel);
        buffer.resize(size, 0);
        Some(buffer)
    }
}
