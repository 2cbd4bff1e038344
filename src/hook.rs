//! Monitor-mode receive hook
//!
//! [`MonitorHook`] is invoked once per received frame. It checks the output
//! size against the transport ceiling, acquires a buffer, writes the capture
//! header followed by the untouched frame bytes and hands the result to the
//! sink. Frames that cannot be forwarded are dropped and reported; the hook
//! itself never fails and keeps no state between frames.

use thiserror::Error;
use tracing::{trace, warn};

use crate::config::HookConfig;
use crate::diagnostics::{Diagnostics, TracingDiagnostics};
use crate::pool::BufferAllocator;
use crate::radiotap::{CaptureHeader, HEADER_LEN};
use crate::resolver::FrequencyResolver;
use crate::sink::FrameSink;
use crate::status::ReceiveStatus;
use crate::Result;

/// Why a frame was not forwarded
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("no free buffer for {size} bytes")]
    NoBufferAvailable { size: usize },
}

/// Outcome of one hook invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Handed to the sink; `len` is header plus frame bytes
    Forwarded { len: usize },
    Dropped(DropReason),
}

impl Disposition {
    pub fn is_forwarded(&self) -> bool {
        matches!(self, Disposition::Forwarded { .. })
    }
}

/// Capture-header synthesizer wired to its collaborators
pub struct MonitorHook<R, A, S, D = TracingDiagnostics> {
    config: HookConfig,
    resolver: R,
    allocator: A,
    sink: S,
    diagnostics: D,
}

impl<R, A, S> MonitorHook<R, A, S>
where
    R: FrequencyResolver,
    A: BufferAllocator,
    S: FrameSink,
{
    /// Create a hook that logs dropped frames through `tracing`
    pub fn new(config: HookConfig, resolver: R, allocator: A, sink: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            resolver,
            allocator,
            sink,
            diagnostics: TracingDiagnostics,
        })
    }
}

impl<R, A, S, D> MonitorHook<R, A, S, D>
where
    R: FrequencyResolver,
    A: BufferAllocator,
    S: FrameSink,
    D: Diagnostics,
{
    /// Replace the outcome reporter
    pub fn with_diagnostics<E: Diagnostics>(self, diagnostics: E) -> MonitorHook<R, A, S, E> {
        MonitorHook {
            config: self.config,
            resolver: self.resolver,
            allocator: self.allocator,
            sink: self.sink,
            diagnostics,
        }
    }

    pub fn config(&self) -> &HookConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    pub fn diagnostics(&self) -> &D {
        &self.diagnostics
    }

    /// Derive the capture header for a status record
    pub fn header_for(&self, status: &ReceiveStatus) -> CaptureHeader {
        let spec = status.channel_spec;
        let channel_freq = self.resolver.resolve(spec.band(), spec.channel());
        CaptureHeader::from_status(status, channel_freq, self.config.ht_flags_policy)
    }

    /// Process one received frame
    ///
    /// Always returns normally. A dropped frame is reported to the
    /// diagnostics exactly once and nothing reaches the sink.
    pub fn on_frame(&self, status: &ReceiveStatus, frame: &[u8]) -> Disposition {
        match self.forward(status, frame) {
            Ok(len) => {
                self.diagnostics.frame_forwarded(len);
                Disposition::Forwarded { len }
            }
            Err(reason) => {
                self.diagnostics.frame_dropped(&reason);
                Disposition::Dropped(reason)
            }
        }
    }

    fn forward(&self, status: &ReceiveStatus, frame: &[u8]) -> std::result::Result<usize, DropReason> {
        let required = frame.len().saturating_add(HEADER_LEN);
        if required > self.config.max_output_len {
            return Err(DropReason::FrameTooLarge {
                size: required,
                max: self.config.max_output_len,
            });
        }

        let mut buffer = match self.allocator.acquire(required) {
            Some(buffer) if buffer.len() == required => buffer,
            Some(buffer) => {
                warn!(
                    "Allocator returned {} bytes for a {} byte request",
                    buffer.len(),
                    required
                );
                return Err(DropReason::NoBufferAvailable { size: required });
            }
            None => return Err(DropReason::NoBufferAvailable { size: required }),
        };

        let header = self.header_for(status);
        let (head, body) = buffer.split_at_mut(HEADER_LEN);
        head.copy_from_slice(&header.encode());
        body.copy_from_slice(frame);

        trace!(
            "Forwarding {} byte frame on {} ({})",
            frame.len(),
            status.channel_spec,
            status.encoding.name()
        );
        self.sink.deliver(buffer);
        Ok(required)
    }
}
