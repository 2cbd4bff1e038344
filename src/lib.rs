//! # rxtap - radiotap capture headers for monitor-mode receive hooks
//!
//! A receive hook called once per frame captured by an adapter in monitor
//! mode. It synthesizes a fixed-layout radiotap header from the hardware
//! receive status (timing, channel, signal, modulation/coding), prepends it
//! to the raw frame and forwards the result to a capture consumer.
//!
//! ## Architecture
//!
//! - `status`: receive-status records as produced by the PHY pipeline
//! - `radiotap`: the capture header, its derivation and its wire format
//! - `hook`: size gating, buffer acquisition, assembly and forwarding
//! - `resolver`, `pool`, `sink`: collaborator traits and stock implementations
//! - `diagnostics`: drop/forward reporting
//! - `config`: hook configuration

pub mod config;
pub mod diagnostics;
pub mod hook;
pub mod pool;
pub mod radiotap;
pub mod resolver;
pub mod sink;
pub mod status;

pub use crate::{
    config::{HookConfig, DEFAULT_MAX_OUTPUT_LEN, MAX_OUTPUT_LEN_LIMIT},
    diagnostics::{Diagnostics, HookCounters, HookStats, TracingDiagnostics},
    hook::{Disposition, DropReason, MonitorHook},
    pool::{BufferAllocator, FramePool, HeapAllocator, PoolStats},
    radiotap::{CaptureHeader, HtFlagsPolicy, McsInfo, HEADER_LEN},
    resolver::{ChannelTable, FrequencyResolver},
    sink::{BoundedChannelSink, ChannelSink, FrameSink},
    status::{Band, Bandwidth, ChannelSpec, Encoding, ReceiveStatus},
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RxTapError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, RxTapError>;

/// Current crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
