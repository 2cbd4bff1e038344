//! # rxtap-tools - capture tooling around the rxtap receive hook
//!
//! Drives [`rxtap::MonitorHook`] from recorded receive events and writes the
//! resulting radiotap frames to pcap files.
//!
//! ## Components
//!
//! - `config`: TOML configuration for the hook, buffer pool and capture output
//! - `pcap`: pcap writer and the [`PcapSink`] frame sink
//! - `replay`: JSON-lines receive records and the replay driver

pub mod config;
pub mod error;
pub mod pcap;
pub mod replay;

pub use crate::{
    config::{ToolConfig, ValidationResult},
    error::{Result, ToolError},
    pcap::{PcapSink, PcapWriter, LINKTYPE_IEEE802_11_RADIOTAP},
    replay::{read_records, replay, ReplayRecord, ReplaySummary},
};

/// Current crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
