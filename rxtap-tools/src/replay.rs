//! Replay of recorded receive events through the hook
//!
//! Input is JSON lines, one receive event per line: the status fields at the
//! top level plus the raw frame as a hex string.
//!
//! ```text
//! {"timestamp":1000,"channel_spec":4102,"encoding":2,"data_rate":12,"signal_power":-40,"noise_power":-95,"frame":"80000000ffffffffffff"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use serde::{Deserialize, Serialize};
use std::io::BufRead;
use tracing::{debug, info};

use rxtap::{
    BufferAllocator, Diagnostics, Disposition, DropReason, FrameSink, FrequencyResolver,
    MonitorHook, ReceiveStatus,
};

use crate::{Result, ToolError};

/// One recorded receive event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecord {
    #[serde(flatten)]
    pub status: ReceiveStatus,
    /// Frame bytes, hex encoded
    pub frame: String,
}

impl ReplayRecord {
    pub fn new(status: ReceiveStatus, frame: &[u8]) -> Self {
        Self {
            status,
            frame: hex::encode(frame),
        }
    }

    /// Decode the frame bytes
    pub fn frame_bytes(&self) -> Result<Vec<u8>> {
        Ok(hex::decode(self.frame.trim())?)
    }
}

/// Outcome counts of a replay run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReplaySummary {
    pub records: u64,
    pub forwarded: u64,
    pub bytes_forwarded: u64,
    pub dropped_too_large: u64,
    pub dropped_no_buffer: u64,
}

impl ReplaySummary {
    pub fn dropped(&self) -> u64 {
        self.dropped_too_large + self.dropped_no_buffer
    }

    fn record(&mut self, disposition: Disposition) {
        self.records += 1;
        match disposition {
            Disposition::Forwarded { len } => {
                self.forwarded += 1;
                self.bytes_forwarded += len as u64;
            }
            Disposition::Dropped(DropReason::FrameTooLarge { .. }) => self.dropped_too_large += 1,
            Disposition::Dropped(DropReason::NoBufferAvailable { .. }) => {
                self.dropped_no_buffer += 1
            }
        }
    }
}

/// Read every record from a JSON-lines stream
pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<ReplayRecord>> {
    let mut records = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let record: ReplayRecord =
            serde_json::from_str(trimmed).map_err(|e| ToolError::Replay {
                line: index + 1,
                message: e.to_string(),
            })?;
        records.push(record);
    }

    debug!("Read {} replay records", records.len());
    Ok(records)
}

/// Feed every record through `hook`
///
/// A record whose frame is not valid hex aborts the run; frames the hook
/// drops are only counted.
pub fn replay<R, A, S, D>(
    hook: &MonitorHook<R, A, S, D>,
    records: &[ReplayRecord],
) -> Result<ReplaySummary>
where
    R: FrequencyResolver,
    A: BufferAllocator,
    S: FrameSink,
    D: Diagnostics,
{
    let mut summary = ReplaySummary::default();

    for (index, record) in records.iter().enumerate() {
        let frame = record.frame_bytes().map_err(|e| ToolError::Replay {
            line: index + 1,
            message: e.to_string(),
        })?;
        summary.record(hook.on_frame(&record.status, &frame));
    }

    info!(
        "Replayed {} records: {} forwarded, {} dropped",
        summary.records,
        summary.forwarded,
        summary.dropped()
    );
    Ok(summary)
}
