//! Hook configuration

use serde::{Deserialize, Serialize};

use crate::radiotap::{HtFlagsPolicy, HEADER_LEN};
use crate::{Result, RxTapError};

/// Largest output frame the reference transport delivers to user space
pub const DEFAULT_MAX_OUTPUT_LEN: usize = 2032;

/// Upper bound on the configurable ceiling
pub const MAX_OUTPUT_LEN_LIMIT: usize = u16::MAX as usize;

/// Configuration of a [`MonitorHook`](crate::MonitorHook)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    /// Ceiling on header + frame bytes imposed by the transport below the sink
    pub max_output_len: usize,
    /// Mapping of HT status flags onto radiotap MCS flags
    pub ht_flags_policy: HtFlagsPolicy,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            max_output_len: DEFAULT_MAX_OUTPUT_LEN,
            ht_flags_policy: HtFlagsPolicy::default(),
        }
    }
}

impl HookConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_output_len <= HEADER_LEN {
            return Err(RxTapError::Config(format!(
                "max_output_len {} leaves no room for frame bytes after the {}-byte header",
                self.max_output_len, HEADER_LEN
            )));
        }
        if self.max_output_len > MAX_OUTPUT_LEN_LIMIT {
            return Err(RxTapError::Config(format!(
                "max_output_len {} exceeds {}",
                self.max_output_len, MAX_OUTPUT_LEN_LIMIT
            )));
        }
        Ok(())
    }

    /// Largest original frame that can still be forwarded
    pub fn max_frame_len(&self) -> usize {
        self.max_output_len.saturating_sub(HEADER_LEN)
    }
}
