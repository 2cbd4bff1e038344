//! Receive-status records
//!
//! Types describing the per-frame status record produced by the MAC/PHY
//! receive pipeline. The raw encodings follow the Broadcom `wl_rxsts`
//! layout: a d11ac chanspec, an encoding byte and an HT flags byte.

use serde::{Deserialize, Serialize};
use std::fmt;

/// HT receive flags as reported in the status record
pub mod ht_flags {
    pub const BW_MASK: u8 = 0x07;
    pub const BW_40: u8 = 0x01;
    pub const BW_20L: u8 = 0x02;
    pub const BW_20U: u8 = 0x04;
    pub const SGI: u8 = 0x08;
    pub const STBC_MASK: u8 = 0x30;
    pub const STBC_SHIFT: u8 = 4;
    pub const LDPC: u8 = 0x40;
}

/// Chanspec bit layout (d11ac)
pub mod chanspec {
    pub const CHAN_MASK: u16 = 0x00ff;
    pub const SB_MASK: u16 = 0x0700;
    pub const SB_SHIFT: u16 = 8;
    pub const BW_MASK: u16 = 0x3800;
    pub const BW_20: u16 = 0x1000;
    pub const BW_40: u16 = 0x1800;
    pub const BW_80: u16 = 0x2000;
    pub const BW_160: u16 = 0x2800;
    pub const BAND_MASK: u16 = 0xc000;
    pub const BAND_2G: u16 = 0x0000;
    pub const BAND_5G: u16 = 0xc000;
}

/// Radio band a channel lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Band {
    /// 2.4 GHz band
    TwoGhz,
    /// 5 GHz band
    FiveGhz,
    /// Band bits the hook does not know about (raw masked value)
    Reserved(u16),
}

impl Band {
    /// Get band name
    pub fn name(&self) -> &'static str {
        match self {
            Band::TwoGhz => "2.4GHz",
            Band::FiveGhz => "5GHz",
            Band::Reserved(_) => "reserved",
        }
    }
}

/// Channel bandwidth encoded in a chanspec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bandwidth {
    Bw20,
    Bw40,
    Bw80,
    Bw160,
    Unknown(u16),
}

impl Bandwidth {
    /// Get bandwidth in MHz, 0 when unknown
    pub fn mhz(&self) -> u16 {
        match self {
            Bandwidth::Bw20 => 20,
            Bandwidth::Bw40 => 40,
            Bandwidth::Bw80 => 80,
            Bandwidth::Bw160 => 160,
            Bandwidth::Unknown(_) => 0,
        }
    }
}

/// Packed channel specification: channel number, sideband, bandwidth and band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelSpec(pub u16);

impl ChannelSpec {
    /// Build a 20 MHz chanspec for a channel in the given band
    pub fn new(band: Band, channel: u8) -> Self {
        let band_bits = match band {
            Band::TwoGhz => chanspec::BAND_2G,
            Band::FiveGhz => chanspec::BAND_5G,
            Band::Reserved(bits) => bits & chanspec::BAND_MASK,
        };
        Self(band_bits | chanspec::BW_20 | channel as u16)
    }

    /// Raw chanspec value
    pub fn raw(&self) -> u16 {
        self.0
    }

    /// Control channel number
    pub fn channel(&self) -> u8 {
        (self.0 & chanspec::CHAN_MASK) as u8
    }

    /// Sideband index (meaningful for 40 MHz and wider)
    pub fn sideband(&self) -> u8 {
        ((self.0 & chanspec::SB_MASK) >> chanspec::SB_SHIFT) as u8
    }

    pub fn band(&self) -> Band {
        match self.0 & chanspec::BAND_MASK {
            chanspec::BAND_2G => Band::TwoGhz,
            chanspec::BAND_5G => Band::FiveGhz,
            other => Band::Reserved(other),
        }
    }

    pub fn bandwidth(&self) -> Bandwidth {
        match self.0 & chanspec::BW_MASK {
            chanspec::BW_20 => Bandwidth::Bw20,
            chanspec::BW_40 => Bandwidth::Bw40,
            chanspec::BW_80 => Bandwidth::Bw80,
            chanspec::BW_160 => Bandwidth::Bw160,
            other => Bandwidth::Unknown(other),
        }
    }
}

impl fmt::Display for ChannelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ch{} ({}, {} MHz)",
            self.channel(),
            self.band().name(),
            self.bandwidth().mhz()
        )
    }
}

/// Modulation family of a received frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Encoding {
    /// DSSS / CCK (802.11b rates)
    DsssCck,
    /// Legacy OFDM (802.11a/g rates)
    Ofdm,
    /// High Throughput (802.11n)
    Ht,
    /// Anything else, including VHT and unknown values. Built by hand with a
    /// known raw value it still means that value, see [`Encoding::normalized`].
    Other(u8),
}

impl Encoding {
    pub const RAW_UNKNOWN: u8 = 0;
    pub const RAW_DSSS_CCK: u8 = 1;
    pub const RAW_OFDM: u8 = 2;
    pub const RAW_HT: u8 = 3;
    pub const RAW_VHT: u8 = 4;

    /// Parse encoding from the raw status byte. Never fails: unknown values
    /// are kept as `Other`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            Self::RAW_DSSS_CCK => Encoding::DsssCck,
            Self::RAW_OFDM => Encoding::Ofdm,
            Self::RAW_HT => Encoding::Ht,
            other => Encoding::Other(other),
        }
    }

    /// Convert to the raw status byte
    pub fn to_u8(self) -> u8 {
        match self {
            Encoding::DsssCck => Self::RAW_DSSS_CCK,
            Encoding::Ofdm => Self::RAW_OFDM,
            Encoding::Ht => Self::RAW_HT,
            Encoding::Other(raw) => raw,
        }
    }

    /// Canonical form: `Other` carrying a known raw value becomes the named
    /// variant
    pub fn normalized(self) -> Self {
        Self::from_u8(self.to_u8())
    }

    /// Get encoding name
    pub fn name(&self) -> &'static str {
        match self.normalized() {
            Encoding::DsssCck => "DSSS/CCK",
            Encoding::Ofdm => "OFDM",
            Encoding::Ht => "HT",
            Encoding::Other(Self::RAW_VHT) => "VHT",
            Encoding::Other(_) => "other",
        }
    }
}

impl From<u8> for Encoding {
    fn from(value: u8) -> Self {
        Encoding::from_u8(value)
    }
}

impl From<Encoding> for u8 {
    fn from(value: Encoding) -> Self {
        value.to_u8()
    }
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding::Other(Self::RAW_UNKNOWN)
    }
}

/// Per-frame receive status handed to the hook by the receive pipeline
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiveStatus {
    /// Device clock value at reception (MAC time, microseconds)
    pub timestamp: u64,
    /// Channel the frame was received on
    pub channel_spec: ChannelSpec,
    /// Modulation family
    pub encoding: Encoding,
    /// HT flags, see [`ht_flags`]. Only meaningful for [`Encoding::Ht`]
    pub ht_flags: u8,
    /// HT MCS index. Only meaningful for [`Encoding::Ht`]
    pub mcs_index: u8,
    /// PHY data rate as reported by hardware (500 kbps units)
    pub data_rate: u8,
    /// Signal power in dBm
    pub signal_power: i8,
    /// Noise power in dBm
    pub noise_power: i8,
}

impl ReceiveStatus {
    /// STBC stream count carried in the HT flags
    pub fn stbc_streams(&self) -> u8 {
        (self.ht_flags & ht_flags::STBC_MASK) >> ht_flags::STBC_SHIFT
    }
}
