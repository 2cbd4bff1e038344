//! Radiotap capture header generation and parsing
//!
//! The header produced here has a fixed field set and a fixed size: every
//! field the presence mask advertises is always physically present, and
//! fields that do not apply to a frame are left zero. Layout, all multi-byte
//! fields little-endian:
//!
//! ```text
//!  0  version (0)          1  pad
//!  2  length (u16)         4  present (u32)
//!  8  TSFT (u64)          16  flags         17  rate
//! 18  channel freq (u16)  20  channel flags (u16)
//! 22  dBm antsignal       23  dBm antnoise
//! 24  MCS known/flags/index
//! 27  pad (vendor namespace is 2-byte aligned)
//! 28  vendor OUI "NEX"    31  sub namespace  32  skip length (u16)
//! 34  vendor payload (PLCP_LEN bytes, reserved, zero)
//! ```

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::status::{ht_flags, Encoding, ReceiveStatus};
use crate::{Result, RxTapError};

/// Radiotap header present flags
pub mod present_flags {
    pub const TSFT: u32 = 1 << 0;
    pub const FLAGS: u32 = 1 << 1;
    pub const RATE: u32 = 1 << 2;
    pub const CHANNEL: u32 = 1 << 3;
    pub const DBM_ANTSIGNAL: u32 = 1 << 5;
    pub const DBM_ANTNOISE: u32 = 1 << 6;
    pub const MCS: u32 = 1 << 19;
    pub const VENDOR_NAMESPACE: u32 = 1 << 30;

    /// The field set every capture header advertises
    pub const CAPTURE: u32 = TSFT
        | FLAGS
        | RATE
        | CHANNEL
        | DBM_ANTSIGNAL
        | DBM_ANTNOISE
        | MCS
        | VENDOR_NAMESPACE;
}

/// Radiotap flags field
pub mod header_flags {
    pub const FCS: u8 = 0x10;
}

/// Channel flags
pub mod channel_flags {
    pub const CCK: u16 = 0x0020;
    pub const OFDM: u16 = 0x0040;
    pub const SPECTRUM_2GHZ: u16 = 0x0080;
    pub const SPECTRUM_5GHZ: u16 = 0x0100;
}

/// MCS "known" bits
pub mod mcs_known {
    pub const BW: u8 = 0x01;
    pub const MCS: u8 = 0x02;
    pub const GI: u8 = 0x04;
    pub const FMT: u8 = 0x08;
    pub const FEC: u8 = 0x10;
    pub const STBC: u8 = 0x20;

    pub const ALL: u8 = BW | MCS | GI | FMT | FEC | STBC;
}

/// MCS flags bits
pub mod mcs_flags {
    pub const BW_MASK: u8 = 0x03;
    pub const BW_20: u8 = 0;
    pub const BW_40: u8 = 1;
    pub const BW_20L: u8 = 2;
    pub const BW_20U: u8 = 3;
    pub const SGI: u8 = 0x04;
    pub const FMT_GF: u8 = 0x08;
    pub const FEC_LDPC: u8 = 0x10;
    pub const STBC_MASK: u8 = 0x60;
    pub const STBC_SHIFT: u8 = 5;
}

pub const RADIOTAP_VERSION: u8 = 0;

/// Vendor namespace OUI marking headers produced by this hook
pub const VENDOR_OUI: [u8; 3] = *b"NEX";

pub const VENDOR_SUB_NAMESPACE: u8 = 0;

/// PLCP length in bytes, the size of the reserved vendor payload
pub const PLCP_LEN: usize = 6;

/// Size of the header up to the end of the vendor namespace descriptor
pub const FIXED_LEN: usize = 34;

/// Total header size, vendor payload included
pub const HEADER_LEN: usize = FIXED_LEN + PLCP_LEN;

/// Frequencies strictly above this are flagged as 5 GHz
pub const SPECTRUM_5GHZ_THRESHOLD_MHZ: u16 = 3000;

const TSF_LOW_MASK: u64 = 0xffff_ffff;

/// How the HT flags of a status record are mapped onto radiotap MCS flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HtFlagsPolicy {
    /// Match the whole HT flags byte against each single-property value and
    /// apply at most one. Bit-exact with the reference firmware hook, which
    /// drops every combination of properties (e.g. 40 MHz with short GI).
    SingleDispatch,
    /// Test each property on its own. Bandwidth is a 2-bit field, so 40 MHz
    /// takes precedence over 20L, which takes precedence over 20U.
    Independent,
}

impl HtFlagsPolicy {
    /// Translate HT status flags into the radiotap MCS flags byte
    pub fn mcs_flags(self, ht: u8) -> u8 {
        match self {
            HtFlagsPolicy::SingleDispatch => match ht {
                ht_flags::BW_40 => mcs_flags::BW_40,
                ht_flags::BW_20L => mcs_flags::BW_20L,
                ht_flags::BW_20U => mcs_flags::BW_20U,
                ht_flags::SGI => mcs_flags::SGI,
                ht_flags::STBC_MASK => {
                    ((ht & ht_flags::STBC_MASK) >> ht_flags::STBC_SHIFT) << mcs_flags::STBC_SHIFT
                }
                ht_flags::LDPC => mcs_flags::FEC_LDPC,
                _ => 0,
            },
            HtFlagsPolicy::Independent => {
                let mut flags = if ht & ht_flags::BW_40 != 0 {
                    mcs_flags::BW_40
                } else if ht & ht_flags::BW_20L != 0 {
                    mcs_flags::BW_20L
                } else if ht & ht_flags::BW_20U != 0 {
                    mcs_flags::BW_20U
                } else {
                    mcs_flags::BW_20
                };

                if ht & ht_flags::SGI != 0 {
                    flags |= mcs_flags::SGI;
                }
                flags |= ((ht & ht_flags::STBC_MASK) >> ht_flags::STBC_SHIFT)
                    << mcs_flags::STBC_SHIFT;
                if ht & ht_flags::LDPC != 0 {
                    flags |= mcs_flags::FEC_LDPC;
                }
                flags
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HtFlagsPolicy::SingleDispatch => "single-dispatch",
            HtFlagsPolicy::Independent => "independent",
        }
    }
}

impl Default for HtFlagsPolicy {
    fn default() -> Self {
        HtFlagsPolicy::Independent
    }
}

/// Radiotap MCS field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct McsInfo {
    pub known: u8,
    pub flags: u8,
    pub index: u8,
}

impl McsInfo {
    pub fn is_zero(&self) -> bool {
        self.known == 0 && self.flags == 0 && self.index == 0
    }

    /// Bandwidth subfield of the flags
    pub fn bandwidth(&self) -> u8 {
        self.flags & mcs_flags::BW_MASK
    }

    pub fn short_gi(&self) -> bool {
        self.flags & mcs_flags::SGI != 0
    }

    pub fn stbc_streams(&self) -> u8 {
        (self.flags & mcs_flags::STBC_MASK) >> mcs_flags::STBC_SHIFT
    }

    pub fn ldpc(&self) -> bool {
        self.flags & mcs_flags::FEC_LDPC != 0
    }
}

/// Fixed-layout capture header prepended to every forwarded frame
///
/// Only the per-frame fields are stored; version, length, presence mask and
/// the vendor namespace descriptor are constants written by [`encode`].
///
/// [`encode`]: CaptureHeader::encode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaptureHeader {
    /// TSF timer, low 32 bits of the device timestamp
    pub tsf: u64,
    pub flags: u8,
    pub data_rate: u8,
    /// Channel frequency in MHz
    pub channel_freq: u16,
    pub channel_flags: u16,
    /// Antenna signal in dBm
    pub antenna_signal: i8,
    /// Antenna noise in dBm
    pub antenna_noise: i8,
    pub mcs: McsInfo,
}

impl CaptureHeader {
    /// Derive every header field from a receive status record and the
    /// frequency resolved for its channel
    pub fn from_status(status: &ReceiveStatus, channel_freq: u16, policy: HtFlagsPolicy) -> Self {
        let mcs = if status.encoding.normalized() == Encoding::Ht {
            McsInfo {
                known: mcs_known::ALL,
                flags: policy.mcs_flags(status.ht_flags),
                index: status.mcs_index,
            }
        } else {
            McsInfo::default()
        };

        Self {
            tsf: status.timestamp & TSF_LOW_MASK,
            flags: header_flags::FCS,
            data_rate: status.data_rate,
            channel_freq,
            channel_flags: band_flags(channel_freq) | modulation_flags(status.encoding),
            antenna_signal: status.signal_power,
            antenna_noise: status.noise_power,
            mcs,
        }
    }

    /// Serialize the header. The output always has exactly [`HEADER_LEN`]
    /// bytes; the alignment pad and vendor payload are zero.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        let mut buf = &mut out[..];

        buf.put_u8(RADIOTAP_VERSION);
        buf.put_u8(0);
        buf.put_u16_le(HEADER_LEN as u16);
        buf.put_u32_le(present_flags::CAPTURE);

        buf.put_u64_le(self.tsf);
        buf.put_u8(self.flags);
        buf.put_u8(self.data_rate);
        buf.put_u16_le(self.channel_freq);
        buf.put_u16_le(self.channel_flags);
        buf.put_i8(self.antenna_signal);
        buf.put_i8(self.antenna_noise);
        buf.put_u8(self.mcs.known);
        buf.put_u8(self.mcs.flags);
        buf.put_u8(self.mcs.index);

        buf.put_u8(0);
        buf.put_slice(&VENDOR_OUI);
        buf.put_u8(VENDOR_SUB_NAMESPACE);
        buf.put_u16_le(PLCP_LEN as u16);

        out
    }

    /// Parse a capture header from the start of `data`
    ///
    /// Only headers with this hook's exact layout are accepted: version 0,
    /// the fixed length, the fixed presence mask and the `NEX` vendor OUI.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(RxTapError::Decode(format!(
                "capture header too short: {} bytes (need {})",
                data.len(),
                HEADER_LEN
            )));
        }

        let mut buf = &data[..HEADER_LEN];

        let version = buf.get_u8();
        if version != RADIOTAP_VERSION {
            return Err(RxTapError::Decode(format!("unsupported radiotap version {}", version)));
        }
        let _pad = buf.get_u8();

        let length = buf.get_u16_le() as usize;
        if length != HEADER_LEN {
            return Err(RxTapError::Decode(format!(
                "unexpected header length {} (expected {})",
                length, HEADER_LEN
            )));
        }

        let present = buf.get_u32_le();
        if present != present_flags::CAPTURE {
            return Err(RxTapError::Decode(format!(
                "unexpected present mask {:#010x}",
                present
            )));
        }

        let tsf = buf.get_u64_le();
        let flags = buf.get_u8();
        let data_rate = buf.get_u8();
        let channel_freq = buf.get_u16_le();
        let channel_flags = buf.get_u16_le();
        let antenna_signal = buf.get_i8();
        let antenna_noise = buf.get_i8();
        let mcs = McsInfo {
            known: buf.get_u8(),
            flags: buf.get_u8(),
            index: buf.get_u8(),
        };

        let _align = buf.get_u8();
        let oui = [buf.get_u8(), buf.get_u8(), buf.get_u8()];
        if oui != VENDOR_OUI {
            return Err(RxTapError::Decode(format!(
                "unknown vendor OUI {:02x}:{:02x}:{:02x}",
                oui[0], oui[1], oui[2]
            )));
        }
        let _sub_namespace = buf.get_u8();
        let skip_length = buf.get_u16_le() as usize;
        if skip_length != PLCP_LEN {
            return Err(RxTapError::Decode(format!(
                "unexpected vendor skip length {}",
                skip_length
            )));
        }

        Ok(Self {
            tsf,
            flags,
            data_rate,
            channel_freq,
            channel_flags,
            antenna_signal,
            antenna_noise,
            mcs,
        })
    }

    pub fn is_5ghz(&self) -> bool {
        self.channel_flags & channel_flags::SPECTRUM_5GHZ != 0
    }

    pub fn is_2ghz(&self) -> bool {
        self.channel_flags & channel_flags::SPECTRUM_2GHZ != 0
    }

    pub fn fcs_included(&self) -> bool {
        self.flags & header_flags::FCS != 0
    }
}

impl fmt::Display for CaptureHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let band = if self.is_5ghz() { "5GHz" } else { "2.4GHz" };
        let modulation = if self.channel_flags & channel_flags::OFDM != 0 {
            "OFDM"
        } else if self.channel_flags & channel_flags::CCK != 0 {
            "CCK"
        } else if !self.mcs.is_zero() {
            "HT"
        } else {
            "-"
        };
        write!(
            f,
            "tsf={} {} MHz ({}, {}) rate={} signal={} dBm noise={} dBm",
            self.tsf,
            self.channel_freq,
            band,
            modulation,
            self.data_rate,
            self.antenna_signal,
            self.antenna_noise
        )?;
        if !self.mcs.is_zero() {
            write!(
                f,
                " mcs={} bw={} sgi={} stbc={} ldpc={}",
                self.mcs.index,
                self.mcs.bandwidth(),
                self.mcs.short_gi(),
                self.mcs.stbc_streams(),
                self.mcs.ldpc()
            )?;
        }
        Ok(())
    }
}

/// Spectrum bit for a frequency: 5 GHz strictly above 3000 MHz, else 2 GHz
pub fn band_flags(channel_freq: u16) -> u16 {
    if channel_freq > SPECTRUM_5GHZ_THRESHOLD_MHZ {
        channel_flags::SPECTRUM_5GHZ
    } else {
        channel_flags::SPECTRUM_2GHZ
    }
}

/// Modulation bit for an encoding. HT is conveyed through the MCS field only.
pub fn modulation_flags(encoding: Encoding) -> u16 {
    match encoding.normalized() {
        Encoding::Ofdm => channel_flags::OFDM,
        Encoding::DsssCck => channel_flags::CCK,
        Encoding::Ht | Encoding::Other(_) => 0,
    }
}

/// Split a forwarded frame into its capture header and the original bytes
pub fn split_output(data: &[u8]) -> Result<(CaptureHeader, &[u8])> {
    let header = CaptureHeader::decode(data)?;
    Ok((header, &data[HEADER_LEN..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::ChannelSpec;

    fn ofdm_status() -> ReceiveStatus {
        ReceiveStatus {
            timestamp: 1000,
            channel_spec: ChannelSpec(0x1006),
            encoding: Encoding::Ofdm,
            data_rate: 12,
            signal_power: -40,
            noise_power: -95,
            ..Default::default()
        }
    }

    #[test]
    fn test_present_mask() {
        assert_eq!(present_flags::CAPTURE, 0x4008_006f);
    }

    #[test]
    fn test_encode_layout() {
        let header = CaptureHeader::from_status(&ofdm_status(), 2437, HtFlagsPolicy::default());
        let bytes = header.encode();

        assert_eq!(bytes.len(), 40);
        assert_eq!(&bytes[0..4], &[0x00, 0x00, 40, 0x00]);
        assert_eq!(&bytes[4..8], &[0x6f, 0x00, 0x08, 0x40]);
        assert_eq!(&bytes[8..16], &1000u64.to_le_bytes());
        assert_eq!(bytes[16], header_flags::FCS);
        assert_eq!(bytes[17], 12);
        assert_eq!(&bytes[18..20], &2437u16.to_le_bytes());
        assert_eq!(
            &bytes[20..22],
            &(channel_flags::SPECTRUM_2GHZ | channel_flags::OFDM).to_le_bytes()
        );
        assert_eq!(bytes[22] as i8, -40);
        assert_eq!(bytes[23] as i8, -95);
        assert_eq!(&bytes[24..28], &[0, 0, 0, 0]);
        assert_eq!(&bytes[28..31], b"NEX");
        assert_eq!(bytes[31], 0);
        assert_eq!(&bytes[32..34], &[6, 0]);
        assert!(bytes[34..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_tsf_keeps_low_word_only() {
        let status = ReceiveStatus {
            timestamp: 0x1234_5678_9abc_def0,
            ..ofdm_status()
        };
        let header = CaptureHeader::from_status(&status, 2437, HtFlagsPolicy::default());
        assert_eq!(header.tsf, 0x9abc_def0);

        let bytes = header.encode();
        assert_eq!(&bytes[12..16], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_band_threshold() {
        assert_eq!(band_flags(3000), channel_flags::SPECTRUM_2GHZ);
        assert_eq!(band_flags(3001), channel_flags::SPECTRUM_5GHZ);
        assert_eq!(band_flags(0), channel_flags::SPECTRUM_2GHZ);
        assert_eq!(band_flags(5180), channel_flags::SPECTRUM_5GHZ);
    }

    #[test]
    fn test_modulation_flags() {
        assert_eq!(modulation_flags(Encoding::Ofdm), channel_flags::OFDM);
        assert_eq!(modulation_flags(Encoding::DsssCck), channel_flags::CCK);
        assert_eq!(modulation_flags(Encoding::Ht), 0);
        assert_eq!(modulation_flags(Encoding::Other(4)), 0);
        assert_eq!(modulation_flags(Encoding::Other(0xff)), 0);
        assert_eq!(
            modulation_flags(Encoding::Other(Encoding::RAW_OFDM)),
            channel_flags::OFDM
        );
        assert_eq!(
            modulation_flags(Encoding::Other(Encoding::RAW_DSSS_CCK)),
            channel_flags::CCK
        );
    }

    #[test]
    fn test_raw_encoding_survives_serde() {
        let status = ReceiveStatus {
            encoding: Encoding::Other(Encoding::RAW_OFDM),
            ..ofdm_status()
        };
        let json = serde_json::to_string(&status).unwrap();
        let parsed: ReceiveStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.encoding, Encoding::Ofdm);

        let before = CaptureHeader::from_status(&status, 2437, HtFlagsPolicy::default());
        let after = CaptureHeader::from_status(&parsed, 2437, HtFlagsPolicy::default());
        assert_eq!(before, after);
        assert_eq!(
            before.channel_flags,
            channel_flags::SPECTRUM_2GHZ | channel_flags::OFDM
        );

        let ht = ReceiveStatus {
            encoding: Encoding::Other(Encoding::RAW_HT),
            mcs_index: 5,
            ..ofdm_status()
        };
        let header = CaptureHeader::from_status(&ht, 5180, HtFlagsPolicy::default());
        assert_eq!(header.mcs.known, mcs_known::ALL);
        assert_eq!(header.mcs.index, 5);
    }

    #[test]
    fn test_mcs_only_for_ht() {
        let status = ReceiveStatus {
            ht_flags: ht_flags::SGI,
            mcs_index: 7,
            ..ofdm_status()
        };
        let header = CaptureHeader::from_status(&status, 2437, HtFlagsPolicy::default());
        assert!(header.mcs.is_zero());

        let status = ReceiveStatus {
            encoding: Encoding::Ht,
            ..status
        };
        let header = CaptureHeader::from_status(&status, 2437, HtFlagsPolicy::default());
        assert_eq!(header.mcs.known, mcs_known::ALL);
        assert_eq!(header.mcs.flags, mcs_flags::SGI);
        assert_eq!(header.mcs.index, 7);
        assert_eq!(header.channel_flags, channel_flags::SPECTRUM_2GHZ);
    }

    #[test]
    fn test_single_dispatch_policy() {
        let policy = HtFlagsPolicy::SingleDispatch;
        assert_eq!(policy.mcs_flags(ht_flags::BW_40), mcs_flags::BW_40);
        assert_eq!(policy.mcs_flags(ht_flags::BW_20L), mcs_flags::BW_20L);
        assert_eq!(policy.mcs_flags(ht_flags::BW_20U), mcs_flags::BW_20U);
        assert_eq!(policy.mcs_flags(ht_flags::SGI), mcs_flags::SGI);
        assert_eq!(policy.mcs_flags(ht_flags::STBC_MASK), 0x60);
        assert_eq!(policy.mcs_flags(ht_flags::LDPC), mcs_flags::FEC_LDPC);

        // combinations match none of the single values
        assert_eq!(policy.mcs_flags(ht_flags::BW_40 | ht_flags::SGI), 0);
        // a single STBC stream is not the full mask value
        assert_eq!(policy.mcs_flags(1 << ht_flags::STBC_SHIFT), 0);
        assert_eq!(policy.mcs_flags(0), 0);
    }

    #[test]
    fn test_independent_policy() {
        let policy = HtFlagsPolicy::Independent;
        assert_eq!(
            policy.mcs_flags(ht_flags::BW_40 | ht_flags::SGI | ht_flags::LDPC),
            mcs_flags::BW_40 | mcs_flags::SGI | mcs_flags::FEC_LDPC
        );
        assert_eq!(
            policy.mcs_flags(ht_flags::BW_20U | (1 << ht_flags::STBC_SHIFT)),
            mcs_flags::BW_20U | (1 << mcs_flags::STBC_SHIFT)
        );
        assert_eq!(policy.mcs_flags(ht_flags::BW_40 | ht_flags::BW_20L), mcs_flags::BW_40);
        assert_eq!(policy.mcs_flags(ht_flags::BW_20L | ht_flags::BW_20U), mcs_flags::BW_20L);
        assert_eq!(policy.mcs_flags(0), mcs_flags::BW_20);
    }

    #[test]
    fn test_policies_agree_on_single_properties() {
        for ht in [ht_flags::BW_40, ht_flags::BW_20L, ht_flags::BW_20U, ht_flags::SGI, ht_flags::STBC_MASK, ht_flags::LDPC] {
            assert_eq!(
                HtFlagsPolicy::SingleDispatch.mcs_flags(ht),
                HtFlagsPolicy::Independent.mcs_flags(ht),
                "ht flags {:#04x}",
                ht
            );
        }
    }

    #[test]
    fn test_decode_encoded_header() {
        let status = ReceiveStatus {
            timestamp: 77,
            channel_spec: ChannelSpec(0xd024),
            encoding: Encoding::Ht,
            ht_flags: ht_flags::BW_40,
            mcs_index: 15,
            data_rate: 0,
            signal_power: -61,
            noise_power: -92,
        };
        let header = CaptureHeader::from_status(&status, 5180, HtFlagsPolicy::SingleDispatch);
        let decoded = CaptureHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded, header);
        assert!(decoded.is_5ghz());
        assert!(!decoded.is_2ghz());
        assert!(decoded.fcs_included());
    }

    #[test]
    fn test_decode_rejects_foreign_headers() {
        let header = CaptureHeader::from_status(&ofdm_status(), 2437, HtFlagsPolicy::default());

        assert!(CaptureHeader::decode(&header.encode()[..39]).is_err());

        let mut bytes = header.encode();
        bytes[0] = 1;
        assert!(CaptureHeader::decode(&bytes).is_err());

        let mut bytes = header.encode();
        bytes[4] = 0;
        assert!(CaptureHeader::decode(&bytes).is_err());

        let mut bytes = header.encode();
        bytes[28] = b'X';
        assert!(CaptureHeader::decode(&bytes).is_err());
    }

    #[test]
    fn test_split_output() {
        let header = CaptureHeader::from_status(&ofdm_status(), 2437, HtFlagsPolicy::default());
        let mut frame = header.encode().to_vec();
        frame.extend_from_slice(b"payload");

        let (decoded, payload) = split_output(&frame).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(payload, b"payload");
    }

    #[test]
    fn test_display() {
        let header = CaptureHeader::from_status(&ofdm_status(), 2437, HtFlagsPolicy::default());
        assert_eq!(
            header.to_string(),
            "tsf=1000 2437 MHz (2.4GHz, OFDM) rate=12 signal=-40 dBm noise=-95 dBm"
        );
    }
}
