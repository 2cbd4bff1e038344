//! Channel number to frequency resolution

use crate::status::Band;

/// Maps a (band, channel number) pair to a centre frequency in MHz
///
/// Implementations must be pure and total: unknown channels resolve to 0
/// rather than failing. Any `Fn(Band, u8) -> u16` closure is a resolver.
pub trait FrequencyResolver {
    fn resolve(&self, band: Band, channel: u8) -> u16;
}

impl<F> FrequencyResolver for F
where
    F: Fn(Band, u8) -> u16,
{
    fn resolve(&self, band: Band, channel: u8) -> u16 {
        self(band, channel)
    }
}

/// Static IEEE 802.11 channel plan for the 2.4 and 5 GHz bands
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelTable;

impl ChannelTable {
    /// Convert a 2.4 GHz channel to frequency
    pub fn channel_to_frequency_2ghz(channel: u8) -> u16 {
        match channel {
            1..=13 => 2407 + channel as u16 * 5,
            14 => 2484,
            _ => 0,
        }
    }

    /// Convert a 5 GHz channel to frequency
    pub fn channel_to_frequency_5ghz(channel: u8) -> u16 {
        match channel {
            0 => 0,
            _ => 5000 + channel as u16 * 5,
        }
    }
}

impl FrequencyResolver for ChannelTable {
    fn resolve(&self, band: Band, channel: u8) -> u16 {
        match band {
            Band::TwoGhz => Self::channel_to_frequency_2ghz(channel),
            Band::FiveGhz => Self::channel_to_frequency_5ghz(channel),
            // Fall back to the channel number alone
            Band::Reserved(_) => match channel {
                1..=14 => Self::channel_to_frequency_2ghz(channel),
                _ => Self::channel_to_frequency_5ghz(channel),
            },
        }
    }
}
