use embassy_time::Duration;

use crate::addresses::Addresses;

const RETRANSMIT_DELAY_US: u64 = 600;
const SEND_INTERVAL_US: u64 = 7000;

/// ESB protocol variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Protocol {
    /// Fixed payload length, nRF24L01 compatible.
    Esb,
    /// Dynamic payload length.
    EsbDpl,
}

/// On-air bitrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bitrate {
    B1Mbps,
    B2Mbps,
}

/// Operating role of the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    /// Primary transmitter.
    Ptx,
    /// Primary receiver.
    Prx,
}

/// ESB session configuration.
///
/// Handed to [`crate::driver::RadioDriver::init`] on every entry into ESB
/// mode. Defaults mirror the telemetry-sender profile: dynamic payloads at
/// 2 Mbps, transmitter role, every packet acknowledged, a new packet every
/// 7 ms.
#[derive(Clone)]
pub struct SessionConfig {
    /// Protocol variant.
    pub protocol: Protocol,
    /// On-air bitrate.
    pub bitrate: Bitrate,
    /// Delay between hardware retransmissions while waiting for an ack.
    pub retransmit_delay: Duration,
    /// Operating role.
    pub role: Role,
    /// When `true`, peers may mark individual packets as not requiring an
    /// acknowledgement. The telemetry profile acknowledges everything.
    pub selective_auto_ack: bool,
    /// Interval between `transmit_once` calls while in ESB mode. This is
    /// the mode's whole idle strategy, so it also paces the control loop.
    pub send_interval: Duration,
    /// Pipe addressing.
    pub addresses: Addresses,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::EsbDpl,
            bitrate: Bitrate::B2Mbps,
            retransmit_delay: Duration::from_micros(RETRANSMIT_DELAY_US),
            role: Role::Ptx,
            selective_auto_ack: false,
            send_interval: Duration::from_micros(SEND_INTERVAL_US),
            addresses: Addresses::default(),
        }
    }
}
