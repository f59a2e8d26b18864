//! Fixed-layout packet buffers shared with the radio driver.
//!
//! The outbound packet body is fixed-size telemetry:
//!
//! ```text
//! Body:  | MARKER | SEQ    | RESERVED | SENSOR | RESERVED |
//!        | 1 byte | 1 byte | 2 bytes  | 1 byte | 3 bytes  |
//! ```
//!
//! `SEQ` is a one-byte counter that wraps modulo 256. It is bumped only
//! after a confirmed successful transmission, so a receiver can detect
//! loss or duplication.

/// Length of the outbound telemetry body.
pub const TX_BODY_LEN: usize = 8;

/// Largest inbound payload the drain loop will accept.
pub const RX_MAX_LEN: usize = 32;

const SEQ_OFFSET: usize = 1;

/// Outbound packet: destination pipe, ack-required flag and a fixed-size
/// telemetry body.
///
/// Exactly one instance exists for the lifetime of the device; the session
/// owns it and is the only writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxPacket {
    pipe: u8,
    ack: bool,
    body: [u8; TX_BODY_LEN],
}

impl TxPacket {
    pub fn new(pipe: u8, body: [u8; TX_BODY_LEN]) -> Self {
        Self {
            pipe,
            ack: false,
            body,
        }
    }

    pub fn pipe(&self) -> u8 {
        self.pipe
    }

    pub fn ack(&self) -> bool {
        self.ack
    }

    pub(crate) fn set_ack(&mut self, ack: bool) {
        self.ack = ack;
    }

    pub fn body(&self) -> &[u8; TX_BODY_LEN] {
        &self.body
    }

    pub fn sequence(&self) -> u8 {
        self.body[SEQ_OFFSET]
    }

    /// Advance the sequence counter by exactly one, wrapping at 256.
    ///
    /// Called only after the driver confirmed a successful transmission.
    pub(crate) fn advance_sequence(&mut self) {
        self.body[SEQ_OFFSET] = self.body[SEQ_OFFSET].wrapping_add(1);
    }
}

impl Default for TxPacket {
    /// The telemetry seed frame on pipe 0: marker byte, sequence zero, a
    /// sensor identification byte at offset 4.
    fn default() -> Self {
        Self::new(0, [0x01, 0x00, 0x00, 0x00, 0x11, 0x00, 0x00, 0x00])
    }
}

/// Inbound packet buffer. Read once during the drain loop, then discarded.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxPacket {
    len: u8,
    data: [u8; RX_MAX_LEN],
}

impl RxPacket {
    /// Creates a packet from the bytes the driver drained. Payloads longer
    /// than [`RX_MAX_LEN`] are truncated.
    pub fn from_slice(payload: &[u8]) -> Self {
        let len = payload.len().min(RX_MAX_LEN);
        let mut data = [0; RX_MAX_LEN];
        data[..len].copy_from_slice(&payload[..len]);
        Self {
            len: len as u8,
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_starts_at_zero() {
        assert_eq!(TxPacket::default().sequence(), 0);
    }

    #[test]
    fn sequence_advances_by_one() {
        let mut p = TxPacket::default();
        p.advance_sequence();
        p.advance_sequence();
        assert_eq!(p.sequence(), 2);
    }

    #[test]
    fn sequence_wraps_at_256() {
        let mut p = TxPacket::new(0, [0, 255, 0, 0, 0, 0, 0, 0]);
        p.advance_sequence();
        assert_eq!(p.sequence(), 0);
    }

    #[test]
    fn advancing_only_touches_the_counter() {
        let mut p = TxPacket::default();
        let before = *p.body();
        p.advance_sequence();
        let after = *p.body();
        for i in 0..TX_BODY_LEN {
            if i == SEQ_OFFSET {
                assert_eq!(after[i], before[i].wrapping_add(1));
            } else {
                assert_eq!(after[i], before[i]);
            }
        }
    }

    #[test]
    fn rx_packet_truncates_oversized_payloads() {
        let long = [0xAB; RX_MAX_LEN + 4];
        let p = RxPacket::from_slice(&long);
        assert_eq!(p.len(), RX_MAX_LEN);
        assert_eq!(p.payload(), &long[..RX_MAX_LEN]);
    }

    #[test]
    fn rx_packet_reports_empty() {
        assert!(RxPacket::from_slice(&[]).is_empty());
        assert!(!RxPacket::from_slice(&[1]).is_empty());
    }
}
