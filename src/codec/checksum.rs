//! Running XOR checksum over the logical frame fields.
//!
//! ```text
//! checksum = seq ^ (code + CRC_CMD) ^ (len + CRC_LEN) ^ payload[0] ^ ... ^ payload[n-1]
//! ```
//!
//! Sums wrap at one byte. The additive constants make an all-zero code or
//! length field contribute a non-zero term.

use crate::protocol::{CRC_CMD, CRC_LEN};

/// Running checksum of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checksum(u8);

impl Checksum {
    /// Start a checksum from the frame's header fields.
    #[inline]
    pub fn new(seq: u8, code: u8, len: u8) -> Self {
        Self(seq ^ code.wrapping_add(CRC_CMD) ^ len.wrapping_add(CRC_LEN))
    }

    /// Fold one payload byte into the checksum.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        self.0 ^= byte;
    }

    /// Fold a run of payload bytes into the checksum.
    pub fn extend(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.push(b);
        }
    }

    #[inline]
    pub fn value(self) -> u8 {
        self.0
    }
}

/// Checksum of a complete frame.
///
/// # Panics
///
/// Panics if `payload` is longer than 255 bytes.
pub fn frame_checksum(seq: u8, code: u8, payload: &[u8]) -> u8 {
    let len = u8::try_from(payload.len()).expect("payload fits in one frame");
    let mut checksum = Checksum::new(seq, code, len);
    checksum.extend(payload);
    checksum.value()
}
