//! Wire format constants and the Many header.
//!
//! A frame on the wire (before escaping):
//! ```text
//! ┌────────┬─────┬──────────┬─────┬─────────────┬──────────┐
//! │ Marker │ Seq │ Cmd/Ret  │ Len │ Payload     │ Checksum │
//! │ SOF/SOS│ 1 B │ 1 byte   │ 1 B │ 0..=255 B   │ 1 byte   │
//! └────────┴─────┴──────────┴─────┴─────────────┴──────────┘
//! ```
//!
//! The marker is written raw; every other byte goes through the escape codec.

/// Start of a host-initiated frame and of every reply.
pub const SOF: u8 = 0x12;

/// Start of a server-initiated frame.
pub const SOS: u8 = 0x14;

/// Escape prefix. The escaped byte follows, decremented by one.
pub const ESC: u8 = 0x7D;

/// Additive constant applied to the command/return byte in the checksum.
pub const CRC_CMD: u8 = 11;

/// Additive constant applied to the length byte in the checksum.
pub const CRC_LEN: u8 = 97;

/// Maximum payload of a single frame.
pub const MAX_PAYLOAD: usize = 255;

/// Size of the Many header at the start of a Many payload.
pub const MANY_HEADER_SIZE: usize = 6;

/// Maximum chunk carried by one Many frame.
pub const MANY_PAYLOAD: usize = MAX_PAYLOAD - MANY_HEADER_SIZE;

/// Reserved return codes.
pub mod codes {
    /// Success.
    pub const OK: u8 = 0x00;
    /// Out of bounds of the command table.
    pub const OOB: u8 = 0xF0;
    /// Timeout (or framing error) while waiting for a byte.
    pub const TIMEOUT: u8 = 0xF2;
    /// Checksum error.
    pub const CHECKSUM: u8 = 0xF3;
    /// Generic handler failure, e.g. destination space exhausted.
    pub const FAILURE: u8 = 0xFF;

    /// Check if `code` is one of the error-frame codes.
    #[inline]
    pub fn is_error_frame(code: u8) -> bool {
        matches!(code, OOB | TIMEOUT | CHECKSUM)
    }
}

/// Many header flag bits.
pub mod many_flags {
    /// Final chunk of the logical object.
    pub const IS_LAST: u8 = 0b0000_0001;
    /// Chunk carries data from host to device.
    pub const IS_WRITE: u8 = 0b0000_0010;
}

/// Check if `byte` must be escaped on the wire.
#[inline]
pub fn is_reserved(byte: u8) -> bool {
    byte == SOF || byte == SOS || byte == ESC
}

/// Header prefixed to the payload of a Many frame.
///
/// ```text
/// ┌──────────┬───────┬───────────────┐
/// │ Function │ Flags │ Offset        │
/// │ 1 byte   │ 1 byte│ u32 LE        │
/// └──────────┴───────┴───────────────┘
/// ```
///
/// In a reply the function byte carries the chunked handler's return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ManyHeader {
    /// Command table offset of the chunked handler (return value in replies).
    pub function: u8,
    /// Flags byte (see [`many_flags`]).
    pub flags: u8,
    /// Absolute offset of the chunk inside the logical object.
    pub offset: u32,
}

impl ManyHeader {
    /// Create a new header.
    pub fn new(function: u8, offset: u32, is_last: bool, is_write: bool) -> Self {
        let mut flags = 0;
        if is_last {
            flags |= many_flags::IS_LAST;
        }
        if is_write {
            flags |= many_flags::IS_WRITE;
        }
        Self {
            function,
            flags,
            offset,
        }
    }

    /// Encode header to bytes.
    ///
    /// # Example
    ///
    /// ```
    /// use arduino2j::protocol::ManyHeader;
    ///
    /// let header = ManyHeader::new(4, 249, true, false);
    /// assert_eq!(header.encode(), [4, 0x01, 249, 0, 0, 0]);
    /// ```
    pub fn encode(&self) -> [u8; MANY_HEADER_SIZE] {
        let mut buf = [0u8; MANY_HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `MANY_HEADER_SIZE`.
    pub fn encode_into(&self, buf: &mut [u8]) {
        buf[0] = self.function;
        buf[1] = self.flags;
        buf[2..6].copy_from_slice(&self.offset.to_le_bytes());
    }

    /// Decode header from bytes. Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < MANY_HEADER_SIZE {
            return None;
        }
        Some(Self {
            function: buf[0],
            flags: buf[1],
            offset: u32::from_le_bytes([buf[2], buf[3], buf[4], buf[5]]),
        })
    }

    #[inline]
    pub fn is_last(&self) -> bool {
        self.flags & many_flags::IS_LAST != 0
    }

    #[inline]
    pub fn is_write(&self) -> bool {
        self.flags & many_flags::IS_WRITE != 0
    }
}
