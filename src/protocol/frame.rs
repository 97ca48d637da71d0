//! Frame struct and wire encoding.
//!
//! Represents one complete logical frame. [`Frame::encode`] produces the exact
//! wire bytes: raw marker, escaped fields, escaped checksum.
//!
//! # Example
//!
//! ```
//! use arduino2j::protocol::{Frame, SOF};
//!
//! let frame = Frame::request(3, 4, &[0xAA, 0xBB]);
//! let wire = frame.encode();
//! assert_eq!(wire[0], SOF);
//! assert_eq!(&wire[1..6], &[3, 4, 2, 0xAA, 0xBB]);
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::wire_format::{codes, MAX_PAYLOAD, SOF, SOS};
use crate::codec::{escape_into, escaped_len, frame_checksum};
use crate::error::{A2jError, Result};

/// Which start marker opens the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Host request, device reply or error frame (SOF).
    Normal,
    /// Server-initiated frame (SOS).
    ServerInitiated,
}

impl FrameKind {
    /// The marker byte for this kind.
    #[inline]
    pub fn marker(self) -> u8 {
        match self {
            FrameKind::Normal => SOF,
            FrameKind::ServerInitiated => SOS,
        }
    }

    /// Map a raw marker byte back to a kind.
    #[inline]
    pub fn from_marker(byte: u8) -> Option<Self> {
        match byte {
            SOF => Some(FrameKind::Normal),
            SOS => Some(FrameKind::ServerInitiated),
            _ => None,
        }
    }
}

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Start marker kind.
    pub kind: FrameKind,
    /// Sequence number (host-chosen, or the SIF counter).
    pub seq: u8,
    /// Command offset in requests, return code in replies.
    pub code: u8,
    /// Payload bytes (at most 255).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    ///
    /// # Panics
    ///
    /// Panics if `payload` is longer than [`MAX_PAYLOAD`]. Use
    /// [`try_new`](Self::try_new) for untrusted sizes.
    pub fn new(kind: FrameKind, seq: u8, code: u8, payload: Bytes) -> Self {
        assert!(payload.len() <= MAX_PAYLOAD, "frame payload over 255 bytes");
        Self {
            kind,
            seq,
            code,
            payload,
        }
    }

    /// Create a new frame, rejecting oversized payloads.
    pub fn try_new(kind: FrameKind, seq: u8, code: u8, payload: Bytes) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD {
            return Err(A2jError::PayloadTooLarge(payload.len()));
        }
        Ok(Self {
            kind,
            seq,
            code,
            payload,
        })
    }

    /// Host request calling the handler at `offset`.
    pub fn request(seq: u8, offset: u8, payload: &[u8]) -> Self {
        Self::new(FrameKind::Normal, seq, offset, Bytes::copy_from_slice(payload))
    }

    /// Error frame carrying a diagnostic line number.
    pub fn error(seq: u8, code: u8, line: u16) -> Self {
        let payload = Bytes::copy_from_slice(&line.to_be_bytes());
        Self::new(FrameKind::Normal, seq, code, payload)
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Length byte as it appears on the wire.
    #[inline]
    pub fn len_byte(&self) -> u8 {
        self.payload.len() as u8
    }

    /// Checksum of this frame.
    #[inline]
    pub fn checksum(&self) -> u8 {
        frame_checksum(self.seq, self.code, &self.payload)
    }

    /// Check if this is a server-initiated frame.
    #[inline]
    pub fn is_server_initiated(&self) -> bool {
        self.kind == FrameKind::ServerInitiated
    }

    /// Check if this looks like an error frame (reserved code, 2-byte payload).
    #[inline]
    pub fn is_error(&self) -> bool {
        self.kind == FrameKind::Normal
            && codes::is_error_frame(self.code)
            && self.payload.len() == 2
    }

    /// Diagnostic line number of an error frame.
    pub fn error_line(&self) -> Option<u16> {
        if !self.is_error() {
            return None;
        }
        Some(u16::from_be_bytes([self.payload[0], self.payload[1]]))
    }

    /// Number of bytes [`encode`](Self::encode) will produce.
    pub fn encoded_len(&self) -> usize {
        1 + escaped_len(self.seq)
            + escaped_len(self.code)
            + escaped_len(self.len_byte())
            + self.payload.iter().map(|&b| escaped_len(b)).sum::<usize>()
            + escaped_len(self.checksum())
    }

    /// Encode the frame as wire bytes.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf
    }

    /// Append the frame's wire bytes to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u8(self.kind.marker());
        escape_into(buf, self.seq);
        escape_into(buf, self.code);
        escape_into(buf, self.len_byte());
        for &b in self.payload.iter() {
            escape_into(buf, b);
        }
        escape_into(buf, self.checksum());
    }
}
