//! Buffers handed to handlers.
//!
//! - [`PayloadBuffer`] - the engine's single 255-byte exchange buffer, passed
//!   to Bounded handlers with the received length and updated in place
//! - [`ManyChunk`] - the window after the Many header, passed to Chunked
//!   handlers together with offset and flags
//!
//! # Example
//!
//! ```
//! use arduino2j::handler::PayloadBuffer;
//!
//! fn reverse(payload: &mut PayloadBuffer) -> u8 {
//!     payload.as_mut_slice().reverse();
//!     0
//! }
//!
//! let mut payload = PayloadBuffer::from_slice(b"abc").unwrap();
//! assert_eq!(reverse(&mut payload), 0);
//! assert_eq!(payload.as_slice(), b"cba");
//! ```

use crate::error::{A2jError, Result};
use crate::protocol::{MANY_PAYLOAD, MAX_PAYLOAD};

/// Fixed-capacity payload buffer shared by the receive and reply paths.
#[derive(Clone)]
pub struct PayloadBuffer {
    data: [u8; MAX_PAYLOAD],
    len: usize,
}

impl PayloadBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            data: [0u8; MAX_PAYLOAD],
            len: 0,
        }
    }

    /// Create a buffer holding a copy of `src`.
    pub fn from_slice(src: &[u8]) -> Result<Self> {
        let mut buf = Self::new();
        buf.try_fill(src)?;
        Ok(buf)
    }

    /// Current payload length.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum payload length.
    #[inline]
    pub fn capacity(&self) -> usize {
        MAX_PAYLOAD
    }

    /// Set the payload length, clamped to the capacity.
    ///
    /// Growing exposes whatever bytes are already in the buffer.
    #[inline]
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(MAX_PAYLOAD);
    }

    /// Payload bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Payload bytes, mutable.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }

    /// The whole buffer, regardless of the current length.
    #[inline]
    pub fn raw_mut(&mut self) -> &mut [u8; MAX_PAYLOAD] {
        &mut self.data
    }

    /// Replace the payload with `src`.
    pub fn try_fill(&mut self, src: &[u8]) -> Result<()> {
        if src.len() > MAX_PAYLOAD {
            return Err(A2jError::PayloadTooLarge(src.len()));
        }
        self.data[..src.len()].copy_from_slice(src);
        self.len = src.len();
        Ok(())
    }

    /// Reset the length to zero.
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Append one byte; returns false when full.
    #[inline]
    pub(crate) fn push(&mut self, byte: u8) -> bool {
        if self.len == MAX_PAYLOAD {
            return false;
        }
        self.data[self.len] = byte;
        self.len += 1;
        true
    }
}

impl Default for PayloadBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PayloadBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadBuffer")
            .field("len", &self.len)
            .field("data", &self.as_slice())
            .finish()
    }
}

/// One chunk of a Many transfer, as seen by a Chunked handler.
///
/// `is_last` and `offset` are in/out: whatever the handler leaves there is
/// written back into the reply header.
#[derive(Debug)]
pub struct ManyChunk<'a> {
    /// Final chunk of the logical object.
    pub is_last: bool,
    /// Absolute offset of this chunk.
    pub offset: u32,
    is_write: bool,
    data: &'a mut [u8],
    len: usize,
}

impl<'a> ManyChunk<'a> {
    /// Wrap a chunk window. `data` is the whole window after the header.
    pub fn new(is_last: bool, is_write: bool, offset: u32, data: &'a mut [u8], len: usize) -> Self {
        let len = len.min(data.len()).min(MANY_PAYLOAD);
        Self {
            is_last,
            offset,
            is_write,
            data,
            len,
        }
    }

    /// True when the host is sending data to the device.
    #[inline]
    pub fn is_write(&self) -> bool {
        self.is_write
    }

    /// Current chunk length.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum chunk length.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len().min(MANY_PAYLOAD)
    }

    /// Set the chunk length, clamped to the capacity.
    #[inline]
    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.capacity());
    }

    /// Chunk bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Chunk bytes, mutable.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }

    /// The whole chunk window, regardless of the current length.
    #[inline]
    pub fn raw_mut(&mut self) -> &mut [u8] {
        let capacity = self.capacity();
        &mut self.data[..capacity]
    }

    /// Replace the chunk with `src`.
    pub fn try_fill(&mut self, src: &[u8]) -> Result<()> {
        if src.len() > self.capacity() {
            return Err(A2jError::PayloadTooLarge(src.len()));
        }
        self.data[..src.len()].copy_from_slice(src);
        self.len = src.len();
        Ok(())
    }
}
