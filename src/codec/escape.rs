//! Byte stuffing and bounded-timeout byte acquisition.
//!
//! A reserved byte `b` (SOF, SOS or ESC) is written as `ESC, b - 1`; every
//! other byte is written as is. On the receive side an unescaped marker where
//! data was expected is a framing error, reported separately from timeouts.
//!
//! # Example
//!
//! ```
//! use arduino2j::codec::{escape_into, ReadOutcome, Unescaper};
//! use arduino2j::protocol::SOF;
//! use bytes::BytesMut;
//!
//! let mut wire = BytesMut::new();
//! escape_into(&mut wire, SOF);
//! assert_eq!(wire.len(), 2);
//!
//! let mut unescaper = Unescaper::new();
//! assert_eq!(unescaper.push(wire[0]), None);
//! assert_eq!(unescaper.push(wire[1]), Some(ReadOutcome::Byte(SOF)));
//! ```

use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tokio::time::Instant;

use crate::error::Result;
use crate::protocol::{is_reserved, ESC, SOF, SOS};
use crate::transport::Transport;

/// Legacy 16-bit encoding of [`ReadOutcome::Timeout`].
pub const TIMEOUT_SENTINEL: u16 = 0xFFFF;

/// Legacy 16-bit encoding of [`ReadOutcome::FramingError`].
pub const FRAMING_SENTINEL: u16 = 0xFFFE;

/// Result of reading one de-escaped byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A valid data byte.
    Byte(u8),
    /// No byte arrived within the timeout window.
    Timeout,
    /// An unescaped SOF/SOS appeared where data was expected.
    FramingError,
}

impl ReadOutcome {
    /// Get the data byte, if any.
    #[inline]
    pub fn byte(self) -> Option<u8> {
        match self {
            ReadOutcome::Byte(b) => Some(b),
            _ => None,
        }
    }

    /// Encode as a 16-bit value; bytes map to 0..=255, the rest above.
    pub fn to_sentinel(self) -> u16 {
        match self {
            ReadOutcome::Byte(b) => b as u16,
            ReadOutcome::Timeout => TIMEOUT_SENTINEL,
            ReadOutcome::FramingError => FRAMING_SENTINEL,
        }
    }

    /// Decode a 16-bit value produced by [`to_sentinel`](Self::to_sentinel).
    ///
    /// Unknown values above 255 are treated as timeouts.
    pub fn from_sentinel(value: u16) -> Self {
        match value {
            0..=0xFF => ReadOutcome::Byte(value as u8),
            FRAMING_SENTINEL => ReadOutcome::FramingError,
            _ => ReadOutcome::Timeout,
        }
    }
}

/// Append `byte` to `out`, escaping it if it is reserved.
#[inline]
pub fn escape_into(out: &mut BytesMut, byte: u8) {
    if is_reserved(byte) {
        out.put_u8(ESC);
        out.put_u8(byte.wrapping_sub(1));
    } else {
        out.put_u8(byte);
    }
}

/// Number of wire bytes `byte` occupies once escaped.
#[inline]
pub fn escaped_len(byte: u8) -> usize {
    if is_reserved(byte) {
        2
    } else {
        1
    }
}

/// Incremental de-escaper fed one raw byte at a time.
#[derive(Debug, Default, Clone)]
pub struct Unescaper {
    escaped: bool,
}

impl Unescaper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw byte.
    ///
    /// Returns `None` after an ESC prefix (the next byte completes it).
    pub fn push(&mut self, raw: u8) -> Option<ReadOutcome> {
        if self.escaped {
            self.escaped = false;
            if raw == SOF || raw == SOS {
                return Some(ReadOutcome::FramingError);
            }
            return Some(ReadOutcome::Byte(raw.wrapping_add(1)));
        }

        match raw {
            ESC => {
                self.escaped = true;
                None
            }
            SOF | SOS => Some(ReadOutcome::FramingError),
            b => Some(ReadOutcome::Byte(b)),
        }
    }

    /// Check if an ESC prefix is waiting for its second byte.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.escaped
    }

    /// Drop a pending ESC prefix.
    pub fn reset(&mut self) {
        self.escaped = false;
    }
}

/// Reads bytes from a [`Transport`] with a bounded wait per raw byte.
#[derive(Debug, Clone, Copy)]
pub struct ByteReader {
    timeout: Duration,
    service_interval: Option<Duration>,
}

impl ByteReader {
    /// Create a reader that waits at most `timeout` for each raw byte.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            service_interval: None,
        }
    }

    /// Split every wait into slices of `interval`, calling the transport's
    /// task before each slice.
    pub fn with_service_interval(mut self, interval: Option<Duration>) -> Self {
        self.service_interval = interval.filter(|i| !i.is_zero());
        self
    }

    /// Per-byte timeout.
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Read one raw byte; `None` when the window expires.
    pub async fn read_raw<T: Transport>(&self, transport: &mut T) -> Result<Option<u8>> {
        let slice = match self.service_interval {
            Some(slice) => slice,
            None => return transport.read_byte(self.timeout).await,
        };

        let deadline = Instant::now() + self.timeout;
        loop {
            transport.task();
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let wait = (deadline - now).min(slice);
            if let Some(byte) = transport.read_byte(wait).await? {
                return Ok(Some(byte));
            }
        }
    }

    /// Read one de-escaped byte.
    pub async fn read<T: Transport>(&self, transport: &mut T) -> Result<ReadOutcome> {
        let mut unescaper = Unescaper::new();
        loop {
            let raw = match self.read_raw(transport).await? {
                Some(raw) => raw,
                None => return Ok(ReadOutcome::Timeout),
            };
            if let Some(outcome) = unescaper.push(raw) {
                return Ok(outcome);
            }
        }
    }
}
