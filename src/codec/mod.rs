//! Codec module - byte-level framing primitives.
//!
//! - [`escape_into`] / [`Unescaper`] - byte stuffing of reserved values
//! - [`ByteReader`] - bounded-timeout reads from a [`Transport`](crate::transport::Transport)
//! - [`Checksum`] - running XOR checksum over frame fields
//!
//! # Design
//!
//! The codec never buffers whole frames. The device side pulls one byte at a
//! time through [`ByteReader`]; the host side feeds raw bytes into an
//! [`Unescaper`] via [`FrameBuffer`](crate::protocol::FrameBuffer).

mod checksum;
mod escape;

pub use checksum::{frame_checksum, Checksum};
pub use escape::{
    escape_into, escaped_len, ByteReader, ReadOutcome, Unescaper, FRAMING_SENTINEL,
    TIMEOUT_SENTINEL,
};
