//! Protocol module - wire format, frames, and host-side decoding.
//!
//! This module implements the binary protocol surface:
//! - Reserved marker bytes, checksum constants and return codes
//! - The 6-byte Many header
//! - Frame struct with wire encoding
//! - Frame buffer for decoding a raw byte stream on the host side

mod frame;
mod frame_buffer;
mod many;
mod wire_format;

pub use frame::{Frame, FrameKind};
pub use frame_buffer::FrameBuffer;
pub use many::{many_payload, many_payloads, split_many_reply};
pub use wire_format::{
    codes, is_reserved, many_flags, ManyHeader, CRC_CMD, CRC_LEN, ESC, MANY_HEADER_SIZE,
    MANY_PAYLOAD, MAX_PAYLOAD, SOF, SOS,
};
