//! Frame buffer for decoding a raw byte stream into frames.
//!
//! This is the host side of the protocol: raw bytes from the link are pushed
//! in whatever chunks they arrive, and complete, checksum-verified frames come
//! out. It implements a state machine over the frame fields:
//! - `Hunting`: discard bytes until a SOF/SOS marker
//! - `Seq`, `Code`, `Len`: one de-escaped byte each
//! - `Payload`: `len` de-escaped bytes
//! - `Checksum`: verify and emit
//!
//! A raw marker inside a frame abandons the partial frame and starts a new one.
//!
//! # Example
//!
//! ```
//! use arduino2j::protocol::{Frame, FrameBuffer};
//!
//! let wire = Frame::request(1, 2, b"hi").encode();
//!
//! let mut buffer = FrameBuffer::new();
//! let frames = buffer.push(&wire).unwrap();
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].payload(), b"hi");
//! ```

use bytes::{Buf, BytesMut};

use super::frame::{Frame, FrameKind};
use crate::codec::{Checksum, ReadOutcome, Unescaper};
use crate::error::{A2jError, Result};

/// State machine for frame parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Hunting,
    Seq,
    Code,
    Len,
    Payload,
    Checksum,
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    /// Raw bytes not yet consumed by the state machine.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    unescaper: Unescaper,
    kind: FrameKind,
    seq: u8,
    code: u8,
    len: u8,
    /// De-escaped payload of the frame in progress.
    payload: BytesMut,
    /// Bytes dropped while hunting for a marker or by resyncs.
    discarded: usize,
    /// Checksum failure seen after good frames, reported by the next push.
    failed: Option<A2jError>,
}

impl FrameBuffer {
    /// Create a new, empty frame buffer.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(1024),
            state: State::Hunting,
            unescaper: Unescaper::new(),
            kind: FrameKind::Normal,
            seq: 0,
            code: 0,
            len: 0,
            payload: BytesMut::with_capacity(super::MAX_PAYLOAD),
            discarded: 0,
            failed: None,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Partial frames are kept for the next push.
    ///
    /// # Errors
    ///
    /// Returns [`A2jError::Checksum`] if a frame fails verification. The bad
    /// frame is dropped; bytes after it stay buffered and are decoded by the
    /// next call. Frames decoded before the bad one in the same call are
    /// returned first and the error is reported by the next call.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);
        if let Some(e) = self.failed.take() {
            return Err(e);
        }

        let mut frames = Vec::new();
        loop {
            match self.try_extract_one() {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => return Ok(frames),
                Err(e) if frames.is_empty() => return Err(e),
                Err(e) => {
                    self.failed = Some(e);
                    return Ok(frames);
                }
            }
        }
    }

    /// Try to extract a single frame from the buffer.
    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        while self.buffer.has_remaining() {
            let raw = self.buffer.get_u8();

            if let Some(kind) = FrameKind::from_marker(raw) {
                if self.state != State::Hunting {
                    tracing::warn!(
                        "Marker {:#04x} inside frame, dropping partial frame seq {}",
                        raw,
                        self.seq
                    );
                    self.discarded += self.payload.len();
                }
                self.start(kind);
                continue;
            }

            if self.state == State::Hunting {
                self.discarded += 1;
                continue;
            }

            let byte = match self.unescaper.push(raw) {
                Some(ReadOutcome::Byte(b)) => b,
                _ => continue,
            };

            match self.state {
                State::Hunting => unreachable!("hunting handled above"),
                State::Seq => {
                    self.seq = byte;
                    self.state = State::Code;
                }
                State::Code => {
                    self.code = byte;
                    self.state = State::Len;
                }
                State::Len => {
                    self.len = byte;
                    self.state = if byte == 0 {
                        State::Checksum
                    } else {
                        State::Payload
                    };
                }
                State::Payload => {
                    self.payload.extend_from_slice(&[byte]);
                    if self.payload.len() == self.len as usize {
                        self.state = State::Checksum;
                    }
                }
                State::Checksum => {
                    self.state = State::Hunting;
                    let mut expected = Checksum::new(self.seq, self.code, self.len);
                    expected.extend(&self.payload);
                    let payload = self.payload.split().freeze();
                    if expected.value() != byte {
                        return Err(A2jError::Checksum {
                            expected: expected.value(),
                            actual: byte,
                        });
                    }
                    return Ok(Some(Frame::new(self.kind, self.seq, self.code, payload)));
                }
            }
        }
        Ok(None)
    }

    fn start(&mut self, kind: FrameKind) {
        self.kind = kind;
        self.state = State::Seq;
        self.unescaper.reset();
        self.payload.clear();
    }

    /// Get the number of raw bytes not yet consumed.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if no raw bytes are pending.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Check if a frame is partially decoded.
    pub fn in_frame(&self) -> bool {
        self.state != State::Hunting
    }

    /// Bytes dropped outside of frames so far.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.payload.clear();
        self.unescaper.reset();
        self.state = State::Hunting;
        self.failed = None;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::Hunting => "Hunting",
            State::Seq => "Seq",
            State::Code => "Code",
            State::Len => "Len",
            State::Payload => "Payload",
            State::Checksum => "Checksum",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{codes, ESC, SOF, SOS};
    use bytes::Bytes;

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let wire = Frame::request(42, 1, b"hello").encode();

        let frames = buffer.push(&wire).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].seq, 42);
        assert_eq!(frames[0].code, 1);
        assert_eq!(frames[0].payload(), b"hello");
        assert!(buffer.is_empty());
        assert!(!buffer.in_frame());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();
        let mut combined = BytesMut::new();
        for seq in 1..=3u8 {
            Frame::request(seq, seq, &[seq; 4]).encode_into(&mut combined);
        }

        let frames = buffer.push(&combined).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].seq, 1);
        assert_eq!(frames[1].seq, 2);
        assert_eq!(frames[2].seq, 3);
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let wire = Frame::request(7, 0, &[SOF, ESC, SOS, 0x00]).encode();

        let mut all_frames = Vec::new();
        for byte in wire.iter() {
            all_frames.extend(buffer.push(&[*byte]).unwrap());
        }

        assert_eq!(all_frames.len(), 1);
        assert_eq!(all_frames[0].payload(), &[SOF, ESC, SOS, 0x00]);
    }

    #[test]
    fn test_fragmented_escape_pair() {
        let mut buffer = FrameBuffer::new();
        let wire = Frame::request(1, 0, &[ESC]).encode();

        // Split between ESC and the escaped byte
        let frames = buffer.push(&wire[..5]).unwrap();
        assert!(frames.is_empty());
        assert_eq!(buffer.state_name(), "Payload");

        let frames = buffer.push(&wire[5..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), &[ESC]);
    }

    #[test]
    fn test_empty_payload() {
        let mut buffer = FrameBuffer::new();
        let wire = Frame::request(1, 2, b"").encode();

        let frames = buffer.push(&wire).unwrap();

        assert_eq!(frames.len(), 1);
        assert!(frames[0].payload().is_empty());
    }

    #[test]
    fn test_max_payload() {
        let mut buffer = FrameBuffer::new();
        let payload: Vec<u8> = (0..=254u8).collect();
        let wire = Frame::request(1, 2, &payload).encode();

        let frames = buffer.push(&wire).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), &payload[..]);
    }

    #[test]
    fn test_garbage_before_marker_is_discarded() {
        let mut buffer = FrameBuffer::new();
        let mut data = vec![0x00, 0x41, 0x42];
        data.extend_from_slice(&Frame::request(5, 1, b"x").encode());

        let frames = buffer.push(&data).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(buffer.discarded(), 3);
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut buffer = FrameBuffer::new();
        let mut wire = Frame::request(5, 1, b"abc").encode();
        let last = wire.len() - 1;
        wire[last] ^= 0x01;

        let result = buffer.push(&wire);

        assert!(matches!(result, Err(A2jError::Checksum { .. })));
        assert!(!buffer.in_frame());
    }

    #[test]
    fn test_frame_after_bad_frame_is_kept() {
        let mut buffer = FrameBuffer::new();
        let mut data = BytesMut::new();
        Frame::request(1, 1, b"bad").encode_into(&mut data);
        let bad_end = data.len() - 1;
        data[bad_end] ^= 0x40;
        Frame::request(2, 1, b"good").encode_into(&mut data);

        assert!(buffer.push(&data).is_err());
        let frames = buffer.push(&[]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].seq, 2);
    }

    #[test]
    fn test_good_frame_before_bad_frame_is_returned() {
        let mut buffer = FrameBuffer::new();
        let mut data = BytesMut::new();
        Frame::request(1, 1, b"good").encode_into(&mut data);
        Frame::request(2, 1, b"bad").encode_into(&mut data);
        let bad_end = data.len() - 1;
        data[bad_end] ^= 0x40;
        Frame::request(3, 1, b"next").encode_into(&mut data);

        let frames = buffer.push(&data).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].seq, 1);

        assert!(matches!(buffer.push(&[]), Err(A2jError::Checksum { .. })));

        let frames = buffer.push(&[]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].seq, 3);
    }

    #[test]
    fn test_marker_inside_frame_resyncs() {
        let mut buffer = FrameBuffer::new();
        let full = Frame::request(2, 1, b"full").encode();
        let mut data = vec![SOF, 1, 1, 10, 0x41];
        data.extend_from_slice(&full);

        let frames = buffer.push(&data).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].seq, 2);
        assert_eq!(frames[0].payload(), b"full");
    }

    #[test]
    fn test_server_initiated_and_error_frames() {
        let mut buffer = FrameBuffer::new();
        let mut data = BytesMut::new();
        Frame::new(FrameKind::ServerInitiated, 0, 9, Bytes::from_static(b"evt"))
            .encode_into(&mut data);
        Frame::error(4, codes::OOB, 321).encode_into(&mut data);

        let frames = buffer.push(&data).unwrap();

        assert_eq!(frames.len(), 2);
        assert!(frames[0].is_server_initiated());
        assert_eq!(frames[1].error_line(), Some(321));
    }

    #[test]
    fn test_clear_resets_state() {
        let mut buffer = FrameBuffer::new();
        let wire = Frame::request(1, 1, b"test").encode();
        buffer.push(&wire[..4]).unwrap();
        assert_eq!(buffer.state_name(), "Payload");

        buffer.clear();

        assert_eq!(buffer.state_name(), "Hunting");
        assert!(buffer.is_empty());
    }
}
