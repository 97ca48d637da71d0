//! The frame processor.
//!
//! One call to [`Engine::process`] handles at most one inbound frame:
//!
//! ```text
//! Idle -> Seq -> Offset -> Length -> Payload[0..len) -> Checksum -> Dispatch -> Reply -> Idle
//! ```
//!
//! Every step after the sequence number has an error exit that sends an
//! error frame carrying the echoed sequence number and the source line of the
//! failing step.

use std::time::Duration;

use bytes::Bytes;

use super::Engine;
use crate::codec::{Checksum, ReadOutcome};
use crate::error::{A2jError, Result};
use crate::handler::Dispatch;
use crate::protocol::{codes, Frame, FrameKind, SOF};
use crate::transport::Transport;

/// What one call to [`Engine::process`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    /// Nothing to read, or the first byte was not a start marker.
    Idle,
    /// The busy flag was held; nothing was read.
    Busy,
    /// A reply was sent.
    Replied { seq: u8, code: u8 },
    /// An error frame was sent.
    Rejected { seq: u8, code: u8, line: u16 },
    /// The frame broke off before its sequence number; nothing was sent.
    Abandoned,
    /// Writing the reply or error frame failed; the host sees silence or a
    /// broken frame.
    Unsent { seq: u8 },
}

impl<T: Transport> Engine<T> {
    /// Process at most one inbound frame.
    ///
    /// Never waits longer than the per-byte timeouts of the frame being
    /// parsed. Timeouts, bad checksums and unknown offsets are answered with
    /// error frames and reported through [`Exchange`].
    ///
    /// # Errors
    ///
    /// Only transport failures on the receive side, such as
    /// [`A2jError::ConnectionClosed`], are returned as errors.
    pub async fn process(&mut self) -> Result<Exchange> {
        let _guard = match self.busy.try_acquire() {
            Some(guard) => guard,
            None => return Ok(Exchange::Busy),
        };

        if !self.transport.ready() || !self.transport.available().await? {
            return Ok(Exchange::Idle);
        }
        match self.transport.read_byte(Duration::ZERO).await? {
            Some(SOF) => {}
            Some(other) => {
                tracing::trace!("Skipping stray byte {:#04x}", other);
                return Ok(Exchange::Idle);
            }
            None => return Ok(Exchange::Idle),
        }

        let seq = match self.reader.read(&mut self.transport).await? {
            ReadOutcome::Byte(seq) => seq,
            outcome => {
                tracing::debug!("Frame abandoned before sequence number: {:?}", outcome);
                return Ok(Exchange::Abandoned);
            }
        };

        let offset = match self.reader.read(&mut self.transport).await? {
            ReadOutcome::Byte(offset) => offset,
            _ => return self.reject(seq, codes::TIMEOUT, line!()).await,
        };
        if !self.table.contains(offset) {
            tracing::debug!("Offset {} outside table of {}", offset, self.table.len());
            return self.reject(seq, codes::OOB, line!()).await;
        }

        let len = match self.reader.read(&mut self.transport).await? {
            ReadOutcome::Byte(len) => len,
            _ => return self.reject(seq, codes::TIMEOUT, line!()).await,
        };

        let mut checksum = Checksum::new(seq, offset, len);
        self.buffer.clear();
        for _ in 0..len {
            let byte = match self.reader.read(&mut self.transport).await? {
                ReadOutcome::Byte(byte) => byte,
                _ => return self.reject(seq, codes::TIMEOUT, line!()).await,
            };
            checksum.push(byte);
            self.buffer.push(byte);
        }

        let received = match self.reader.read(&mut self.transport).await? {
            ReadOutcome::Byte(received) => received,
            _ => return self.reject(seq, codes::TIMEOUT, line!()).await,
        };
        if received != checksum.value() {
            tracing::debug!(
                "Checksum mismatch for seq {}: expected {:#04x}, got {:#04x}",
                seq,
                checksum.value(),
                received
            );
            return self.reject(seq, codes::CHECKSUM, line!()).await;
        }

        let code = match self.table.dispatch(offset, &mut self.buffer) {
            Dispatch::Reply(code) => code,
            Dispatch::Rejected => return self.reject(seq, codes::OOB, line!()).await,
        };

        let reply = Frame::new(
            FrameKind::Normal,
            seq,
            code,
            Bytes::copy_from_slice(self.buffer.as_slice()),
        );
        self.deliver(&reply, Exchange::Replied { seq, code }).await
    }

    /// Send an error frame; the line number keeps its low 16 bits.
    async fn reject(&mut self, seq: u8, code: u8, line: u32) -> Result<Exchange> {
        let line = (line & 0xFFFF) as u16;
        tracing::debug!("Error frame {:#04x} for seq {} (line {})", code, seq, line);
        let frame = Frame::error(seq, code, line);
        self.deliver(&frame, Exchange::Rejected { seq, code, line })
            .await
    }

    async fn deliver(&mut self, frame: &Frame, exchange: Exchange) -> Result<Exchange> {
        match self.send(frame).await {
            Ok(()) => Ok(exchange),
            Err(A2jError::ConnectionClosed) => Err(A2jError::ConnectionClosed),
            Err(e) => {
                tracing::debug!("Dropping frame for seq {}: {}", frame.seq, e);
                Ok(Exchange::Unsent { seq: frame.seq })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, Features};
    use crate::engine::EngineBuilder;
    use crate::handler::PayloadBuffer;
    use crate::protocol::{FrameBuffer, ESC};
    use crate::transport::StreamTransport;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

    fn engine() -> (Engine<StreamTransport<DuplexStream>>, DuplexStream) {
        let (device, host) = duplex(1024);
        let config = EngineConfig {
            features: Features::none(),
            ..EngineConfig::default()
        };
        let engine = EngineBuilder::new()
            .config(config)
            .bounded("echo", |_: &mut PayloadBuffer| 0)
            .bounded("sum", |payload: &mut PayloadBuffer| {
                let sum = payload.as_slice().iter().fold(0u8, |a, &b| a.wrapping_add(b));
                payload.try_fill(&[sum]).map_or(codes::FAILURE, |()| 0)
            })
            .build(StreamTransport::new(device))
            .unwrap();
        (engine, host)
    }

    async fn reply(host: &mut DuplexStream) -> Frame {
        let mut decoder = FrameBuffer::new();
        let mut buf = [0u8; 512];
        loop {
            let n = host.read(&mut buf).await.unwrap();
            let mut frames = decoder.push(&buf[..n]).unwrap();
            if !frames.is_empty() {
                return frames.remove(0);
            }
        }
    }

    #[tokio::test]
    async fn test_idle_without_data() {
        let (mut engine, _host) = engine();
        assert_eq!(engine.process().await.unwrap(), Exchange::Idle);
    }

    #[tokio::test]
    async fn test_stray_byte_is_idle() {
        let (mut engine, mut host) = engine();
        host.write_all(&[0x55]).await.unwrap();
        assert_eq!(engine.process().await.unwrap(), Exchange::Idle);
    }

    #[tokio::test]
    async fn test_handler_reply() {
        let (mut engine, mut host) = engine();
        host.write_all(&Frame::request(9, 1, &[1, 2, 3]).encode())
            .await
            .unwrap();

        let exchange = engine.process().await.unwrap();
        assert_eq!(exchange, Exchange::Replied { seq: 9, code: 0 });

        let frame = reply(&mut host).await;
        assert_eq!(frame.seq, 9);
        assert_eq!(frame.code, 0);
        assert_eq!(frame.payload(), &[6]);
    }

    #[tokio::test]
    async fn test_escaped_fields_are_decoded() {
        let (mut engine, mut host) = engine();
        // Sequence number and payload both need escaping
        host.write_all(&Frame::request(SOF, 0, &[ESC, SOF]).encode())
            .await
            .unwrap();

        engine.process().await.unwrap();
        let frame = reply(&mut host).await;
        assert_eq!(frame.seq, SOF);
        assert_eq!(frame.payload(), &[ESC, SOF]);
    }

    #[tokio::test]
    async fn test_out_of_range_offset() {
        let (mut engine, mut host) = engine();
        host.write_all(&Frame::request(4, 2, &[]).encode())
            .await
            .unwrap();

        let exchange = engine.process().await.unwrap();
        assert!(matches!(
            exchange,
            Exchange::Rejected { seq: 4, code: codes::OOB, .. }
        ));

        let frame = reply(&mut host).await;
        assert!(frame.is_error());
        assert_eq!(frame.code, codes::OOB);
    }

    #[tokio::test]
    async fn test_bad_checksum() {
        let (mut engine, mut host) = engine();
        let mut wire = Frame::request(5, 0, &[0x41]).encode();
        let last = wire.len() - 1;
        wire[last] ^= 0x01;
        host.write_all(&wire).await.unwrap();

        let exchange = engine.process().await.unwrap();
        assert!(matches!(
            exchange,
            Exchange::Rejected { seq: 5, code: codes::CHECKSUM, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_mid_payload() {
        let (mut engine, mut host) = engine();
        // Length says 3, only one payload byte follows
        host.write_all(&[SOF, 7, 0, 3, 0x41]).await.unwrap();

        let line = match engine.process().await.unwrap() {
            Exchange::Rejected { seq, code, line } => {
                assert_eq!(seq, 7);
                assert_eq!(code, codes::TIMEOUT);
                line
            }
            other => panic!("unexpected exchange {:?}", other),
        };
        assert_ne!(line, 0);

        let frame = reply(&mut host).await;
        assert_eq!(frame.code, codes::TIMEOUT);
        assert_eq!(frame.error_line(), Some(line));
    }

    #[tokio::test]
    async fn test_unescaped_marker_mid_frame_is_timeout() {
        let (mut engine, mut host) = engine();
        host.write_all(&[SOF, 7, 0, 3, 0x41, SOF, 0x42])
            .await
            .unwrap();

        let exchange = engine.process().await.unwrap();
        assert!(matches!(
            exchange,
            Exchange::Rejected { seq: 7, code: codes::TIMEOUT, .. }
        ));

        let frame = reply(&mut host).await;
        assert!(frame.is_error());
        assert_eq!(frame.seq, 7);
        assert_eq!(frame.code, codes::TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_before_seq_is_silent() {
        let (mut engine, mut host) = engine();
        host.write_all(&[SOF]).await.unwrap();

        assert_eq!(engine.process().await.unwrap(), Exchange::Abandoned);
    }

    #[tokio::test]
    async fn test_busy_flag_blocks_processing() {
        let (mut engine, mut host) = engine();
        host.write_all(&Frame::request(1, 0, &[]).encode())
            .await
            .unwrap();

        let flag = engine.busy_flag();
        let guard = flag.try_acquire().unwrap();
        assert_eq!(engine.process().await.unwrap(), Exchange::Busy);

        drop(guard);
        assert_eq!(
            engine.process().await.unwrap(),
            Exchange::Replied { seq: 1, code: 0 }
        );
        assert!(!flag.is_set());
    }

    #[tokio::test]
    async fn test_closed_peer() {
        let (mut engine, host) = engine();
        drop(host);
        assert!(matches!(
            engine.process().await,
            Err(A2jError::ConnectionClosed)
        ));
    }
}
