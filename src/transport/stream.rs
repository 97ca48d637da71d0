//! Transport over a tokio byte stream.
//!
//! Works with anything implementing `AsyncRead + AsyncWrite`: a serial port
//! stream, a TCP socket, or `tokio::io::duplex` in tests.
//!
//! # Example
//!
//! ```ignore
//! use arduino2j::transport::StreamTransport;
//!
//! let (device, host) = tokio::io::duplex(1024);
//! let transport = StreamTransport::new(device);
//! ```

use std::future::poll_fn;
use std::io::ErrorKind;
use std::pin::Pin;
use std::task::Poll;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};

use super::{BoxFuture, Transport};
use crate::error::{A2jError, Result};

/// Default capacity of the outbound staging buffer.
const OUTBOUND_CAPACITY: usize = 1024;

/// [`Transport`] implementation for tokio streams.
///
/// Reads go through a one-byte peek slot so that `available()` can be
/// answered without losing data. Writes are staged in a buffer and sent by
/// `flush()`.
pub struct StreamTransport<S> {
    stream: S,
    peeked: Option<u8>,
    outbound: BytesMut,
    closed: bool,
}

impl<S> StreamTransport<S> {
    /// Wrap a stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            peeked: None,
            outbound: BytesMut::with_capacity(OUTBOUND_CAPACITY),
            closed: false,
        }
    }

    /// Get a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Get a mutable reference to the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Bytes written but not yet flushed.
    pub fn pending_output(&self) -> usize {
        self.outbound.len()
    }

    /// Unwrap the stream. Unflushed output and a peeked byte are lost.
    pub fn into_inner(self) -> S {
        self.stream
    }

    fn read_error(&mut self, e: std::io::Error) -> A2jError {
        if e.kind() == ErrorKind::UnexpectedEof {
            self.closed = true;
            A2jError::ConnectionClosed
        } else {
            A2jError::Io(e)
        }
    }
}

impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn ready(&self) -> bool {
        !self.closed
    }

    fn available(&mut self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            if self.peeked.is_some() {
                return Ok(true);
            }
            let mut slot = [0u8; 1];
            let stream = &mut self.stream;
            // Poll the read exactly once; Pending means nothing queued
            let polled = poll_fn(|cx| {
                let mut buf = ReadBuf::new(&mut slot);
                match Pin::new(&mut *stream).poll_read(cx, &mut buf) {
                    Poll::Ready(result) => Poll::Ready(Some(result.map(|()| buf.filled().len()))),
                    Poll::Pending => Poll::Ready(None),
                }
            })
            .await;

            match polled {
                None => Ok(false),
                Some(Ok(0)) => {
                    self.closed = true;
                    Err(A2jError::ConnectionClosed)
                }
                Some(Ok(_)) => {
                    self.peeked = Some(slot[0]);
                    Ok(true)
                }
                Some(Err(e)) => Err(self.read_error(e)),
            }
        })
    }

    fn read_byte(&mut self, timeout: Duration) -> BoxFuture<'_, Result<Option<u8>>> {
        Box::pin(async move {
            if let Some(byte) = self.peeked.take() {
                return Ok(Some(byte));
            }
            let result = tokio::time::timeout(timeout, self.stream.read_u8()).await;
            match result {
                Ok(Ok(byte)) => Ok(Some(byte)),
                Ok(Err(e)) => Err(self.read_error(e)),
                Err(_) => Ok(None),
            }
        })
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        if self.closed {
            return Err(A2jError::ConnectionClosed);
        }
        self.outbound.extend_from_slice(&[byte]);
        Ok(())
    }

    fn flush(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let pending = self.outbound.split();
            if pending.is_empty() {
                return Ok(());
            }
            self.stream.write_all(&pending).await?;
            self.stream.flush().await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_available_peeks_without_losing_byte() {
        let (device, mut host) = duplex(64);
        let mut transport = StreamTransport::new(device);

        assert!(!transport.available().await.unwrap());

        host.write_all(&[0x55, 0x66]).await.unwrap();
        assert!(transport.available().await.unwrap());
        assert!(transport.available().await.unwrap());

        let timeout = Duration::from_millis(10);
        assert_eq!(transport.read_byte(timeout).await.unwrap(), Some(0x55));
        assert_eq!(transport.read_byte(timeout).await.unwrap(), Some(0x66));
    }

    #[tokio::test]
    async fn test_writes_staged_until_flush() {
        let (device, mut host) = duplex(64);
        let mut transport = StreamTransport::new(device);

        transport.write_byte(1).unwrap();
        transport.write_byte(2).unwrap();
        assert_eq!(transport.pending_output(), 2);

        transport.flush().await.unwrap();
        assert_eq!(transport.pending_output(), 0);

        let mut buf = [0u8; 2];
        host.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout_returns_none() {
        let (device, _host) = duplex(64);
        let mut transport = StreamTransport::new(device);

        let byte = transport.read_byte(Duration::from_millis(20)).await.unwrap();
        assert_eq!(byte, None);
    }

    #[tokio::test]
    async fn test_closed_peer_reports_connection_closed() {
        let (device, host) = duplex(64);
        let mut transport = StreamTransport::new(device);
        drop(host);

        let result = transport.read_byte(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(A2jError::ConnectionClosed)));
        assert!(!transport.ready());
        assert!(matches!(
            transport.write_byte(0),
            Err(A2jError::ConnectionClosed)
        ));
    }
}
