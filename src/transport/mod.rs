//! Transport module - the byte-stream boundary of the engine.
//!
//! The engine consumes a link through the [`Transport`] trait only. Provided
//! implementations:
//! - [`StreamTransport`] - any tokio `AsyncRead + AsyncWrite` stream
//!   (serial device, TCP, `tokio::io::duplex`)
//! - [`Serviced`] - wraps a transport that needs a periodic maintenance task

mod serviced;
mod stream;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::Result;

pub use serviced::Serviced;
pub use stream::StreamTransport;

/// Boxed future returned by transport operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Byte-level link consumed by the protocol engine.
pub trait Transport: Send {
    /// True when the link is connected/configured.
    fn ready(&self) -> bool;

    /// True when at least one byte can be read without waiting.
    fn available(&mut self) -> BoxFuture<'_, Result<bool>>;

    /// Read one raw byte, waiting at most `timeout`. `None` on expiry.
    fn read_byte(&mut self, timeout: Duration) -> BoxFuture<'_, Result<Option<u8>>>;

    /// Enqueue one raw byte for transmission.
    fn write_byte(&mut self, byte: u8) -> Result<()>;

    /// Push every enqueued byte to the link.
    fn flush(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Periodic housekeeping. No-op for links that need none.
    fn task(&mut self) {}

    /// How often [`task`](Self::task) must run while waiting for bytes.
    fn service_interval(&self) -> Option<Duration> {
        None
    }
}
