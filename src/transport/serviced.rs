//! Transport wrapper for links that need periodic servicing.
//!
//! Some links (USB device stacks in particular) must run a maintenance routine
//! every few tens of milliseconds while connected. [`Serviced`] attaches such a
//! routine to any transport and declares how often it must run, so that the
//! codec interleaves it with byte waits.

use std::time::Duration;

use super::{BoxFuture, Transport};
use crate::error::Result;

/// A transport whose `task()` runs a maintenance closure.
pub struct Serviced<T, F> {
    inner: T,
    maintenance: F,
    interval: Duration,
}

impl<T, F> Serviced<T, F>
where
    T: Transport,
    F: FnMut() + Send,
{
    /// Wrap `inner`; `maintenance` must run at least every `interval`.
    pub fn new(inner: T, interval: Duration, maintenance: F) -> Self {
        Self {
            inner,
            maintenance,
            interval,
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T, F> Transport for Serviced<T, F>
where
    T: Transport,
    F: FnMut() + Send,
{
    fn ready(&self) -> bool {
        self.inner.ready()
    }

    fn available(&mut self) -> BoxFuture<'_, Result<bool>> {
        self.inner.available()
    }

    fn read_byte(&mut self, timeout: Duration) -> BoxFuture<'_, Result<Option<u8>>> {
        self.inner.read_byte(timeout)
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.inner.write_byte(byte)
    }

    fn flush(&mut self) -> BoxFuture<'_, Result<()>> {
        self.inner.flush()
    }

    fn task(&mut self) {
        (self.maintenance)();
        self.inner.task();
    }

    fn service_interval(&self) -> Option<Duration> {
        Some(self.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ByteReader, ReadOutcome};
    use crate::transport::StreamTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::duplex;

    #[tokio::test(start_paused = true)]
    async fn test_task_runs_during_wait() {
        let (device, _host) = duplex(64);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut transport = Serviced::new(
            StreamTransport::new(device),
            Duration::from_millis(10),
            move || {
                counter.fetch_add(1, Ordering::Relaxed);
            },
        );

        let reader = ByteReader::new(Duration::from_millis(100))
            .with_service_interval(transport.service_interval());
        let outcome = reader.read(&mut transport).await.unwrap();

        assert_eq!(outcome, ReadOutcome::Timeout);
        // One call per 10ms slice plus the final deadline check
        assert!(calls.load(Ordering::Relaxed) >= 10);
    }

    #[test]
    fn test_declares_interval() {
        let (device, _host) = duplex(64);
        let transport = Serviced::new(StreamTransport::new(device), Duration::from_millis(30), || {});
        assert_eq!(transport.service_interval(), Some(Duration::from_millis(30)));
    }
}
