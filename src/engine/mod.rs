//! Engine builder and polling loop.
//!
//! The [`EngineBuilder`] provides a fluent API for configuring the command
//! table and building the engine. The [`Engine`] owns everything an exchange
//! touches:
//! 1. The transport
//! 2. The immutable command table
//! 3. The single payload buffer shared by receive and reply
//! 4. The busy flag and the server-initiated sequence counter
//! 5. The queue behind [`SifHandle`]s
//!
//! # Example
//!
//! ```ignore
//! use arduino2j::{EngineBuilder, PayloadBuffer};
//! use arduino2j::transport::StreamTransport;
//!
//! #[tokio::main]
//! async fn main() -> arduino2j::Result<()> {
//!     let port = open_serial_port()?;
//!     let mut engine = EngineBuilder::new()
//!         .property("BOARD", "uno")
//!         .bounded("led", |payload: &mut PayloadBuffer| {
//!             set_led(payload.as_slice().first().copied().unwrap_or(0));
//!             0
//!         })
//!         .build(StreamTransport::new(port))?;
//!
//!     engine.run().await
//! }
//! ```

mod process;
mod sif;

use std::time::Duration;

use crate::busy::BusyFlag;
use crate::codec::ByteReader;
use crate::config::EngineConfig;
use crate::error::{A2jError, Result};
use crate::handler::{CommandTable, ManyChunk, PayloadBuffer, PropertyTable, TableBuilder};
use crate::protocol::Frame;
use crate::transport::Transport;
use tokio::sync::mpsc;

pub use process::Exchange;
pub use sif::SifHandle;

use sif::{SifRequest, SIF_QUEUE_CAPACITY};

/// Builder for configuring and creating an [`Engine`].
///
/// Built-in handlers are registered first (according to
/// [`Features`](crate::config::Features)); application handlers follow in the
/// order they are added here.
pub struct EngineBuilder {
    config: EngineConfig,
    handlers: TableBuilder,
}

impl EngineBuilder {
    /// Create a builder with the default configuration.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            handlers: TableBuilder::new(),
        }
    }

    /// Replace the configuration. Properties added so far are kept.
    pub fn config(mut self, config: EngineConfig) -> Self {
        let mut properties = std::mem::take(&mut self.config.properties);
        properties.extend(config.properties.iter().cloned());
        self.config = EngineConfig {
            properties,
            ..config
        };
        self
    }

    /// Set the per-byte timeout.
    ///
    /// Default: 100ms
    pub fn byte_timeout(mut self, timeout: Duration) -> Self {
        self.config.byte_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Add a key/value pair to the property table.
    pub fn property(mut self, key: &str, value: &str) -> Self {
        self.config
            .properties
            .push((key.to_string(), value.to_string()));
        self
    }

    /// Register a Bounded handler after the built-ins.
    pub fn bounded<F>(mut self, name: &str, handler: F) -> Self
    where
        F: FnMut(&mut PayloadBuffer) -> u8 + Send + 'static,
    {
        self.handlers = self.handlers.bounded(name, handler);
        self
    }

    /// Register a Chunked handler after the built-ins.
    pub fn chunked<F>(mut self, name: &str, handler: F) -> Self
    where
        F: FnMut(&mut ManyChunk<'_>) -> u8 + Send + 'static,
    {
        self.handlers = self.handlers.chunked(name, handler);
        self
    }

    /// Build the command table and attach the engine to `transport`.
    pub fn build<T: Transport>(self, transport: T) -> Result<Engine<T>> {
        let properties = PropertyTable::from_pairs(self.config.properties.iter().cloned());
        let builder = TableBuilder::new().builtins(&self.config.features, properties);
        let builtins = builder.len();
        let table = builder.append(self.handlers).build()?;

        tracing::debug!(
            "Command table built: {} built-ins, {} entries",
            builtins,
            table.len()
        );
        Ok(Engine::new(transport, table, self.config))
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The device-side protocol engine.
///
/// Call [`process`](Self::process) from a polling loop, or hand control to
/// [`run`](Self::run).
pub struct Engine<T> {
    transport: T,
    table: CommandTable,
    config: EngineConfig,
    reader: ByteReader,
    buffer: PayloadBuffer,
    busy: BusyFlag,
    sif_seq: u8,
    sif_tx: mpsc::Sender<SifRequest>,
    sif_rx: mpsc::Receiver<SifRequest>,
}

impl<T: Transport> Engine<T> {
    /// Attach a prebuilt command table to `transport`.
    ///
    /// Features and properties only select built-ins when the table is made
    /// by [`EngineBuilder`]; here the table is used as given. `features.sif`
    /// still gates [`send_sif`](Self::send_sif).
    pub fn new(transport: T, table: CommandTable, config: EngineConfig) -> Self {
        let interval = config
            .service_interval()
            .or_else(|| transport.service_interval());
        let reader = ByteReader::new(config.byte_timeout()).with_service_interval(interval);
        let (sif_tx, sif_rx) = mpsc::channel(SIF_QUEUE_CAPACITY);
        Self {
            transport,
            table,
            config,
            reader,
            buffer: PayloadBuffer::new(),
            busy: BusyFlag::new(),
            sif_seq: 0,
            sif_tx,
            sif_rx,
        }
    }

    /// The command table.
    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// A handle on the busy flag, for code that must observe or hold it
    /// outside the engine.
    pub fn busy_flag(&self) -> BusyFlag {
        self.busy.clone()
    }

    /// Sequence number the next server-initiated frame will carry.
    pub fn sif_sequence(&self) -> u8 {
        self.sif_seq
    }

    /// Poll forever, one exchange per call.
    ///
    /// Sleeps for the poll interval whenever nothing is pending; a frame
    /// queued through a [`SifHandle`] cuts the sleep short. Queued frames are
    /// written between exchanges, never inside one. Returns `Ok(())` when the
    /// transport reports the connection closed.
    pub async fn run(&mut self) -> Result<()> {
        let poll_interval = self.config.poll_interval();
        loop {
            self.serve_sif_requests().await;
            match self.process().await {
                Ok(Exchange::Idle) | Ok(Exchange::Busy) => {
                    // The engine keeps a sender, so the queue never closes.
                    let request = tokio::select! {
                        _ = tokio::time::sleep(poll_interval) => None,
                        request = self.sif_rx.recv() => request,
                    };
                    if let Some(request) = request {
                        self.serve_sif(request).await;
                    }
                }
                Ok(exchange) => {
                    tracing::trace!("Exchange finished: {:?}", exchange);
                }
                Err(A2jError::ConnectionClosed) => {
                    tracing::debug!("Transport closed, stopping engine");
                    return Ok(());
                }
                Err(e) => {
                    tracing::error!("Engine stopped: {}", e);
                    return Err(e);
                }
            }
        }
    }

    /// Encode `frame` completely, then write and flush it.
    async fn send(&mut self, frame: &Frame) -> Result<()> {
        let wire = frame.encode();
        for &b in wire.iter() {
            self.transport.write_byte(b)?;
        }
        self.transport.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Features;
    use crate::transport::StreamTransport;
    use tokio::io::{duplex, DuplexStream};

    fn transport() -> StreamTransport<DuplexStream> {
        let (device, _host) = duplex(64);
        StreamTransport::new(device)
    }

    #[test]
    fn test_builder_default_table() {
        let engine = EngineBuilder::new()
            .bounded("app", |_: &mut PayloadBuffer| 0)
            .build(transport())
            .unwrap();

        assert_eq!(engine.table().len(), 6);
        assert_eq!(engine.table().offset_of("app"), Some(5));
        assert_eq!(engine.sif_sequence(), 0);
    }

    #[test]
    fn test_builder_without_features() {
        let config = EngineConfig {
            features: Features::none(),
            ..EngineConfig::default()
        };
        let engine = EngineBuilder::new()
            .config(config)
            .bounded("a", |_: &mut PayloadBuffer| 0)
            .chunked("b", |_: &mut ManyChunk<'_>| 0)
            .build(transport())
            .unwrap();

        assert_eq!(engine.table().len(), 2);
        assert_eq!(engine.table().name(0), None);
    }

    #[test]
    fn test_config_keeps_earlier_properties() {
        let engine = EngineBuilder::new()
            .property("A", "1")
            .config(EngineConfig::default())
            .property("B", "2")
            .build(transport())
            .unwrap();

        assert_eq!(
            engine.config().properties,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn test_byte_timeout_override() {
        let engine = EngineBuilder::new()
            .byte_timeout(Duration::from_millis(25))
            .build(transport())
            .unwrap();
        assert_eq!(engine.config().byte_timeout(), Duration::from_millis(25));
    }

    #[test]
    fn test_byte_timeout_saturates() {
        let engine = EngineBuilder::new()
            .byte_timeout(Duration::MAX)
            .build(transport())
            .unwrap();
        assert_eq!(engine.config().byte_timeout_ms, u64::MAX);
    }
}
