//! # arduino2j
//!
//! Framed request/response protocol engine for exposing device operations to
//! a host over a serial or USB byte stream.
//!
//! ## Architecture
//!
//! - **Frames**: `SOF, seq, cmd, len, payload, checksum`, byte-stuffed so the
//!   start markers never appear inside a frame
//! - **Command table**: a one-byte offset selects a handler; Bounded handlers
//!   get the payload buffer, Chunked handlers are reached through the Many
//!   sub-protocol and can stream objects far larger than one frame
//! - **Server-initiated frames**: unsolicited `SOS` frames, serialized against
//!   replies by a single busy flag
//!
//! ## Example
//!
//! ```ignore
//! use arduino2j::{EngineBuilder, PayloadBuffer};
//! use arduino2j::transport::StreamTransport;
//!
//! #[tokio::main]
//! async fn main() -> arduino2j::Result<()> {
//!     let mut engine = EngineBuilder::new()
//!         .property("BOARD", "uno")
//!         .bounded("add", |payload: &mut PayloadBuffer| {
//!             let sum = payload.as_slice().iter().fold(0u8, |a, &b| a.wrapping_add(b));
//!             payload.try_fill(&[sum]).map_or(0xFF, |()| 0)
//!         })
//!         .build(StreamTransport::new(open_serial_port()?))?;
//!
//!     engine.run().await
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod transport;

mod busy;
mod engine;

pub use busy::{BusyFlag, BusyGuard};
pub use config::{EngineConfig, Features};
pub use engine::{Engine, EngineBuilder, Exchange, SifHandle};
pub use error::{A2jError, Result};
pub use handler::{ManyChunk, PayloadBuffer};
