//! Handler module - command table, calling conventions and built-ins.
//!
//! Provides:
//! - [`CommandTable`] - maps one-byte command offsets to handlers
//! - [`PayloadBuffer`] / [`ManyChunk`] - what Bounded and Chunked handlers see
//! - [`PropertyTable`] - static key/value strings served through Many reads
//!
//! # Example
//!
//! ```
//! use arduino2j::config::Features;
//! use arduino2j::handler::{CommandTable, ManyChunk, PayloadBuffer, PropertyTable};
//!
//! let table = CommandTable::builder()
//!     .builtins(&Features::default(), PropertyTable::from_pairs([("FW", "1.0")]))
//!     .bounded("led", |payload: &mut PayloadBuffer| {
//!         payload.clear();
//!         0
//!     })
//!     .chunked("eeprom", |chunk: &mut ManyChunk<'_>| {
//!         chunk.is_last = true;
//!         0
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(table.offset_of("led"), Some(5));
//! assert_eq!(table.offset_of("eeprom"), Some(6));
//! ```

mod builtin;
mod many;
mod payload;
mod table;

pub use builtin::{
    echo, echo_many, PropertyTable, ECHO_MANY_NAME, ECHO_NAME, MANY_NAME, MAPPING_NAME,
    PROPERTIES_NAME,
};
pub use payload::{ManyChunk, PayloadBuffer};
pub use table::{
    BoundedHandler, ChunkedHandler, CommandTable, Convention, Dispatch, TableBuilder, MAX_ENTRIES,
};
