//! Command table for dispatching requests by offset.
//!
//! The table maps the one-byte command offset of a request to a handler.
//! Entries are registered once through [`TableBuilder`] in a fixed order
//! (built-ins first, then application handlers) and never change afterwards.
//!
//! # Example
//!
//! ```
//! use arduino2j::handler::{CommandTable, Convention, PayloadBuffer};
//!
//! let table = CommandTable::builder()
//!     .bounded("double", |payload: &mut PayloadBuffer| {
//!         for b in payload.as_mut_slice() {
//!             *b = b.wrapping_mul(2);
//!         }
//!         0
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(table.offset_of("double"), Some(0));
//! assert_eq!(table.convention(0), Some(Convention::Bounded));
//! ```

use super::builtin::{self, PropertyTable};
use super::many;
use super::payload::{ManyChunk, PayloadBuffer};
use crate::config::Features;
use crate::error::{A2jError, Result};
use crate::protocol::codes;

/// Maximum number of entries addressable by a one-byte offset.
pub const MAX_ENTRIES: usize = 256;

/// Handler for the Bounded calling convention.
///
/// Receives the request payload and replaces it with the reply payload. The
/// return value becomes the reply's return code.
pub trait BoundedHandler: Send {
    fn call(&mut self, payload: &mut PayloadBuffer) -> u8;
}

impl<F> BoundedHandler for F
where
    F: FnMut(&mut PayloadBuffer) -> u8 + Send,
{
    fn call(&mut self, payload: &mut PayloadBuffer) -> u8 {
        self(payload)
    }
}

/// Handler for the Chunked calling convention, reached through Many frames.
pub trait ChunkedHandler: Send {
    fn call(&mut self, chunk: &mut ManyChunk<'_>) -> u8;
}

impl<F> ChunkedHandler for F
where
    F: FnMut(&mut ManyChunk<'_>) -> u8 + Send,
{
    fn call(&mut self, chunk: &mut ManyChunk<'_>) -> u8 {
        self(chunk)
    }
}

/// Calling convention of a table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    Bounded,
    Chunked,
}

enum Slot {
    Bounded(Box<dyn BoundedHandler>),
    Chunked(Box<dyn ChunkedHandler>),
    /// The Many dispatcher (Bounded convention).
    Many,
    /// The name-mapping query (Bounded convention).
    Mapping,
}

#[derive(Clone, Copy)]
enum SlotKind {
    Bounded,
    Chunked,
    Many,
    Mapping,
}

impl Slot {
    fn kind(&self) -> SlotKind {
        match self {
            Slot::Bounded(_) => SlotKind::Bounded,
            Slot::Chunked(_) => SlotKind::Chunked,
            Slot::Many => SlotKind::Many,
            Slot::Mapping => SlotKind::Mapping,
        }
    }
}

struct Entry {
    slot: Slot,
    name: Option<String>,
}

/// Outcome of dispatching one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Send a reply with this return code and the buffer's payload.
    Reply(u8),
    /// Answer with an OOB error frame instead of a reply.
    Rejected,
}

/// Immutable offset-indexed registry of handlers.
pub struct CommandTable {
    entries: Vec<Entry>,
}

impl CommandTable {
    /// Start building a table.
    pub fn builder() -> TableBuilder {
        TableBuilder::new()
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if `offset` addresses an entry.
    #[inline]
    pub fn contains(&self, offset: u8) -> bool {
        (offset as usize) < self.entries.len()
    }

    /// Calling convention of the entry at `offset`.
    pub fn convention(&self, offset: u8) -> Option<Convention> {
        self.entries.get(offset as usize).map(|e| match e.slot.kind() {
            SlotKind::Chunked => Convention::Chunked,
            _ => Convention::Bounded,
        })
    }

    /// Display name of the entry at `offset`.
    pub fn name(&self, offset: u8) -> Option<&str> {
        self.entries.get(offset as usize)?.name.as_deref()
    }

    /// Offset of the entry registered as `name`.
    pub fn offset_of(&self, name: &str) -> Option<u8> {
        self.entries
            .iter()
            .position(|e| e.name.as_deref() == Some(name))
            .map(|i| i as u8)
    }

    /// Names in table order; `None` for unnamed entries.
    pub fn names(&self) -> impl Iterator<Item = Option<&str>> + '_ {
        self.entries.iter().map(|e| e.name.as_deref())
    }

    /// Dispatch a Bounded-convention call to the entry at `offset`.
    ///
    /// Out-of-range offsets, direct calls to Chunked entries and a Many call
    /// that resolves to OOB are all [`Dispatch::Rejected`]; no handler runs
    /// for an out-of-range offset.
    pub fn dispatch(&mut self, offset: u8, payload: &mut PayloadBuffer) -> Dispatch {
        let kind = match self.entries.get(offset as usize) {
            Some(entry) => entry.slot.kind(),
            None => return Dispatch::Rejected,
        };

        match kind {
            SlotKind::Bounded => match &mut self.entries[offset as usize].slot {
                Slot::Bounded(handler) => Dispatch::Reply(handler.call(payload)),
                _ => Dispatch::Rejected,
            },
            SlotKind::Chunked => {
                tracing::debug!("Offset {} is a chunked handler, rejecting direct call", offset);
                Dispatch::Rejected
            }
            SlotKind::Many => match many::dispatch(self, payload) {
                codes::OOB => Dispatch::Rejected,
                ret => Dispatch::Reply(ret),
            },
            SlotKind::Mapping => Dispatch::Reply(builtin::write_mapping(self, payload)),
        }
    }

    /// Call the Chunked handler at `offset`. `None` if it is not one.
    pub(crate) fn call_chunked(&mut self, offset: u8, chunk: &mut ManyChunk<'_>) -> Option<u8> {
        match &mut self.entries.get_mut(offset as usize)?.slot {
            Slot::Chunked(handler) => Some(handler.call(chunk)),
            _ => None,
        }
    }
}

impl std::fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Builder registering table entries in order.
pub struct TableBuilder {
    entries: Vec<Entry>,
    keep_names: bool,
}

impl TableBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            keep_names: true,
        }
    }

    /// Register the built-in handlers selected by `features`.
    ///
    /// Order: name mapping, Many dispatcher, properties, echo, chunked echo.
    /// Disabled features are skipped and later entries move down.
    pub fn builtins(mut self, features: &Features, properties: PropertyTable) -> Self {
        self.keep_names = features.mapping;
        if features.mapping {
            self = self.push(Slot::Mapping, builtin::MAPPING_NAME);
        }
        if features.many {
            self = self.push(Slot::Many, builtin::MANY_NAME);
        }
        if features.properties {
            self = self.chunked_handler(builtin::PROPERTIES_NAME, properties);
        }
        if features.echo {
            self = self.bounded(builtin::ECHO_NAME, builtin::echo);
            self = self.chunked(builtin::ECHO_MANY_NAME, builtin::echo_many);
        }
        self
    }

    /// Register a Bounded handler.
    pub fn bounded<F>(self, name: &str, handler: F) -> Self
    where
        F: FnMut(&mut PayloadBuffer) -> u8 + Send + 'static,
    {
        self.push(Slot::Bounded(Box::new(handler)), name)
    }

    /// Register a Bounded handler implemented as a type.
    pub fn bounded_handler<H: BoundedHandler + 'static>(self, name: &str, handler: H) -> Self {
        self.push(Slot::Bounded(Box::new(handler)), name)
    }

    /// Register a Chunked handler, reachable through the Many dispatcher.
    pub fn chunked<F>(self, name: &str, handler: F) -> Self
    where
        F: FnMut(&mut ManyChunk<'_>) -> u8 + Send + 'static,
    {
        self.push(Slot::Chunked(Box::new(handler)), name)
    }

    /// Register a Chunked handler implemented as a type.
    pub fn chunked_handler<H: ChunkedHandler + 'static>(self, name: &str, handler: H) -> Self {
        self.push(Slot::Chunked(Box::new(handler)), name)
    }

    /// Register every entry of `other` after the current ones.
    pub fn append(mut self, other: TableBuilder) -> Self {
        self.entries.extend(other.entries);
        self
    }

    fn push(mut self, slot: Slot, name: &str) -> Self {
        self.entries.push(Entry {
            slot,
            name: Some(name.to_string()),
        });
        self
    }

    /// Number of entries registered so far; the next entry gets this offset.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finish the table.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if more than 256 entries were registered.
    pub fn build(mut self) -> Result<CommandTable> {
        if self.entries.len() > MAX_ENTRIES {
            return Err(A2jError::Protocol(format!(
                "Command table has {} entries, at most {} are addressable",
                self.entries.len(),
                MAX_ENTRIES
            )));
        }
        if !self.keep_names {
            for entry in &mut self.entries {
                entry.name = None;
            }
        }
        Ok(CommandTable {
            entries: self.entries,
        })
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}
