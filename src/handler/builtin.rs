//! Built-in handlers: name mapping, property table, echo.

use super::payload::{ManyChunk, PayloadBuffer};
use super::table::{ChunkedHandler, CommandTable};
use crate::protocol::codes;

pub const MAPPING_NAME: &str = "a2jGetMapping";
pub const MANY_NAME: &str = "a2jMany";
pub const PROPERTIES_NAME: &str = "a2jGetProperties";
pub const ECHO_NAME: &str = "a2jEcho";
pub const ECHO_MANY_NAME: &str = "a2jEchoMany";

/// Serialize every entry name, NUL-terminated, in table order.
///
/// Unnamed entries contribute an empty string. When the next name does not
/// fit, the payload keeps the names already written and FAILURE is returned;
/// a name is never truncated.
pub(crate) fn write_mapping(table: &CommandTable, payload: &mut PayloadBuffer) -> u8 {
    payload.clear();
    for name in table.names() {
        let name = name.unwrap_or("").as_bytes();
        let written = payload.len();
        if written + name.len() + 1 > payload.capacity() {
            tracing::debug!("Name mapping truncated after {} bytes", written);
            return codes::FAILURE;
        }
        for &b in name {
            payload.push(b);
        }
        payload.push(0);
    }
    codes::OK
}

/// Returns the payload unchanged.
pub fn echo(_payload: &mut PayloadBuffer) -> u8 {
    codes::OK
}

/// Returns the chunk, offset and flags unchanged.
pub fn echo_many(_chunk: &mut ManyChunk<'_>) -> u8 {
    codes::OK
}

/// Static key/value strings served through Many reads.
///
/// Serialized as `key\0value\0key\0value\0...`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyTable {
    blob: Vec<u8>,
}

impl PropertyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from ordered pairs.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut table = Self::new();
        for (key, value) in pairs {
            table.insert(key.as_ref(), value.as_ref());
        }
        table
    }

    /// Append one pair.
    pub fn insert(&mut self, key: &str, value: &str) {
        self.blob.extend_from_slice(key.as_bytes());
        self.blob.push(0);
        self.blob.extend_from_slice(value.as_bytes());
        self.blob.push(0);
    }

    /// The serialized table.
    pub fn as_bytes(&self) -> &[u8] {
        &self.blob
    }

    /// Serialized size in bytes.
    pub fn len(&self) -> usize {
        self.blob.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blob.is_empty()
    }
}

impl ChunkedHandler for PropertyTable {
    fn call(&mut self, chunk: &mut ManyChunk<'_>) -> u8 {
        if chunk.is_write() {
            chunk.set_len(0);
            return codes::FAILURE;
        }

        let start = (chunk.offset as usize).min(self.blob.len());
        let end = (start + chunk.capacity()).min(self.blob.len());
        let window = &self.blob[start..end];
        chunk.raw_mut()[..window.len()].copy_from_slice(window);
        chunk.set_len(window.len());
        chunk.is_last = end == self.blob.len();
        codes::OK
    }
}
