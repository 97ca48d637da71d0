//! Device-side Many dispatcher.
//!
//! A Many call is a Bounded call whose payload starts with a [`ManyHeader`].
//! The header names a Chunked entry of the same command table; the rest of the
//! payload is the chunk. The reply reuses the header: the function byte carries
//! the chunked handler's return value, the IS_LAST bit and the offset carry
//! whatever the handler left in the chunk.

use super::payload::{ManyChunk, PayloadBuffer};
use super::table::{CommandTable, Convention};
use crate::protocol::{codes, many_flags, ManyHeader, MANY_HEADER_SIZE};

/// Run one Many call against `table`, rewriting `payload` into the reply.
///
/// Returns OK when the chunked handler ran, FAILURE when the payload is too
/// short for a header (payload untouched) and OOB when the header names an
/// entry that is missing or not Chunked (payload length zeroed).
pub(crate) fn dispatch(table: &mut CommandTable, payload: &mut PayloadBuffer) -> u8 {
    let len = payload.len();
    let header = match ManyHeader::decode(payload.as_slice()) {
        Some(header) => header,
        None => {
            tracing::debug!("Many payload of {} bytes is shorter than its header", len);
            return codes::FAILURE;
        }
    };

    if table.convention(header.function) != Some(Convention::Chunked) {
        tracing::debug!("Many target {} is not a chunked handler", header.function);
        payload.set_len(0);
        return codes::OOB;
    }

    let (head, body) = payload.raw_mut().split_at_mut(MANY_HEADER_SIZE);
    let mut chunk = ManyChunk::new(
        header.is_last(),
        header.is_write(),
        header.offset,
        body,
        len - MANY_HEADER_SIZE,
    );

    let ret = match table.call_chunked(header.function, &mut chunk) {
        Some(ret) => ret,
        None => {
            payload.set_len(0);
            return codes::OOB;
        }
    };

    let mut flags = header.flags & !many_flags::IS_LAST;
    if chunk.is_last {
        flags |= many_flags::IS_LAST;
    }
    let reply = ManyHeader {
        function: ret,
        flags,
        offset: chunk.offset,
    };
    let chunk_len = chunk.len();
    reply.encode_into(head);
    payload.set_len(chunk_len + MANY_HEADER_SIZE);

    codes::OK
}
