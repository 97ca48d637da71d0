//! Host-side helpers for the Many sub-protocol.
//!
//! A logical object larger than one frame travels as a sequence of Many
//! frames, each carrying a [`ManyHeader`] and up to [`MANY_PAYLOAD`] bytes.

use bytes::{BufMut, Bytes, BytesMut};

use super::wire_format::{ManyHeader, MANY_HEADER_SIZE, MANY_PAYLOAD};

/// Split `data` into Many request payloads for the chunked handler at `function`.
///
/// Offsets advance by the chunk size; only the final chunk is marked last.
/// An empty `data` yields a single empty, last chunk.
///
/// # Example
///
/// ```
/// use arduino2j::protocol::{many_payloads, ManyHeader};
///
/// let blob = vec![7u8; 300];
/// let payloads = many_payloads(4, &blob, true);
/// assert_eq!(payloads.len(), 2);
///
/// let second = ManyHeader::decode(&payloads[1]).unwrap();
/// assert_eq!(second.offset, 249);
/// assert!(second.is_last());
/// ```
pub fn many_payloads(function: u8, data: &[u8], is_write: bool) -> Vec<Bytes> {
    if data.is_empty() {
        return vec![many_payload(ManyHeader::new(function, 0, true, is_write), &[])];
    }

    let count = data.len().div_ceil(MANY_PAYLOAD);
    data.chunks(MANY_PAYLOAD)
        .enumerate()
        .map(|(i, chunk)| {
            let offset = (i * MANY_PAYLOAD) as u32;
            let header = ManyHeader::new(function, offset, i + 1 == count, is_write);
            many_payload(header, chunk)
        })
        .collect()
}

/// Build one Many payload from a header and a chunk.
///
/// # Panics
///
/// Panics if `chunk` is longer than [`MANY_PAYLOAD`].
pub fn many_payload(header: ManyHeader, chunk: &[u8]) -> Bytes {
    assert!(chunk.len() <= MANY_PAYLOAD, "many chunk over 249 bytes");
    let mut buf = BytesMut::with_capacity(MANY_HEADER_SIZE + chunk.len());
    buf.put_slice(&header.encode());
    buf.put_slice(chunk);
    buf.freeze()
}

/// Split a Many reply payload into its header and chunk.
pub fn split_many_reply(payload: &[u8]) -> Option<(ManyHeader, &[u8])> {
    let header = ManyHeader::decode(payload)?;
    Some((header, &payload[MANY_HEADER_SIZE..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_300_bytes() {
        let blob: Vec<u8> = (0..300u32).map(|i| i as u8).collect();
        let payloads = many_payloads(3, &blob, true);

        assert_eq!(payloads.len(), 2);

        let (first, first_chunk) = split_many_reply(&payloads[0]).unwrap();
        assert_eq!(first.function, 3);
        assert_eq!(first.offset, 0);
        assert!(!first.is_last());
        assert!(first.is_write());
        assert_eq!(first_chunk.len(), 249);

        let (second, second_chunk) = split_many_reply(&payloads[1]).unwrap();
        assert_eq!(second.offset, 249);
        assert!(second.is_last());
        assert_eq!(second_chunk.len(), 51);

        let mut joined = first_chunk.to_vec();
        joined.extend_from_slice(second_chunk);
        assert_eq!(joined, blob);
    }

    #[test]
    fn test_exact_multiple_has_no_empty_tail() {
        let payloads = many_payloads(1, &[0u8; MANY_PAYLOAD * 2], false);
        assert_eq!(payloads.len(), 2);
        assert!(ManyHeader::decode(&payloads[1]).unwrap().is_last());
    }

    #[test]
    fn test_empty_data_single_last_chunk() {
        let payloads = many_payloads(1, &[], false);
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].len(), MANY_HEADER_SIZE);
        assert!(ManyHeader::decode(&payloads[0]).unwrap().is_last());
    }

    #[test]
    fn test_split_reply_too_short() {
        assert!(split_many_reply(&[1, 2, 3]).is_none());
    }
}
