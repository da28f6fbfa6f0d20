//! Draining a response body into memory.
//!
//! This is the only place the normalizer blocks on the transport. The body is
//! read to end-of-stream into a private buffer; the buffer only becomes page
//! content once the whole read succeeded, so an interrupted read never leaves
//! partial bytes behind.
use std::io::Read;

use bytes::Bytes;

use crate::error::LoadError;

// Ceiling on the pre-allocation taken from a Content-Length header. The
// header is untrusted; anything larger grows on demand.
const MAX_PREALLOC_BYTES: usize = 8 * 1024 * 1024;

/// Reads `body` to the end.
///
/// `size_hint` (usually `Content-Length`) only sizes the initial buffer.
/// With a `limit`, at most `limit + 1` bytes are pulled from the transport:
/// enough to tell an exact fit from an overflow without draining an
/// arbitrarily large body.
pub(crate) fn drain_body<R: Read>(
    body: R,
    size_hint: Option<usize>,
    limit: Option<usize>,
) -> Result<Bytes, LoadError> {
    let capacity = size_hint
        .map(|hint| hint.min(limit.unwrap_or(usize::MAX)))
        .unwrap_or(0)
        .min(MAX_PREALLOC_BYTES);
    let mut buf = Vec::with_capacity(capacity);

    match limit {
        Some(limit) => {
            let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
            let read = body.take(cap).read_to_end(&mut buf)?;
            if read > limit {
                return Err(LoadError::BodyTooLarge { limit });
            }
        }
        None => {
            let mut body = body;
            body.read_to_end(&mut buf)?;
        }
    }

    Ok(Bytes::from(buf))
}

/// Parses a `Content-Length` value; garbage yields no hint.
pub(crate) fn content_length_hint(value: Option<&str>) -> Option<usize> {
    value.and_then(|v| v.trim().parse::<usize>().ok())
}
