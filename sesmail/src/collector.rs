//! Materialises a message byte source into the raw text the remote API expects

use std::io;

use futures_util::{Stream, StreamExt};
use sesmail_common::tracing;

use crate::error::CollectError;

/// Drain `source` into a single buffer and return it as text.
///
/// Chunks are appended in the order they are produced. The first error from
/// the source aborts collection and is returned in place of the text; the
/// remainder of the source is dropped unread. Bytes that are not valid UTF-8
/// are replaced rather than rejected.
///
/// # Errors
///
/// If the source yields an error before its end-of-data.
pub async fn collect<S, B>(source: S) -> Result<String, CollectError>
where
    S: Stream<Item = io::Result<B>>,
    B: AsRef<[u8]>,
{
    let mut source = std::pin::pin!(source);
    let mut buffer = Vec::new();

    while let Some(chunk) = source.next().await {
        buffer.extend_from_slice(chunk?.as_ref());
    }

    Ok(String::from_utf8(buffer).unwrap_or_else(|err| {
        tracing::warn!(
            valid_up_to = err.utf8_error().valid_up_to(),
            "Message is not valid UTF-8, replacing invalid sequences"
        );
        String::from_utf8_lossy(err.as_bytes()).into_owned()
    }))
}
