//! Incremental UTF-8 decoding of streamed chat responses.
//!
//! The chat endpoint streams plain text with no framing of its own; transport chunk boundaries
//! fall wherever the network puts them, including in the middle of a multi-byte character.  This
//! module turns a byte stream into a stream of decoded text chunks without corrupting or dropping
//! those characters.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::Result;
use crate::observability::{STREAM_BYTES, STREAM_CHUNKS, STREAM_ERRORS};

/// Stateful UTF-8 decoder that carries incomplete sequences across calls.
///
/// Invalid sequences decode to U+FFFD rather than failing.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if bytes of an incomplete character are buffered.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Decode the next chunk, buffering a trailing partial character for the next call.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut text = String::with_capacity(self.pending.len());
        let mut start = 0;
        loop {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(valid) => {
                    text.push_str(valid);
                    start = self.pending.len();
                    break;
                }
                Err(err) => {
                    let valid_up_to = start + err.valid_up_to();
                    text.push_str(
                        std::str::from_utf8(&self.pending[start..valid_up_to]).unwrap_or_default(),
                    );
                    match err.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            start = valid_up_to + len;
                        }
                        None => {
                            // Incomplete sequence at the end; wait for more bytes.
                            start = valid_up_to;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..start);
        text
    }

    /// Flush whatever is buffered at end of stream.  An incomplete trailing sequence becomes
    /// U+FFFD.
    pub fn finish(&mut self) -> String {
        let pending = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&pending).into_owned()
    }
}

/// Decode a stream of bytes into a stream of text chunks.
///
/// Each non-empty decoded transport chunk is yielded in receipt order.  At end of stream any
/// buffered partial character is flushed.  A transport error is yielded as-is and ends the
/// stream; buffered partial bytes are discarded rather than flushed.
pub fn decode_stream<S>(byte_stream: S) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    stream::unfold(
        Some((byte_stream, Utf8StreamDecoder::new())),
        |state| async move {
            let (mut byte_stream, mut decoder) = state?;
            loop {
                match byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        STREAM_BYTES.count(bytes.len() as u64);
                        let text = decoder.decode(&bytes);
                        if !text.is_empty() {
                            STREAM_CHUNKS.click();
                            return Some((Ok(text), Some((byte_stream, decoder))));
                        }
                    }
                    Some(Err(err)) => {
                        STREAM_ERRORS.click();
                        return Some((Err(err), None));
                    }
                    None => {
                        let text = decoder.finish();
                        if text.is_empty() {
                            return None;
                        }
                        STREAM_CHUNKS.click();
                        return Some((Ok(text), None));
                    }
                }
            }
        },
    )
}
