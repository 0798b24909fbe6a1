//! The seam between a chat session and the backend that answers it.

use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;

use crate::Result;
use crate::types::ChatRequest;

/// A response body delivered chunk by chunk.  End of stream is the only terminator.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Something that can start a streamed chat response.
///
/// [`crate::ClaimsClient`] implements this over HTTP; tests script it in memory.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    /// Issue `request` and return its response body.  Errors here mean the request never
    /// started streaming.
    async fn open_chat(&self, request: ChatRequest) -> Result<ByteStream>;
}

#[async_trait::async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for std::sync::Arc<T> {
    async fn open_chat(&self, request: ChatRequest) -> Result<ByteStream> {
        (**self).open_chat(request).await
    }
}
