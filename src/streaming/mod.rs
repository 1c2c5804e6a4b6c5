//! Streaming types and helpers

mod aggregator;

use std::pin::Pin;

use futures::{Stream, StreamExt};

pub use aggregator::StreamAggregator;

use crate::error::LlmError;
use crate::types::{ChatChunk, ChatResponse};

/// Chunk stream returned by providers and sessions.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatChunk, LlmError>> + Send>>;

/// Drain `stream` and aggregate it. The first error ends the drain.
pub async fn collect_stream<S>(stream: S) -> Result<ChatResponse, LlmError>
where
    S: Stream<Item = Result<ChatChunk, LlmError>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut aggregator = StreamAggregator::new();
    while let Some(chunk) = stream.next().await {
        aggregator.process_chunk(&chunk?);
    }
    Ok(aggregator.into_response())
}

/// A stream of pre-built chunks.
pub fn from_chunks(chunks: Vec<ChatChunk>) -> ChatStream {
    Box::pin(futures::stream::iter(chunks.into_iter().map(Ok)))
}
