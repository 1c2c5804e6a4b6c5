//! Streaming turn loop.

use futures::{Stream, StreamExt};
use tracing::Instrument;

use super::turn::{TurnSettings, TurnState};
use super::{AskOptions, ChatSession};
use crate::error::LlmError;
use crate::retry::{maybe_retry, with_timeout};
use crate::streaming::{ChatStream, StreamAggregator};
use crate::types::{ChatChunk, ChatMessage, ChatRequest, MessageContent};

impl ChatSession {
    /// Like [`ask`](Self::ask), but yields chunks as the provider produces
    /// them.
    ///
    /// Every round is streamed, including the ones after tool execution.
    /// History is committed once per completed round, so dropping the stream
    /// part-way leaves the interrupted round out of history. Providers that
    /// cannot stream are called with `chat` and surface as a single chunk.
    /// A provider stream that ends before its first chunk is a `StreamError`.
    pub fn stream(
        &mut self,
        content: impl Into<MessageContent>,
        options: AskOptions,
    ) -> impl Stream<Item = Result<ChatChunk, LlmError>> + Send + '_ {
        let user = ChatMessage::user(content).build();

        async_stream::try_stream! {
            let settings = self.settings(&options)?;
            let span = tracing::info_span!(
                "stream",
                provider = %self.provider.id(),
                model = %self.model,
                request_id = %settings.request_id
            );
            let pipeline = self.pipeline();
            let mut state = TurnState::new(user);

            loop {
                let (ctx, request) = self
                    .prepare_round(&settings, &pipeline, &state, true)
                    .instrument(span.clone())
                    .await?;

                let mut aggregator = StreamAggregator::new();
                if self.provider.supports_streaming() {
                    let mut chunks = self
                        .open_stream(&settings, request)
                        .instrument(span.clone())
                        .await?;
                    loop {
                        let next = with_timeout(settings.timeout, async {
                            Ok::<_, LlmError>(chunks.next().await)
                        })
                        .await?;
                        let Some(chunk) = next else { break };
                        let chunk = chunk?;
                        if aggregator.process_chunk(&chunk) {
                            self.events.new_message();
                        }
                        yield chunk;
                    }
                    if !aggregator.is_started() {
                        Err::<(), _>(LlmError::StreamError(
                            "provider stream ended without any chunk".into(),
                        ))?;
                    }
                } else {
                    let response = self
                        .call_provider(&settings, request)
                        .instrument(span.clone())
                        .await?;
                    let chunk = ChatChunk::from(response);
                    if aggregator.process_chunk(&chunk) {
                        self.events.new_message();
                    }
                    yield chunk;
                }

                tracing::debug!(parent: &span, chunks = aggregator.chunk_count(), "stream drained");
                let response = aggregator.into_response();
                if self
                    .finish_round(&settings, &pipeline, &ctx, response, &mut state)
                    .instrument(span.clone())
                    .await?
                    .is_some()
                {
                    break;
                }
            }
        }
    }

    /// Open the provider stream under the retry policy. Only opening is
    /// retried; a stream that fails mid-way ends the call.
    async fn open_stream(
        &self,
        settings: &TurnSettings,
        request: ChatRequest,
    ) -> Result<ChatStream, LlmError> {
        let provider = self.provider.as_ref();
        let timeout = settings.timeout;
        maybe_retry(self.retry.as_ref(), || {
            with_timeout(timeout, provider.stream(request.clone()))
        })
        .await
    }
}
