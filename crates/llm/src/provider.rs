pub(crate) mod http_client;
pub(crate) mod openai;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::{
    error::LlmResult,
    messages::openai::{ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, Model},
    request::RequestContext,
};

/// Chunks of a streamed chat completion, in arrival order.
pub(crate) type ChatCompletionStream = Pin<Box<dyn Stream<Item = LlmResult<ChatCompletionChunk>> + Send>>;

/// An upstream speaking the OpenAI chat completions protocol.
#[async_trait]
pub(crate) trait Provider: Send + Sync {
    /// Sends a request and waits for the whole response.
    async fn chat_completion(
        &self,
        request: ChatCompletionRequest,
        context: &RequestContext,
    ) -> LlmResult<ChatCompletionResponse>;

    /// Sends a request and returns the chunk stream once the upstream accepted it.
    ///
    /// Errors returned here happen before any byte reached the caller. Failures after
    /// that point are items of the stream.
    async fn chat_completion_stream(
        &self,
        request: ChatCompletionRequest,
        context: &RequestContext,
    ) -> LlmResult<ChatCompletionStream>;

    /// Lists the models the upstream serves.
    async fn list_models(&self) -> anyhow::Result<Vec<Model>>;

    fn name(&self) -> &str;
}
