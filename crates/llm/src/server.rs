mod builder;

pub(crate) use builder::LlmServerBuilder;

use std::pin::Pin;

use futures::Stream;

use crate::{
    catalog::ModelCatalog,
    error::LlmResult,
    messages::anthropic::{
        AnthropicChatRequest, AnthropicChatResponse, AnthropicModel, AnthropicModelsResponse, AnthropicStreamEvent,
        AnthropicTokenCount,
    },
    model_map::ModelMapper,
    provider::Provider,
    request::RequestContext,
    token_counter,
    transform::{request, response, stream},
};

/// Anthropic stream events ready to be framed as SSE.
pub(crate) type AnthropicEventStream = Pin<Box<dyn Stream<Item = AnthropicStreamEvent> + Send>>;

/// Serves Anthropic Messages requests from an OpenAI-compatible upstream.
pub(crate) struct LlmHandler {
    provider: Box<dyn Provider>,
    mapper: ModelMapper,
    catalog: ModelCatalog,
}

impl LlmHandler {
    /// Non-streaming completion.
    pub(crate) async fn messages(
        &self,
        request: AnthropicChatRequest,
        context: &RequestContext,
    ) -> LlmResult<AnthropicChatResponse> {
        let requested_model = request.model.clone();
        let upstream_request = request::to_chat_completion(request, &self.mapper);

        log::info!(
            "Messages request for '{requested_model}' mapped to '{}', stream: false",
            upstream_request.model
        );

        let upstream_response = self.provider.chat_completion(upstream_request, context).await?;

        response::to_anthropic(upstream_response, requested_model)
    }

    /// Streaming completion.
    ///
    /// Fails only when the upstream rejects the request. Once the stream exists, every
    /// failure is reported in band.
    pub(crate) async fn messages_stream(
        &self,
        request: AnthropicChatRequest,
        context: &RequestContext,
    ) -> LlmResult<AnthropicEventStream> {
        let requested_model = request.model.clone();
        let estimated_input_tokens = token_counter::estimate_input_tokens(&request);
        let upstream_request = request::to_chat_completion(request, &self.mapper);

        log::info!(
            "Messages request for '{requested_model}' mapped to '{}', stream: true",
            upstream_request.model
        );

        let upstream = self.provider.chat_completion_stream(upstream_request, context).await?;
        let translator = stream::StreamTranslator::new(requested_model, estimated_input_tokens);

        Ok(Box::pin(stream::translate_stream(upstream, translator)))
    }

    pub(crate) fn count_tokens(&self, request: &AnthropicChatRequest) -> AnthropicTokenCount {
        AnthropicTokenCount {
            input_tokens: token_counter::estimate_input_tokens(request),
        }
    }

    pub(crate) fn models(&self) -> AnthropicModelsResponse {
        self.catalog.anthropic_models()
    }

    /// Looks a model up by its id, then by the id it maps to.
    ///
    /// Unknown ids still get an entry so clients validating their model name keep working.
    pub(crate) fn model(&self, id: &str) -> AnthropicModel {
        if let Some(model) = self.catalog.find(id) {
            return AnthropicModel::from(model);
        }

        let mapped = self.mapper.map(id);

        let display_name = match self.catalog.find(&mapped) {
            Some(model) => AnthropicModel::from(model).display_name,
            None => {
                log::debug!("Model '{id}' is not in the catalog, answering with a synthetic entry");
                mapped
            }
        };

        AnthropicModel {
            id: id.to_string(),
            model_type: "model".to_string(),
            display_name,
            created_at: jiff::Timestamp::UNIX_EPOCH.to_string(),
        }
    }
}
