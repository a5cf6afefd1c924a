use async_trait::async_trait;
use config::UpstreamConfig;
use eventsource_stream::Eventsource;
use futures::{StreamExt, future};
use reqwest::{
    Client, RequestBuilder,
    header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
use secrecy::{ExposeSecret, SecretString};

use crate::{
    error::{LlmError, LlmResult},
    messages::openai::{ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, Model, ModelsResponse},
    provider::{ChatCompletionStream, Provider, http_client::default_http_client_builder},
    request::RequestContext,
};

const HTTP_REFERER: HeaderName = HeaderName::from_static("http-referer");
const X_TITLE: HeaderName = HeaderName::from_static("x-title");

/// OpenRouter, or any other OpenAI-compatible chat completions endpoint.
pub(crate) struct OpenAIProvider {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl OpenAIProvider {
    pub fn new(config: &UpstreamConfig) -> LlmResult<Self> {
        let mut headers = HeaderMap::new();

        let attribution = [(HTTP_REFERER, config.referer.as_deref()), (X_TITLE, config.title.as_deref())];

        for (name, value) in attribution {
            let Some(value) = value else { continue };

            match HeaderValue::from_str(value) {
                Ok(value) => {
                    headers.insert(name, value);
                }
                Err(e) => log::warn!("Ignoring invalid value for the {name} header: {e}"),
            }
        }

        let client = default_http_client_builder(headers, config.timeout)
            .build()
            .map_err(|e| {
                log::error!("Failed to create HTTP client for the upstream provider: {e}");
                LlmError::InternalError(None)
            })?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Builds an authenticated chat completions call.
    ///
    /// The configured key wins over the one the caller sent.
    fn chat_request(&self, request: &ChatCompletionRequest, context: &RequestContext) -> LlmResult<RequestBuilder> {
        let Some(key) = self.api_key.as_ref().or(context.api_key.as_ref()) else {
            return Err(LlmError::AuthenticationFailed(
                "No API key configured and none provided in x-api-key or Authorization".to_string(),
            ));
        };

        let body = sonic_rs::to_vec(request)
            .map_err(|e| LlmError::InvalidRequest(format!("Failed to serialize request: {e}")))?;

        Ok(self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", key.expose_secret()))
            .header(CONTENT_TYPE, "application/json")
            .body(body))
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    async fn chat_completion(
        &self,
        request: ChatCompletionRequest,
        context: &RequestContext,
    ) -> LlmResult<ChatCompletionResponse> {
        let response = self
            .chat_request(&request, context)?
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(format!("Failed to send request to upstream: {e}")))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("Upstream API error ({status}): {error_text}");

            return Err(LlmError::from_upstream(status.as_u16(), error_text));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| LlmError::ConnectionError(format!("Failed to read upstream response body: {e}")))?;

        sonic_rs::from_str(&response_text).map_err(|e| {
            log::error!("Failed to parse upstream chat completion response: {e}");
            log::debug!("Response parsing failed, length: {} bytes", response_text.len());

            LlmError::InvalidUpstreamResponse(format!("Failed to parse chat completion: {e}"))
        })
    }

    async fn chat_completion_stream(
        &self,
        request: ChatCompletionRequest,
        context: &RequestContext,
    ) -> LlmResult<ChatCompletionStream> {
        let response = self
            .chat_request(&request, context)?
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(format!("Failed to send streaming request to upstream: {e}")))?;

        let status = response.status();

        // Check for HTTP errors before attempting to stream
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("Upstream streaming API error ({status}): {error_text}");

            return Err(LlmError::from_upstream(status.as_u16(), error_text));
        }

        let chunk_stream = response
            .bytes_stream()
            .eventsource()
            // `[DONE]` ends the stream even when the upstream keeps the connection open.
            .take_while(|event| future::ready(!matches!(event, Ok(e) if e.data == "[DONE]")))
            .filter_map(|event| async move {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => return Some(Err(LlmError::ConnectionError(format!("Upstream stream failed: {e}")))),
                };

                let chunk = match sonic_rs::from_str::<ChatCompletionChunk>(&event.data) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        log::debug!("Unparseable upstream chunk: {}", event.data);

                        return Some(Err(LlmError::InvalidUpstreamResponse(format!(
                            "Failed to parse streaming chunk: {e}"
                        ))));
                    }
                };

                match chunk.error {
                    Some(error) => {
                        let status = error
                            .code
                            .as_ref()
                            .and_then(|code| code.as_u64())
                            .and_then(|code| u16::try_from(code).ok())
                            .unwrap_or(502);

                        Some(Err(LlmError::from_upstream(status, error.message)))
                    }
                    None => Some(Ok(chunk)),
                }
            });

        Ok(Box::pin(chunk_stream))
    }

    async fn list_models(&self) -> anyhow::Result<Vec<Model>> {
        let mut request = self.client.get(format!("{}/models", self.base_url));

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            anyhow::bail!("upstream answered the model listing with status {status}");
        }

        let body = response.text().await?;
        let models: ModelsResponse = sonic_rs::from_str(&body)?;

        Ok(models.data)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
