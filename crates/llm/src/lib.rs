//! Anthropic Messages API in front of an OpenAI-compatible chat completions upstream.

use std::{convert::Infallible, sync::Arc};

use axum::{
    Router,
    body::Bytes,
    extract::{Json, Path, State},
    http::HeaderMap,
    response::{
        IntoResponse, Sse,
        sse::{Event, KeepAlive},
    },
    routing::{get, post},
};
use futures::StreamExt;
use messages::anthropic;
use serde::de::DeserializeOwned;

mod catalog;
mod error;
mod messages;
mod model_map;
mod provider;
mod request;
mod server;
mod token_counter;
mod transform;

pub use error::{LlmError, LlmResult as Result};
use server::{LlmHandler, LlmServerBuilder};

/// Creates an axum router for the Anthropic Messages endpoints.
pub async fn router(config: &config::Config) -> anyhow::Result<Router> {
    let server = Arc::new(
        LlmServerBuilder::new(config)
            .build()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to initialize the messages bridge: {e}"))?,
    );

    let router = Router::new()
        .route("/v1/messages", post(messages))
        .route("/v1/messages/count_tokens", post(count_tokens))
        .route("/v1/models", get(list_models))
        .route("/v1/models/{*model_id}", get(get_model))
        .with_state(server);

    Ok(router)
}

/// Handle Anthropic messages requests.
///
/// When `stream: true` is set in the request, the response is sent as Server-Sent Events,
/// otherwise as a single JSON message.
async fn messages(State(server): State<Arc<LlmHandler>>, headers: HeaderMap, body: Bytes) -> Result<impl IntoResponse> {
    let request: anthropic::AnthropicChatRequest = parse_body(&body)?;

    log::debug!(
        "Messages handler called for model '{}' with {} messages",
        request.model,
        request.messages.len()
    );

    let context = request::extract_context(&headers);

    if !request.stream.unwrap_or(false) {
        let response = server.messages(request, &context).await?;

        log::debug!("Messages completion successful, stop reason: {:?}", response.stop_reason);

        return Ok(Json(response).into_response());
    }

    let stream = server.messages_stream(request, &context).await?;

    let event_stream = stream.map(|event| {
        let json = sonic_rs::to_string(&event).unwrap_or_else(|e| {
            log::error!("Failed to serialize Anthropic streaming event: {e}");
            r#"{"type":"error","error":{"type":"api_error","message":"serialization failed"}}"#.to_string()
        });

        Ok::<_, Infallible>(Event::default().event(event.event_name()).data(json))
    });

    log::debug!("Returning Anthropic streaming response");

    Ok(Sse::new(event_stream).keep_alive(KeepAlive::default()).into_response())
}

/// Handle token counting requests with a local estimate.
async fn count_tokens(State(server): State<Arc<LlmHandler>>, body: Bytes) -> Result<impl IntoResponse> {
    let request: anthropic::AnthropicChatRequest = parse_body(&body)?;

    Ok(Json(server.count_tokens(&request)))
}

async fn list_models(State(server): State<Arc<LlmHandler>>) -> impl IntoResponse {
    let response = server.models();

    log::debug!("Returning {} models", response.data.len());

    Json(response)
}

async fn get_model(State(server): State<Arc<LlmHandler>>, Path(model_id): Path<String>) -> impl IntoResponse {
    Json(server.model(&model_id))
}

/// Parses a JSON body, rejecting it in Anthropic error format.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    sonic_rs::from_slice(body).map_err(|e| {
        log::debug!("Rejecting request body: {e}");
        LlmError::InvalidRequest(format!("Failed to parse request body: {e}"))
    })
}
