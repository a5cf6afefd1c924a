//! Mock OpenAI-compatible chat completions upstream.

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::StreamExt;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// What the mock answers to chat completion requests.
#[derive(Debug, Clone)]
pub enum Reply {
    /// A JSON chat completion.
    Completion(Value),
    /// A server-sent event stream, one `data:` event per item, sent verbatim.
    Stream(Vec<String>),
    /// Like `Stream`, but the connection breaks after the last event.
    BrokenStream(Vec<String>),
    /// Like `Stream`, but the response body never ends.
    OpenStream(Vec<String>),
    /// An error status with a JSON body.
    Error(u16, Value),
}

/// A chat completion request as the mock received it.
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub authorization: Option<String>,
    pub referer: Option<String>,
    pub title: Option<String>,
    pub body: Value,
}

#[derive(Debug, Clone)]
pub struct UpstreamMock {
    reply: Reply,
    /// `None` makes the model listing fail.
    models: Option<Vec<Value>>,
    received: Arc<Mutex<Vec<ReceivedRequest>>>,
}

impl UpstreamMock {
    fn new(reply: Reply) -> Self {
        Self {
            reply,
            models: None,
            received: Arc::default(),
        }
    }

    /// Answers with the given chat completion.
    pub fn completion(response: Value) -> Self {
        Self::new(Reply::Completion(response))
    }

    /// Answers with a single choice carrying `text`.
    pub fn text(text: &str) -> Self {
        Self::completion(json!({
            "id": "gen-1",
            "object": "chat.completion",
            "model": "upstream-model",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": text },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13 }
        }))
    }

    /// Streams the chunks, followed by `[DONE]`.
    pub fn stream(chunks: impl IntoIterator<Item = Value>) -> Self {
        let mut events: Vec<String> = chunks.into_iter().map(|chunk| chunk.to_string()).collect();
        events.push("[DONE]".to_string());

        Self::new(Reply::Stream(events))
    }

    /// Streams the event payloads exactly as given.
    pub fn raw_stream(events: impl IntoIterator<Item = &'static str>) -> Self {
        Self::new(Reply::Stream(events.into_iter().map(str::to_string).collect()))
    }

    /// Streams the chunks, then aborts the response body.
    pub fn broken_stream(chunks: impl IntoIterator<Item = Value>) -> Self {
        Self::new(Reply::BrokenStream(
            chunks.into_iter().map(|chunk| chunk.to_string()).collect(),
        ))
    }

    /// Streams the chunks and `[DONE]`, then keeps the connection open.
    pub fn open_stream(chunks: impl IntoIterator<Item = Value>) -> Self {
        let mut events: Vec<String> = chunks.into_iter().map(|chunk| chunk.to_string()).collect();
        events.push("[DONE]".to_string());

        Self::new(Reply::OpenStream(events))
    }

    /// Rejects every chat completion request.
    pub fn error(status: u16, body: Value) -> Self {
        Self::new(Reply::Error(status, body))
    }

    /// Serves these entries from `GET /models`.
    pub fn with_models(mut self, models: Vec<Value>) -> Self {
        self.models = Some(models);
        self
    }

    /// Chat completion requests received so far.
    pub fn received(&self) -> Vec<ReceivedRequest> {
        self.received.lock().unwrap().clone()
    }

    /// The last chat completion request body.
    pub fn last_body(&self) -> Value {
        self.received()
            .pop()
            .map(|request| request.body)
            .unwrap_or(Value::Null)
    }

    /// Starts the mock on an ephemeral port. Returns its base URL and a shutdown token.
    pub async fn spawn(&self) -> (String, CancellationToken) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address: SocketAddr = listener.local_addr().unwrap();

        let app = Router::new()
            .route("/v1/chat/completions", post(chat_completions))
            .route("/v1/models", get(models))
            .with_state(self.clone());

        let token = CancellationToken::new();
        let shutdown = token.clone().cancelled_owned();

        tokio::spawn(async move {
            axum::serve(listener, app).with_graceful_shutdown(shutdown).await.unwrap();
        });

        (format!("http://{address}/v1"), token)
    }
}

async fn chat_completions(State(mock): State<UpstreamMock>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };

    mock.received.lock().unwrap().push(ReceivedRequest {
        authorization: header_value("authorization"),
        referer: header_value("http-referer"),
        title: header_value("x-title"),
        body,
    });

    match mock.reply {
        Reply::Completion(response) => Json(response).into_response(),
        Reply::Stream(events) => {
            let body: String = events.iter().map(sse_event).collect();

            ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
        }
        Reply::BrokenStream(events) => {
            let chunks = events
                .iter()
                .map(|event| Ok(sse_event(event)))
                .chain(std::iter::once(Err(std::io::Error::other("connection reset"))));

            let body = Body::from_stream(futures::stream::iter(chunks.collect::<Vec<_>>()));

            ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
        }
        Reply::OpenStream(events) => {
            let chunks: Vec<Result<String, std::io::Error>> = events.iter().map(|event| Ok(sse_event(event))).collect();
            let body = Body::from_stream(futures::stream::iter(chunks).chain(futures::stream::pending()));

            ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
        }
        Reply::Error(status, body) => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(body)).into_response()
        }
    }
}

fn sse_event(data: impl std::fmt::Display) -> String {
    format!("data: {data}\n\n")
}

async fn models(State(mock): State<UpstreamMock>) -> Response {
    match mock.models {
        Some(models) => Json(json!({ "data": models })).into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}
