use indoc::indoc;
use integration_tests::{TestServer, UpstreamMock};
use serde_json::{Value, json};

fn request() -> Value {
    json!({
        "model": "claude-sonnet-4-5",
        "max_tokens": 64,
        "messages": [{ "role": "user", "content": "Hello" }]
    })
}

async fn upstream_failure(status: u16, message: &str) -> (u16, Value) {
    let upstream = UpstreamMock::error(status, json!({ "error": { "message": message, "code": status } }));
    let server = TestServer::with_upstream(&upstream, "").await;

    server.messages(request()).send_raw().await
}

#[tokio::test]
async fn upstream_statuses_map_to_anthropic_errors() {
    let cases = [
        (400, "max_tokens is too large"),
        (401, "No auth credentials found"),
        (402, "Insufficient credits"),
        (404, "No endpoints found for claude-sonnet-4-5"),
        (429, "Too many requests"),
        (500, "Upstream exploded"),
        (503, "No instances available"),
        (529, "Overloaded"),
    ];

    let mut results = Vec::new();

    for (status, message) in cases {
        let (bridge_status, body) = upstream_failure(status, message).await;

        results.push(json!({
            "upstream": status,
            "status": bridge_status,
            "type": body["error"]["type"],
            "message": body["error"]["message"],
        }));
    }

    insta::assert_json_snapshot!(results, @r#"
    [
      {
        "message": "Invalid request: max_tokens is too large",
        "status": 400,
        "type": "invalid_request_error",
        "upstream": 400
      },
      {
        "message": "Authentication failed: No auth credentials found",
        "status": 401,
        "type": "authentication_error",
        "upstream": 401
      },
      {
        "message": "Permission denied: Insufficient credits",
        "status": 403,
        "type": "permission_error",
        "upstream": 402
      },
      {
        "message": "No endpoints found for claude-sonnet-4-5",
        "status": 404,
        "type": "not_found_error",
        "upstream": 404
      },
      {
        "message": "Rate limit exceeded: Too many requests",
        "status": 429,
        "type": "rate_limit_error",
        "upstream": 429
      },
      {
        "message": "Upstream exploded",
        "status": 500,
        "type": "api_error",
        "upstream": 500
      },
      {
        "message": "Provider API error (503): No instances available",
        "status": 502,
        "type": "api_error",
        "upstream": 503
      },
      {
        "message": "Upstream overloaded: Overloaded",
        "status": 529,
        "type": "overloaded_error",
        "upstream": 529
      }
    ]
    "#);
}

#[tokio::test]
async fn missing_key_is_rejected_before_the_upstream() {
    let config = indoc! {r#"
        [upstream]
        api_key = ""
    "#};

    let upstream = UpstreamMock::text("unused");
    let server = TestServer::with_upstream(&upstream, config).await;

    let (status, body) = server.messages(request()).send_raw().await;

    assert_eq!(status, 401);

    insta::assert_json_snapshot!(body, @r#"
    {
      "error": {
        "message": "Authentication failed: No API key configured and none provided in x-api-key or Authorization",
        "type": "authentication_error"
      },
      "type": "error"
    }
    "#);

    assert!(upstream.received().is_empty());
}

#[tokio::test]
async fn malformed_request_body() {
    let upstream = UpstreamMock::text("unused");
    let server = TestServer::with_upstream(&upstream, "").await;

    let (status, body) = server
        .messages(json!({ "max_tokens": 64, "messages": [] }))
        .send_raw()
        .await;

    assert_eq!(status, 400);
    assert_eq!(body["type"], "error");
    assert_eq!(body["error"]["type"], "invalid_request_error");

    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.starts_with("Invalid request: Failed to parse request body"), "{message}");

    assert!(upstream.received().is_empty());
}

#[tokio::test]
async fn upstream_response_without_choices() {
    let upstream = UpstreamMock::completion(json!({ "id": "gen-4", "choices": [] }));
    let server = TestServer::with_upstream(&upstream, "").await;

    let (status, body) = server.messages(request()).send_raw().await;

    assert_eq!(status, 502);

    insta::assert_json_snapshot!(body, @r#"
    {
      "error": {
        "message": "Invalid upstream response: Upstream response contains no choices",
        "type": "api_error"
      },
      "type": "error"
    }
    "#);
}

#[tokio::test]
async fn unreachable_upstream() {
    let config = indoc! {r#"
        [upstream]
        base_url = "http://127.0.0.1:1/v1"
        timeout = "5s"
    "#};

    let server = TestServer::builder().build(config).await;

    let (status, body) = server.messages(request()).send_raw().await;

    assert_eq!(status, 502);
    assert_eq!(body["error"]["type"], "api_error");

    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.starts_with("Connection error:"), "{message}");
}
