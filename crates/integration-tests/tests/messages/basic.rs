use indoc::indoc;
use integration_tests::{TestServer, UpstreamMock};
use serde_json::json;

#[tokio::test]
async fn text_completion() {
    let config = indoc! {r#"
        [upstream]
        referer = "https://example.com/bridge"
        title = "Bridge Tests"

        [[models.rules]]
        prefix = "claude-sonnet"
        target = "anthropic/claude-sonnet-4.5"
    "#};

    let upstream = UpstreamMock::text("Hello! How can I help?");
    let server = TestServer::with_upstream(&upstream, config).await;

    let response = server
        .messages(json!({
            "model": "claude-sonnet-4-5-20250929",
            "max_tokens": 256,
            "system": "Be brief.",
            "messages": [{ "role": "user", "content": "Hi" }]
        }))
        .send()
        .await;

    insta::assert_json_snapshot!(response, {
        ".id" => "[id]"
    }, @r#"
    {
      "content": [
        {
          "text": "Hello! How can I help?",
          "type": "text"
        }
      ],
      "id": "[id]",
      "model": "claude-sonnet-4-5-20250929",
      "role": "assistant",
      "stop_reason": "end_turn",
      "stop_sequence": null,
      "type": "message",
      "usage": {
        "input_tokens": 10,
        "output_tokens": 3
      }
    }
    "#);

    assert!(response["id"].as_str().unwrap().starts_with("msg_"));

    let received = upstream.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].authorization.as_deref(), Some("Bearer test-key"));
    assert_eq!(received[0].referer.as_deref(), Some("https://example.com/bridge"));
    assert_eq!(received[0].title.as_deref(), Some("Bridge Tests"));

    insta::assert_json_snapshot!(received[0].body, @r#"
    {
      "max_tokens": 256,
      "messages": [
        {
          "content": [
            {
              "cache_control": {
                "type": "ephemeral"
              },
              "text": "Be brief.",
              "type": "text"
            }
          ],
          "role": "system"
        },
        {
          "content": "Hi",
          "role": "user"
        }
      ],
      "model": "anthropic/claude-sonnet-4.5"
    }
    "#);
}

#[tokio::test]
async fn override_wins_over_rules() {
    let config = indoc! {r#"
        [models]
        override = "openai/gpt-4o"

        [[models.rules]]
        pattern = "sonnet"
        target = "anthropic/claude-sonnet-4.5"
    "#};

    let upstream = UpstreamMock::text("ok");
    let server = TestServer::with_upstream(&upstream, config).await;

    let response = server
        .messages(json!({
            "model": "claude-3-7-sonnet-latest",
            "max_tokens": 64,
            "system": [{ "type": "text", "text": "Answer in French." }],
            "messages": [{ "role": "user", "content": "Hello" }]
        }))
        .send()
        .await;

    assert_eq!(response["model"], "claude-3-7-sonnet-latest");

    insta::assert_json_snapshot!(upstream.last_body(), @r#"
    {
      "max_tokens": 64,
      "messages": [
        {
          "content": "Answer in French.",
          "role": "system"
        },
        {
          "content": "Hello",
          "role": "user"
        }
      ],
      "model": "openai/gpt-4o"
    }
    "#);
}

#[tokio::test]
async fn sampling_parameters_are_forwarded() {
    let upstream = UpstreamMock::text("ok");
    let server = TestServer::with_upstream(&upstream, "").await;

    server
        .messages(json!({
            "model": "claude-opus-4-1",
            "max_tokens": 4096,
            "temperature": 0.5,
            "top_p": 0.25,
            "top_k": 40,
            "stop_sequences": ["END"],
            "thinking": { "type": "enabled", "budget_tokens": 2048 },
            "metadata": { "user_id": "user-1" },
            "messages": [{ "role": "user", "content": [{ "type": "text", "text": "Think hard." }] }]
        }))
        .send()
        .await;

    insta::assert_json_snapshot!(upstream.last_body(), @r#"
    {
      "max_tokens": 4096,
      "messages": [
        {
          "content": "Think hard.",
          "role": "user"
        }
      ],
      "model": "claude-opus-4-1",
      "reasoning": {
        "max_tokens": 2048
      },
      "stop": [
        "END"
      ],
      "temperature": 0.5,
      "top_k": 40,
      "top_p": 0.25
    }
    "#);
}

#[tokio::test]
async fn reasoning_becomes_thinking_block() {
    let upstream = UpstreamMock::completion(json!({
        "id": "gen-2",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": "The answer is 4.",
                "reasoning": "2 + 2 is 4."
            },
            "finish_reason": "length"
        }],
        "usage": { "prompt_tokens": 8, "completion_tokens": 12 }
    }));

    let server = TestServer::with_upstream(&upstream, "").await;

    let response = server
        .messages(json!({
            "model": "claude-sonnet-4-5",
            "max_tokens": 12,
            "messages": [{ "role": "user", "content": "What is 2 + 2?" }]
        }))
        .send()
        .await;

    insta::assert_json_snapshot!(response, {
        ".id" => "[id]"
    }, @r#"
    {
      "content": [
        {
          "signature": "openrouter-reasoning",
          "thinking": "2 + 2 is 4.",
          "type": "thinking"
        },
        {
          "text": "The answer is 4.",
          "type": "text"
        }
      ],
      "id": "[id]",
      "model": "claude-sonnet-4-5",
      "role": "assistant",
      "stop_reason": "max_tokens",
      "stop_sequence": null,
      "type": "message",
      "usage": {
        "input_tokens": 8,
        "output_tokens": 12
      }
    }
    "#);
}

#[tokio::test]
async fn images_are_sent_as_parts() {
    let upstream = UpstreamMock::text("A cat.");
    let server = TestServer::with_upstream(&upstream, "").await;

    server
        .messages(json!({
            "model": "claude-haiku-4-5",
            "max_tokens": 100,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": "What is this?" },
                    { "type": "image", "source": { "type": "base64", "media_type": "image/png", "data": "iVBORw0KGgo=" } }
                ]
            }]
        }))
        .send()
        .await;

    insta::assert_json_snapshot!(upstream.last_body()["messages"], @r#"
    [
      {
        "content": [
          {
            "text": "What is this?",
            "type": "text"
          },
          {
            "image_url": {
              "url": "data:image/png;base64,iVBORw0KGgo="
            },
            "type": "image_url"
          }
        ],
        "role": "user"
      }
    ]
    "#);
}

#[tokio::test]
async fn caller_key_is_forwarded_without_configured_key() {
    let config = indoc! {r#"
        [upstream]
        api_key = ""
    "#};

    let upstream = UpstreamMock::text("ok");
    let server = TestServer::with_upstream(&upstream, config).await;

    let request = json!({
        "model": "claude-haiku-4-5",
        "max_tokens": 16,
        "messages": [{ "role": "user", "content": "ping" }]
    });

    server
        .messages(request.clone())
        .header("x-api-key", "sk-or-from-header")
        .send()
        .await;

    server
        .messages(request)
        .header("authorization", "Bearer sk-or-from-bearer")
        .send()
        .await;

    let keys: Vec<_> = upstream
        .received()
        .into_iter()
        .map(|request| request.authorization)
        .collect();

    insta::assert_debug_snapshot!(keys, @r#"
    [
        Some(
            "Bearer sk-or-from-header",
        ),
        Some(
            "Bearer sk-or-from-bearer",
        ),
    ]
    "#);
}

#[tokio::test]
async fn configured_key_wins_over_caller_key() {
    let upstream = UpstreamMock::text("ok");
    let server = TestServer::with_upstream(&upstream, "").await;

    server
        .messages(json!({
            "model": "claude-haiku-4-5",
            "max_tokens": 16,
            "messages": [{ "role": "user", "content": "ping" }]
        }))
        .header("x-api-key", "sk-caller")
        .send()
        .await;

    assert_eq!(upstream.received()[0].authorization.as_deref(), Some("Bearer test-key"));
}
