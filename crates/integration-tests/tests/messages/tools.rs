use integration_tests::{TestServer, UpstreamMock};
use serde_json::json;

fn weather_tool() -> serde_json::Value {
    json!({
        "name": "get_weather",
        "description": "Current weather for a city",
        "input_schema": {
            "type": "object",
            "properties": { "city": { "type": "string" } },
            "required": ["city"]
        }
    })
}

#[tokio::test]
async fn tool_round_trip_request() {
    let upstream = UpstreamMock::text("It is sunny in Oslo.");
    let server = TestServer::with_upstream(&upstream, "").await;

    server
        .messages(json!({
            "model": "claude-sonnet-4-5",
            "max_tokens": 512,
            "tools": [weather_tool()],
            "tool_choice": { "type": "any" },
            "messages": [
                { "role": "user", "content": "Weather in Oslo?" },
                {
                    "role": "assistant",
                    "content": [
                        { "type": "text", "text": "Let me check." },
                        { "type": "tool_use", "id": "toolu_01", "name": "get_weather", "input": { "city": "Oslo" } }
                    ]
                },
                {
                    "role": "user",
                    "content": [
                        { "type": "tool_result", "tool_use_id": "toolu_01", "content": "Sunny, 18°C" },
                        { "type": "text", "text": "Summarize it." }
                    ]
                }
            ]
        }))
        .send()
        .await;

    insta::assert_json_snapshot!(upstream.last_body(), @r#"
    {
      "max_tokens": 512,
      "messages": [
        {
          "content": "Weather in Oslo?",
          "role": "user"
        },
        {
          "content": "Let me check.",
          "role": "assistant",
          "tool_calls": [
            {
              "function": {
                "arguments": "{\"city\":\"Oslo\"}",
                "name": "get_weather"
              },
              "id": "toolu_01",
              "type": "function"
            }
          ]
        },
        {
          "content": "Sunny, 18°C",
          "role": "tool",
          "tool_call_id": "toolu_01"
        },
        {
          "content": "Summarize it.",
          "role": "user"
        }
      ],
      "model": "claude-sonnet-4-5",
      "tool_choice": "required",
      "tools": [
        {
          "function": {
            "description": "Current weather for a city",
            "name": "get_weather",
            "parameters": {
              "properties": {
                "city": {
                  "type": "string"
                }
              },
              "required": [
                "city"
              ],
              "type": "object"
            }
          },
          "type": "function"
        }
      ]
    }
    "#);
}

#[tokio::test]
async fn unanswered_tool_use_is_not_forwarded() {
    let upstream = UpstreamMock::text("ok");
    let server = TestServer::with_upstream(&upstream, "").await;

    server
        .messages(json!({
            "model": "claude-sonnet-4-5",
            "max_tokens": 64,
            "messages": [
                { "role": "user", "content": "Weather in Oslo?" },
                {
                    "role": "assistant",
                    "content": [
                        { "type": "tool_use", "id": "toolu_01", "name": "get_weather", "input": { "city": "Oslo" } }
                    ]
                },
                { "role": "user", "content": "Never mind." }
            ]
        }))
        .send()
        .await;

    insta::assert_json_snapshot!(upstream.last_body()["messages"], @r#"
    [
      {
        "content": "Weather in Oslo?",
        "role": "user"
      },
      {
        "content": "Never mind.",
        "role": "user"
      }
    ]
    "#);
}

#[tokio::test]
async fn specific_tool_choice() {
    let upstream = UpstreamMock::text("ok");
    let server = TestServer::with_upstream(&upstream, "").await;

    server
        .messages(json!({
            "model": "claude-sonnet-4-5",
            "max_tokens": 64,
            "tools": [weather_tool()],
            "tool_choice": { "type": "tool", "name": "get_weather" },
            "messages": [{ "role": "user", "content": "Weather in Oslo?" }]
        }))
        .send()
        .await;

    insta::assert_json_snapshot!(upstream.last_body()["tool_choice"], @r#"
    {
      "function": {
        "name": "get_weather"
      },
      "type": "function"
    }
    "#);
}

#[tokio::test]
async fn tool_call_response() {
    let upstream = UpstreamMock::completion(json!({
        "id": "gen-3",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [
                    {
                        "id": "call_abc",
                        "type": "function",
                        "function": { "name": "get_weather", "arguments": "{\"city\":\"Oslo\"}" }
                    },
                    {
                        "id": "call_def",
                        "type": "function",
                        "function": { "name": "get_weather", "arguments": "{\"city\":" }
                    }
                ]
            },
            "finish_reason": "tool_calls"
        }],
        "usage": { "prompt_tokens": 30, "completion_tokens": 15 }
    }));

    let server = TestServer::with_upstream(&upstream, "").await;

    let response = server
        .messages(json!({
            "model": "claude-sonnet-4-5",
            "max_tokens": 256,
            "tools": [weather_tool()],
            "messages": [{ "role": "user", "content": "Weather in Oslo and Bergen?" }]
        }))
        .send()
        .await;

    insta::assert_json_snapshot!(response, {
        ".id" => "[id]"
    }, @r#"
    {
      "content": [
        {
          "id": "call_abc",
          "input": {
            "city": "Oslo"
          },
          "name": "get_weather",
          "type": "tool_use"
        },
        {
          "id": "call_def",
          "input": {},
          "name": "get_weather",
          "type": "tool_use"
        }
      ],
      "id": "[id]",
      "model": "claude-sonnet-4-5",
      "role": "assistant",
      "stop_reason": "tool_use",
      "stop_sequence": null,
      "type": "message",
      "usage": {
        "input_tokens": 30,
        "output_tokens": 15
      }
    }
    "#);
}

#[tokio::test]
async fn streamed_tool_call() {
    let upstream = UpstreamMock::stream([
        json!({ "choices": [{ "index": 0, "delta": { "content": "Checking." } }] }),
        json!({ "choices": [{ "index": 0, "delta": { "tool_calls": [
            { "index": 0, "id": "call_1", "type": "function", "function": { "name": "get_weather", "arguments": "" } }
        ] } }] }),
        json!({ "choices": [{ "index": 0, "delta": { "tool_calls": [
            { "index": 0, "function": { "arguments": "{\"city\":" } }
        ] } }] }),
        json!({ "choices": [{ "index": 0, "delta": { "tool_calls": [
            { "index": 0, "function": { "arguments": "\"Oslo\"}" } }
        ] } }] }),
        json!({
            "choices": [{ "index": 0, "delta": {}, "finish_reason": "tool_calls" }],
            "usage": { "prompt_tokens": 20, "completion_tokens": 8 }
        }),
    ]);

    let server = TestServer::with_upstream(&upstream, "").await;

    let events = server
        .messages(json!({
            "model": "claude-sonnet-4-5",
            "max_tokens": 256,
            "tools": [weather_tool()],
            "messages": [{ "role": "user", "content": "Weather in Oslo?" }]
        }))
        .stream()
        .await;

    let payloads: Vec<_> = events.iter().skip(1).map(|event| &event.data).collect();

    insta::assert_json_snapshot!(payloads, @r#"
    [
      {
        "content_block": {
          "text": "",
          "type": "text"
        },
        "index": 0,
        "type": "content_block_start"
      },
      {
        "delta": {
          "text": "Checking.",
          "type": "text_delta"
        },
        "index": 0,
        "type": "content_block_delta"
      },
      {
        "index": 0,
        "type": "content_block_stop"
      },
      {
        "content_block": {
          "id": "call_1",
          "input": {},
          "name": "get_weather",
          "type": "tool_use"
        },
        "index": 1,
        "type": "content_block_start"
      },
      {
        "delta": {
          "partial_json": "{\"city\":",
          "type": "input_json_delta"
        },
        "index": 1,
        "type": "content_block_delta"
      },
      {
        "delta": {
          "partial_json": "\"Oslo\"}",
          "type": "input_json_delta"
        },
        "index": 1,
        "type": "content_block_delta"
      },
      {
        "index": 1,
        "type": "content_block_stop"
      },
      {
        "delta": {
          "stop_reason": "tool_use",
          "stop_sequence": null
        },
        "type": "message_delta",
        "usage": {
          "input_tokens": 20,
          "output_tokens": 8
        }
      },
      {
        "type": "message_stop"
      }
    ]
    "#);
}
