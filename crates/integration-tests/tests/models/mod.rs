use indoc::indoc;
use integration_tests::{TestServer, UpstreamMock};
use serde_json::{Value, json};

fn upstream_models() -> Vec<Value> {
    vec![
        json!({ "id": "anthropic/claude-sonnet-4", "name": "Anthropic: Claude Sonnet 4", "created": 1_747_267_200 }),
        json!({ "id": "anthropic/claude-sonnet-4.5", "name": "Anthropic: Claude Sonnet 4.5", "created": 1_759_161_600 }),
        json!({ "id": "anthropic/claude-haiku-4.5", "name": "Anthropic: Claude Haiku 4.5", "created": 1_760_486_400 }),
        json!({ "id": "anthropic/claude-3.5-haiku:beta", "created": 1_770_000_000 }),
        json!({ "id": "openai/gpt-4o", "created": 1_729_555_200 }),
    ]
}

const DISCOVER: &str = indoc! {r#"
    [models]
    discover = true
"#};

#[tokio::test]
async fn discovered_listing() {
    let upstream = UpstreamMock::text("unused").with_models(upstream_models());
    let server = TestServer::with_upstream(&upstream, DISCOVER).await;

    let (status, body) = server.get_json("/v1/models").await;

    assert_eq!(status, 200);

    insta::assert_json_snapshot!(body, @r#"
    {
      "data": [
        {
          "created_at": "2026-02-02T02:40:00Z",
          "display_name": "anthropic/claude-3.5-haiku:beta",
          "id": "anthropic/claude-3.5-haiku:beta",
          "type": "model"
        },
        {
          "created_at": "2025-10-15T00:00:00Z",
          "display_name": "Anthropic: Claude Haiku 4.5",
          "id": "anthropic/claude-haiku-4.5",
          "type": "model"
        },
        {
          "created_at": "2025-09-29T16:00:00Z",
          "display_name": "Anthropic: Claude Sonnet 4.5",
          "id": "anthropic/claude-sonnet-4.5",
          "type": "model"
        },
        {
          "created_at": "2025-05-15T00:00:00Z",
          "display_name": "Anthropic: Claude Sonnet 4",
          "id": "anthropic/claude-sonnet-4",
          "type": "model"
        },
        {
          "created_at": "2024-10-22T00:00:00Z",
          "display_name": "openai/gpt-4o",
          "id": "openai/gpt-4o",
          "type": "model"
        }
      ],
      "first_id": "anthropic/claude-3.5-haiku:beta",
      "has_more": false,
      "last_id": "openai/gpt-4o"
    }
    "#);
}

#[tokio::test]
async fn discovered_tiers_route_requests() {
    let config = indoc! {r#"
        [models]
        discover = true

        [[models.rules]]
        prefix = "claude-sonnet-4-5"
        target = "openai/gpt-4o"
    "#};

    let upstream = UpstreamMock::text("ok").with_models(upstream_models());
    let server = TestServer::with_upstream(&upstream, config).await;

    for model in ["claude-3-5-haiku-latest", "claude-sonnet-4-20250514", "claude-sonnet-4-5", "claude-opus-4-1"] {
        server
            .messages(json!({
                "model": model,
                "max_tokens": 16,
                "messages": [{ "role": "user", "content": "ping" }]
            }))
            .send()
            .await;
    }

    let models: Vec<_> = upstream
        .received()
        .into_iter()
        .map(|request| request.body["model"].clone())
        .collect();

    insta::assert_json_snapshot!(models, @r#"
    [
      "anthropic/claude-haiku-4.5",
      "anthropic/claude-sonnet-4.5",
      "openai/gpt-4o",
      "claude-opus-4-1"
    ]
    "#);
}

#[tokio::test]
async fn failed_discovery_lists_configured_targets() {
    let config = indoc! {r#"
        [models]
        discover = true

        [[models.rules]]
        pattern = "haiku"
        target = "anthropic/claude-haiku-4.5"

        [[models.rules]]
        pattern = "sonnet|opus"
        target = "anthropic/claude-sonnet-4.5"
    "#};

    let upstream = UpstreamMock::text("ok");
    let server = TestServer::with_upstream(&upstream, config).await;

    let (status, body) = server.get_json("/v1/models").await;

    assert_eq!(status, 200);

    insta::assert_json_snapshot!(body, @r#"
    {
      "data": [
        {
          "created_at": "1970-01-01T00:00:00Z",
          "display_name": "anthropic/claude-haiku-4.5",
          "id": "anthropic/claude-haiku-4.5",
          "type": "model"
        },
        {
          "created_at": "1970-01-01T00:00:00Z",
          "display_name": "anthropic/claude-sonnet-4.5",
          "id": "anthropic/claude-sonnet-4.5",
          "type": "model"
        }
      ],
      "first_id": "anthropic/claude-haiku-4.5",
      "has_more": false,
      "last_id": "anthropic/claude-sonnet-4.5"
    }
    "#);
}

#[tokio::test]
async fn single_model_lookup() {
    let upstream = UpstreamMock::text("unused").with_models(upstream_models());
    let server = TestServer::with_upstream(&upstream, DISCOVER).await;

    let (status, direct) = server.get_json("/v1/models/anthropic/claude-sonnet-4.5").await;
    assert_eq!(status, 200);

    insta::assert_json_snapshot!(direct, @r#"
    {
      "created_at": "2025-09-29T16:00:00Z",
      "display_name": "Anthropic: Claude Sonnet 4.5",
      "id": "anthropic/claude-sonnet-4.5",
      "type": "model"
    }
    "#);

    let (status, mapped) = server.get_json("/v1/models/claude-sonnet-4-5-20250929").await;
    assert_eq!(status, 200);

    insta::assert_json_snapshot!(mapped, @r#"
    {
      "created_at": "1970-01-01T00:00:00Z",
      "display_name": "Anthropic: Claude Sonnet 4.5",
      "id": "claude-sonnet-4-5-20250929",
      "type": "model"
    }
    "#);

    let (status, unknown) = server.get_json("/v1/models/gpt-unknown").await;
    assert_eq!(status, 200);

    insta::assert_json_snapshot!(unknown, @r#"
    {
      "created_at": "1970-01-01T00:00:00Z",
      "display_name": "gpt-unknown",
      "id": "gpt-unknown",
      "type": "model"
    }
    "#);
}
