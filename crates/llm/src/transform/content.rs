//! Content block codec: Anthropic content blocks to OpenAI content and back.

use serde_json::Value;

use crate::messages::{
    anthropic::{AnthropicContent, AnthropicMediaSource},
    openai::{
        CacheControl, ChatContent, ChatContentPart, ChatMessage, ChatRole, FileData, FunctionCall, ImageUrl,
        ResponseMessage, ToolCall, ToolCallType,
    },
};

/// Signature attached to thinking blocks built from upstream reasoning text.
pub(crate) const REASONING_SIGNATURE: &str = "openrouter-reasoning";

/// Converts user-side blocks into OpenAI message content.
///
/// Pure text collapses into one trimmed string joined by newlines, or nothing when only
/// whitespace remains. As soon as an image or a
/// document is present, every block becomes a typed part instead. Blocks without an
/// OpenAI counterpart are dropped.
pub(crate) fn to_target(blocks: Vec<AnthropicContent>) -> Option<ChatContent> {
    let mut parts = Vec::with_capacity(blocks.len());
    let mut text_only = true;

    for block in blocks {
        match block {
            AnthropicContent::Text { text } => parts.push(text_part(text)),
            AnthropicContent::Image { source } => match media_url(&source) {
                Some(url) => {
                    text_only = false;
                    parts.push(ChatContentPart::ImageUrl {
                        image_url: ImageUrl { url },
                    });
                }
                None => log::warn!("Dropping image block with an unsupported source"),
            },
            AnthropicContent::Document {
                source: AnthropicMediaSource::Text { data, .. },
            } => parts.push(text_part(data)),
            AnthropicContent::Document { source } => match media_url(&source) {
                Some(file_data) => {
                    text_only = false;
                    parts.push(ChatContentPart::File {
                        file: FileData {
                            filename: document_filename(&source),
                            file_data,
                        },
                    });
                }
                None => log::warn!("Dropping document block with an unsupported source"),
            },
            other => log::warn!("Dropping {} block, it has no equivalent in user content", other.kind()),
        }
    }

    if parts.is_empty() {
        return None;
    }

    if !text_only {
        return Some(ChatContent::Parts(parts));
    }

    let texts: Vec<String> = parts
        .into_iter()
        .filter_map(|part| match part {
            ChatContentPart::Text { text, .. } => Some(text),
            _ => None,
        })
        .collect();

    let text = texts.join("\n").trim().to_string();

    (!text.is_empty()).then_some(ChatContent::Text(text))
}

/// Converts a completed OpenAI assistant message into Anthropic content blocks.
///
/// Reasoning comes first as a thinking block, then the text, then one tool use block per
/// tool call.
pub(crate) fn to_source(mut message: ResponseMessage) -> Vec<AnthropicContent> {
    let mut blocks = Vec::new();

    if let Some(thinking) = message.take_reasoning() {
        blocks.push(AnthropicContent::Thinking {
            thinking,
            signature: Some(REASONING_SIGNATURE.to_string()),
        });
    }

    if let Some(content) = message.content {
        let text = content.into_text();

        if !text.is_empty() {
            blocks.push(AnthropicContent::Text { text });
        }
    }

    blocks.extend(message.tool_calls.into_iter().flatten().map(tool_use));

    blocks
}

/// One system message per system text block.
///
/// With `prompt_caching` the text is sent as a part carrying an ephemeral cache marker,
/// which OpenRouter forwards to Anthropic models.
pub(crate) fn system_messages(system: Vec<AnthropicContent>, prompt_caching: bool) -> Vec<ChatMessage> {
    system
        .into_iter()
        .filter_map(|block| match block {
            AnthropicContent::Text { text } if text.is_empty() => None,
            AnthropicContent::Text { text } if prompt_caching => Some(ChatMessage::new(
                ChatRole::System,
                vec![ChatContentPart::Text {
                    text,
                    cache_control: Some(CacheControl::Ephemeral),
                }],
            )),
            AnthropicContent::Text { text } => Some(ChatMessage::new(ChatRole::System, text)),
            other => {
                log::warn!("Dropping {} block from the system prompt", other.kind());
                None
            }
        })
        .collect()
}

/// Renders tool result content as the single string a `tool` message accepts.
///
/// Text-only results are joined by newlines. Anything else is serialized as JSON.
pub(crate) fn tool_result_text(content: Vec<AnthropicContent>) -> String {
    let text_only = content
        .iter()
        .all(|block| matches!(block, AnthropicContent::Text { .. }));

    if !text_only {
        return serde_json::to_string(&content).unwrap_or_else(|e| {
            log::warn!("Failed to serialize tool result content: {e}");
            String::new()
        });
    }

    let texts: Vec<String> = content
        .into_iter()
        .filter_map(|block| match block {
            AnthropicContent::Text { text } => Some(text),
            _ => None,
        })
        .collect();

    texts.join("\n")
}

/// Converts a tool use block into an OpenAI tool call.
pub(crate) fn tool_call(id: String, name: String, input: &Value) -> ToolCall {
    ToolCall {
        id,
        r#type: ToolCallType::Function,
        function: FunctionCall {
            name,
            arguments: input.to_string(),
        },
    }
}

/// Converts an OpenAI tool call into a tool use block.
pub(crate) fn tool_use(call: ToolCall) -> AnthropicContent {
    let id = if call.id.is_empty() { tool_use_id() } else { call.id };
    let input = parse_tool_input(&call.function.arguments, &call.function.name);

    AnthropicContent::ToolUse {
        id,
        name: call.function.name,
        input,
    }
}

/// Parses accumulated tool arguments.
///
/// Empty arguments are an empty object. Anything that is not a JSON object also becomes an
/// empty object, with a warning.
pub(crate) fn parse_tool_input(arguments: &str, tool_name: &str) -> Value {
    if arguments.trim().is_empty() {
        return Value::Object(Default::default());
    }

    match serde_json::from_str::<Value>(arguments) {
        Ok(value @ Value::Object(_)) => value,
        Ok(other) => {
            log::warn!("Arguments of tool '{tool_name}' are not a JSON object ({other}), using an empty object");
            Value::Object(Default::default())
        }
        Err(e) => {
            log::warn!("Arguments of tool '{tool_name}' are not valid JSON ({e}), using an empty object");
            Value::Object(Default::default())
        }
    }
}

/// A fresh Anthropic-style tool use id.
pub(crate) fn tool_use_id() -> String {
    format!("toolu_{}", uuid::Uuid::new_v4().simple())
}

fn text_part(text: String) -> ChatContentPart {
    ChatContentPart::Text {
        text,
        cache_control: None,
    }
}

fn media_url(source: &AnthropicMediaSource) -> Option<String> {
    match source {
        AnthropicMediaSource::Base64 { media_type, data } => Some(format!("data:{media_type};base64,{data}")),
        AnthropicMediaSource::Url { url } => Some(url.clone()),
        AnthropicMediaSource::Text { .. } | AnthropicMediaSource::Unsupported => None,
    }
}

fn document_filename(source: &AnthropicMediaSource) -> Option<String> {
    match source {
        AnthropicMediaSource::Base64 { media_type, .. } => {
            let extension = media_type.rsplit('/').next().unwrap_or("bin");
            Some(format!("document.{extension}"))
        }
        AnthropicMediaSource::Url { url } => url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .map(str::to_string),
        AnthropicMediaSource::Text { .. } | AnthropicMediaSource::Unsupported => None,
    }
}
