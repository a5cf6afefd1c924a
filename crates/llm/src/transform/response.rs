//! OpenAI chat completion response to Anthropic Messages response.

use super::{content, stop_reason};
use crate::{
    error::{LlmError, LlmResult},
    messages::{
        anthropic::{AnthropicChatResponse, AnthropicContent, AnthropicRole, AnthropicUsage},
        openai::{ChatCompletionResponse, Usage},
    },
};

/// Converts a completed upstream response.
///
/// The response carries the model name the caller asked for, not the upstream one.
pub(crate) fn to_anthropic(
    response: ChatCompletionResponse,
    requested_model: String,
) -> LlmResult<AnthropicChatResponse> {
    let Some(choice) = response.choices.into_iter().next() else {
        return Err(LlmError::InvalidUpstreamResponse(
            "Upstream response contains no choices".to_string(),
        ));
    };

    let content = content::to_source(choice.message);

    let has_tool_use = content
        .iter()
        .any(|block| matches!(block, AnthropicContent::ToolUse { .. }));

    Ok(AnthropicChatResponse {
        id: message_id(),
        r#type: "message".to_string(),
        role: AnthropicRole::Assistant,
        content,
        model: requested_model,
        stop_reason: Some(stop_reason(choice.finish_reason.as_ref(), has_tool_use)),
        stop_sequence: None,
        usage: response.usage.map(AnthropicUsage::from).unwrap_or_default(),
    })
}

/// A fresh Anthropic-style message id.
pub(crate) fn message_id() -> String {
    format!("msg_{}", uuid::Uuid::new_v4().simple())
}

impl From<Usage> for AnthropicUsage {
    fn from(usage: Usage) -> Self {
        Self {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }
    }
}
