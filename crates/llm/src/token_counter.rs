//! Character based input token estimate.

use crate::messages::anthropic::{AnthropicChatRequest, AnthropicContent};

/// Average characters per token for English text.
const CHARS_PER_TOKEN: usize = 4;

/// Estimates the input tokens of a request as a quarter of its text characters, rounded up.
///
/// Only system text, text blocks and tool result text count. Images, documents and tool
/// definitions are ignored.
pub fn estimate_input_tokens(request: &AnthropicChatRequest) -> u32 {
    let system = request.system.iter().map(text_chars).sum::<usize>();

    let messages = request
        .messages
        .iter()
        .flat_map(|message| message.content.iter())
        .map(text_chars)
        .sum::<usize>();

    let tokens = (system + messages).div_ceil(CHARS_PER_TOKEN);

    u32::try_from(tokens).unwrap_or(u32::MAX)
}

fn text_chars(block: &AnthropicContent) -> usize {
    match block {
        AnthropicContent::Text { text } => text.chars().count(),
        AnthropicContent::ToolResult { content, .. } => content.iter().map(text_chars).sum(),
        _ => 0,
    }
}
