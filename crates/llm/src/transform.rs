//! Translation between Anthropic Messages and OpenAI chat completions.

pub(crate) mod content;
pub(crate) mod request;
pub(crate) mod response;
pub(crate) mod stream;

use crate::messages::{anthropic::AnthropicStopReason, openai::FinishReason};

/// Maps an upstream finish reason to an Anthropic stop reason.
///
/// `tool_use_emitted` upgrades a plain stop to `tool_use`, since some upstreams report
/// `stop` for tool calls.
pub(crate) fn stop_reason(finish_reason: Option<&FinishReason>, tool_use_emitted: bool) -> AnthropicStopReason {
    let reason = match finish_reason {
        Some(FinishReason::Stop) => AnthropicStopReason::EndTurn,
        Some(FinishReason::Length) => AnthropicStopReason::MaxTokens,
        Some(FinishReason::ToolCalls) => AnthropicStopReason::ToolUse,
        Some(FinishReason::ContentFilter) => AnthropicStopReason::StopSequence,
        Some(FinishReason::Other(other)) => {
            log::warn!("Unknown finish reason '{other}' from upstream, using end_turn");
            AnthropicStopReason::EndTurn
        }
        None => {
            log::warn!("Upstream response has no finish reason, using end_turn");
            AnthropicStopReason::EndTurn
        }
    };

    if tool_use_emitted && reason == AnthropicStopReason::EndTurn {
        AnthropicStopReason::ToolUse
    } else {
        reason
    }
}
