//! Anthropic Messages request to OpenAI chat completion request.

use std::collections::HashSet;

use serde_json::json;

use super::content;
use crate::{
    messages::{
        anthropic::{
            AnthropicChatRequest, AnthropicContent, AnthropicMessage, AnthropicRole, AnthropicThinking, AnthropicTool,
            AnthropicToolChoice,
        },
        openai::{
            ChatCompletionRequest, ChatMessage, ChatRole, FunctionChoice, FunctionDefinition, StreamOptions, Tool,
            ToolCallType, ToolChoice, ToolChoiceMode,
        },
    },
    model_map::ModelMapper,
};

/// Builds the upstream request. Never fails: unsupported content is dropped with a warning.
pub(crate) fn to_chat_completion(request: AnthropicChatRequest, mapper: &ModelMapper) -> ChatCompletionRequest {
    let model = mapper.map(&request.model);
    let prompt_caching = model.contains("claude");

    let mut messages = content::system_messages(request.system, prompt_caching);
    let conversation = request.messages.into_iter().flat_map(convert_message).collect();
    messages.extend(pair_tool_calls(conversation));

    let stream = request.stream;
    let stream_options = stream.filter(|stream| *stream).map(|_| StreamOptions { include_usage: true });

    let reasoning = request.reasoning.or_else(|| match request.thinking {
        Some(AnthropicThinking::Enabled { budget_tokens }) => Some(json!({ "max_tokens": budget_tokens })),
        Some(AnthropicThinking::Disabled) | None => None,
        Some(AnthropicThinking::Unknown) => {
            log::warn!("Ignoring thinking configuration of unknown type, no reasoning is requested");
            None
        }
    });

    ChatCompletionRequest {
        model,
        messages,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        top_p: request.top_p,
        top_k: request.top_k,
        stop: request.stop_sequences.filter(|stop| !stop.is_empty()),
        stream,
        stream_options,
        tools: request
            .tools
            .filter(|tools| !tools.is_empty())
            .map(|tools| tools.into_iter().map(Tool::from).collect()),
        tool_choice: request.tool_choice.and_then(convert_tool_choice),
        reasoning,
        reasoning_effort: request.reasoning_effort,
    }
}

impl From<AnthropicTool> for Tool {
    fn from(tool: AnthropicTool) -> Self {
        Self {
            r#type: ToolCallType::Function,
            function: FunctionDefinition {
                name: tool.name,
                description: tool.description,
                parameters: tool.input_schema,
            },
        }
    }
}

/// Unknown choice types are dropped, leaving the decision to the upstream default.
fn convert_tool_choice(choice: AnthropicToolChoice) -> Option<ToolChoice> {
    let choice = match choice {
        AnthropicToolChoice::Auto => ToolChoice::Mode(ToolChoiceMode::Auto),
        AnthropicToolChoice::Any => ToolChoice::Mode(ToolChoiceMode::Required),
        AnthropicToolChoice::None => ToolChoice::Mode(ToolChoiceMode::None),
        AnthropicToolChoice::Tool { name } => ToolChoice::Specific {
            r#type: ToolCallType::Function,
            function: FunctionChoice { name },
        },
        AnthropicToolChoice::Unknown => {
            log::warn!("Dropping tool_choice of unknown type");
            return None;
        }
    };

    Some(choice)
}

fn convert_message(message: AnthropicMessage) -> Vec<ChatMessage> {
    match message.role {
        AnthropicRole::User => convert_user_message(message.content),
        AnthropicRole::Assistant => convert_assistant_message(message.content).into_iter().collect(),
    }
}

/// Tool results become `tool` messages, placed before the remaining user content.
fn convert_user_message(blocks: Vec<AnthropicContent>) -> Vec<ChatMessage> {
    let mut messages = Vec::new();
    let mut user_content = Vec::with_capacity(blocks.len());

    for block in blocks {
        match block {
            AnthropicContent::ToolResult {
                tool_use_id, content, ..
            } => {
                messages.push(ChatMessage::tool(tool_use_id, content::tool_result_text(content)));
            }
            block => user_content.push(block),
        }
    }

    if let Some(content) = content::to_target(user_content) {
        messages.push(ChatMessage::new(ChatRole::User, content));
    }

    messages
}

/// Text joins into the message content, tool uses become tool calls.
fn convert_assistant_message(blocks: Vec<AnthropicContent>) -> Option<ChatMessage> {
    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();

    for block in blocks {
        match block {
            AnthropicContent::Text { text } => texts.push(text),
            AnthropicContent::ToolUse { id, name, input } => tool_calls.push(content::tool_call(id, name, &input)),
            AnthropicContent::Thinking { .. } | AnthropicContent::RedactedThinking { .. } => {
                log::warn!("Dropping thinking block from assistant message, the upstream has no reasoning input");
            }
            other => log::warn!("Dropping {} block, it has no equivalent in assistant content", other.kind()),
        }
    }

    let text = texts.join("\n").trim().to_string();

    if text.is_empty() && tool_calls.is_empty() {
        return None;
    }

    Some(ChatMessage {
        role: ChatRole::Assistant,
        content: (!text.is_empty()).then(|| text.into()),
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        tool_call_id: None,
    })
}

/// Removes tool calls nobody answered and tool replies nobody asked for.
///
/// A tool call is kept only when a `tool` message with its id follows in the run of tool
/// messages right after the assistant message. A `tool` message is kept only when it answers
/// a kept call of the nearest preceding assistant message, once.
pub(crate) fn pair_tool_calls(messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let replies: Vec<HashSet<String>> = messages
        .iter()
        .enumerate()
        .map(|(i, message)| {
            if message.tool_calls.is_none() {
                return HashSet::new();
            }

            messages[i + 1..]
                .iter()
                .take_while(|next| next.role == ChatRole::Tool)
                .filter_map(|next| next.tool_call_id.clone())
                .collect()
        })
        .collect();

    let mut result = Vec::with_capacity(messages.len());
    let mut open_calls: HashSet<String> = HashSet::new();

    for (mut message, replies) in messages.into_iter().zip(replies) {
        match message.role {
            ChatRole::Assistant => {
                open_calls.clear();

                if let Some(calls) = message.tool_calls.take() {
                    let (answered, unanswered): (Vec<_>, Vec<_>) =
                        calls.into_iter().partition(|call| replies.contains(&call.id));

                    for call in unanswered {
                        log::warn!("Dropping tool call '{}' ({}) without a tool result", call.id, call.function.name);
                    }

                    open_calls.extend(answered.iter().map(|call| call.id.clone()));
                    message.tool_calls = (!answered.is_empty()).then_some(answered);
                }

                if message.content.is_none() && message.tool_calls.is_none() {
                    continue;
                }

                result.push(message);
            }
            ChatRole::Tool => {
                let answers_open_call = message
                    .tool_call_id
                    .as_deref()
                    .is_some_and(|id| open_calls.remove(id));

                if answers_open_call {
                    result.push(message);
                } else {
                    log::warn!(
                        "Dropping tool result for '{}' without a matching tool call",
                        message.tool_call_id.as_deref().unwrap_or_default()
                    );
                }
            }
            _ => {
                open_calls.clear();
                result.push(message);
            }
        }
    }

    result
}
