use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::LlmError;

/// Request body for the Anthropic Messages API.
///
/// This is the format callers send to the bridge, as documented in the
/// [Anthropic API Reference](https://docs.anthropic.com/en/api/messages). Fields the bridge
/// has no use for are ignored during deserialization.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnthropicChatRequest {
    /// The model requested by the caller, e.g. "claude-sonnet-4-5-20250929".
    pub model: String,

    /// Conversation turns in order.
    pub messages: Vec<AnthropicMessage>,

    /// Maximum number of tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// System prompt, either a string or a list of text blocks.
    #[serde(
        default,
        deserialize_with = "text_or_blocks",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub system: Vec<AnthropicContent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    /// Sequences that will cause the model to stop generating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,

    /// When true, responses are sent as Server-Sent Events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    /// Tools available for the model to use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<AnthropicTool>>,

    /// Controls how the model uses tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<AnthropicToolChoice>,

    /// Extended thinking configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<AnthropicThinking>,

    /// Upstream reasoning configuration, forwarded as is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Value>,

    /// Upstream reasoning effort, forwarded as is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
}

/// An Anthropic message with role and content.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnthropicMessage {
    pub role: AnthropicRole,

    /// Content blocks. A bare string is read as a single text block.
    #[serde(deserialize_with = "text_or_blocks")]
    pub content: Vec<AnthropicContent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnthropicRole {
    User,
    Assistant,
}

/// Content block in an Anthropic message.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContent {
    /// Plain text content.
    Text { text: String },

    /// Image content.
    Image { source: AnthropicMediaSource },

    /// Document content, such as a PDF.
    Document { source: AnthropicMediaSource },

    /// Tool invocation requested by the assistant.
    ToolUse {
        /// Unique identifier for this tool use
        id: String,
        /// Name of the tool to use
        name: String,
        /// Input parameters for the tool
        input: Value,
    },

    /// Result from a tool execution.
    ToolResult {
        /// The tool use ID this result corresponds to
        tool_use_id: String,
        /// A string or a list of content blocks.
        #[serde(default, deserialize_with = "text_or_blocks")]
        content: Vec<AnthropicContent>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },

    /// Model reasoning.
    Thinking {
        thinking: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },

    /// Encrypted model reasoning.
    RedactedThinking { data: String },

    /// Any other block type.
    #[serde(other)]
    Unknown,
}

impl AnthropicContent {
    /// The wire tag of this block, for log messages.
    pub fn kind(&self) -> &'static str {
        match self {
            AnthropicContent::Text { .. } => "text",
            AnthropicContent::Image { .. } => "image",
            AnthropicContent::Document { .. } => "document",
            AnthropicContent::ToolUse { .. } => "tool_use",
            AnthropicContent::ToolResult { .. } => "tool_result",
            AnthropicContent::Thinking { .. } => "thinking",
            AnthropicContent::RedactedThinking { .. } => "redacted_thinking",
            AnthropicContent::Unknown => "unknown",
        }
    }
}

/// Source of an image or document block.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicMediaSource {
    Base64 { media_type: String, data: String },
    Url { url: String },
    /// Plain text document body.
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
        data: String,
    },
    #[serde(other)]
    Unsupported,
}

/// Tool definition in Anthropic format.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnthropicTool {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema for the tool's input parameters.
    #[serde(default = "empty_object")]
    pub input_schema: Value,
}

/// Tool choice configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicToolChoice {
    /// Let the model decide whether to use tools
    Auto,
    /// Force the model to use any available tool
    Any,
    /// Force the model to use a specific tool
    Tool { name: String },
    /// Do not use tools
    None,
    /// A choice type this bridge does not know
    #[serde(other)]
    Unknown,
}

/// Extended thinking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicThinking {
    Enabled { budget_tokens: u32 },
    Disabled,
    #[serde(other)]
    Unknown,
}

/// Response from the Anthropic Messages API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicChatResponse {
    /// Unique identifier for this completion
    pub id: String,

    /// Always "message"
    pub r#type: String,

    /// Always assistant
    pub role: AnthropicRole,

    pub content: Vec<AnthropicContent>,

    /// The model name the caller asked for
    pub model: String,

    pub stop_reason: Option<AnthropicStopReason>,

    pub stop_sequence: Option<String>,

    pub usage: AnthropicUsage,
}

/// The reason why the model stopped generating tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnthropicStopReason {
    /// The model reached a natural stopping point.
    EndTurn,
    /// The generation exceeded the maximum token limit specified in the request.
    MaxTokens,
    /// The model encountered a stop sequence specified in the request.
    StopSequence,
    /// The model invoked a tool.
    ToolUse,
    /// The turn ended before the model finished, e.g. the upstream stream broke off.
    PauseTurn,
}

impl fmt::Display for AnthropicStopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnthropicStopReason::EndTurn => write!(f, "end_turn"),
            AnthropicStopReason::MaxTokens => write!(f, "max_tokens"),
            AnthropicStopReason::StopSequence => write!(f, "stop_sequence"),
            AnthropicStopReason::ToolUse => write!(f, "tool_use"),
            AnthropicStopReason::PauseTurn => write!(f, "pause_turn"),
        }
    }
}

/// Token usage statistics in Anthropic format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnthropicUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Response body of the token counting endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicTokenCount {
    pub input_tokens: u32,
}

/// Error response in Anthropic format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicError {
    /// Always "error"
    #[serde(rename = "type")]
    pub error_type: String,

    pub error: AnthropicErrorDetails,
}

/// Error details in Anthropic format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicErrorDetails {
    /// The type of error that occurred, e.g. "invalid_request_error"
    #[serde(rename = "type")]
    pub error_type: String,

    /// Human-readable error message
    pub message: String,
}

impl From<&LlmError> for AnthropicErrorDetails {
    fn from(error: &LlmError) -> Self {
        Self {
            error_type: error.error_type().to_string(),
            message: error.client_message(),
        }
    }
}

impl From<&LlmError> for AnthropicError {
    fn from(error: &LlmError) -> Self {
        Self {
            error_type: "error".to_string(),
            error: AnthropicErrorDetails::from(error),
        }
    }
}

/// Model information in Anthropic format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicModel {
    pub id: String,

    /// Always "model"
    #[serde(rename = "type")]
    pub model_type: String,

    pub display_name: String,

    /// RFC 3339 timestamp of the model release.
    pub created_at: String,
}

/// Response for listing available models in Anthropic format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicModelsResponse {
    pub data: Vec<AnthropicModel>,
    pub has_more: bool,
    pub first_id: Option<String>,
    pub last_id: Option<String>,
}

/// Streaming event types for Anthropic SSE responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamEvent {
    /// Start of a message
    MessageStart { message: AnthropicStreamMessageStart },

    /// Content block start
    ContentBlockStart {
        index: u32,
        content_block: AnthropicContent,
    },

    /// Incremental content update
    ContentBlockDelta { index: u32, delta: AnthropicContentDelta },

    /// Content block finished
    ContentBlockStop { index: u32 },

    /// Final message metadata
    MessageDelta {
        delta: AnthropicMessageDelta,
        usage: AnthropicUsage,
    },

    /// End of message stream
    MessageStop,

    /// Error event
    Error { error: AnthropicErrorDetails },
}

impl AnthropicStreamEvent {
    /// The SSE `event:` name, identical to the `type` tag.
    pub fn event_name(&self) -> &'static str {
        match self {
            AnthropicStreamEvent::MessageStart { .. } => "message_start",
            AnthropicStreamEvent::ContentBlockStart { .. } => "content_block_start",
            AnthropicStreamEvent::ContentBlockDelta { .. } => "content_block_delta",
            AnthropicStreamEvent::ContentBlockStop { .. } => "content_block_stop",
            AnthropicStreamEvent::MessageDelta { .. } => "message_delta",
            AnthropicStreamEvent::MessageStop => "message_stop",
            AnthropicStreamEvent::Error { .. } => "error",
        }
    }
}

/// Initial message metadata for streaming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicStreamMessageStart {
    pub id: String,

    /// Always "message"
    #[serde(rename = "type")]
    pub message_type: String,

    pub role: AnthropicRole,

    /// Always empty
    pub content: Vec<AnthropicContent>,

    pub model: String,

    pub stop_reason: Option<AnthropicStopReason>,

    pub stop_sequence: Option<String>,

    pub usage: AnthropicUsage,
}

/// Delta update for content blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentDelta {
    TextDelta { text: String },
    /// Raw fragment of the tool input JSON. Not valid JSON on its own.
    InputJsonDelta { partial_json: String },
    ThinkingDelta { thinking: String },
}

/// Message delta for streaming responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicMessageDelta {
    pub stop_reason: Option<AnthropicStopReason>,
    pub stop_sequence: Option<String>,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

/// Accepts either a string, read as one text block, or a list of blocks.
fn text_or_blocks<'de, D>(deserializer: D) -> Result<Vec<AnthropicContent>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrBlocks {
        Text(String),
        Blocks(Vec<AnthropicContent>),
        Null(()),
    }

    Ok(match TextOrBlocks::deserialize(deserializer)? {
        TextOrBlocks::Text(text) => vec![AnthropicContent::Text { text }],
        TextOrBlocks::Blocks(blocks) => blocks,
        TextOrBlocks::Null(()) => Vec::new(),
    })
}
