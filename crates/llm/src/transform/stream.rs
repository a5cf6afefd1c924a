//! Streaming translation from OpenAI chat completion chunks to Anthropic stream events.

use std::collections::HashSet;

use futures::{Stream, StreamExt, stream};
use serde_json::Value;

use super::{content, response::message_id, stop_reason};
use crate::{
    error::LlmError,
    messages::{
        anthropic::{
            AnthropicContent, AnthropicContentDelta, AnthropicErrorDetails, AnthropicMessageDelta, AnthropicRole,
            AnthropicStopReason, AnthropicStreamEvent, AnthropicStreamMessageStart, AnthropicUsage,
        },
        openai::{ChatCompletionChunk, ChunkChoice, FinishReason, ToolCallDelta, Usage},
    },
    provider::ChatCompletionStream,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No chunk seen yet, `message_start` not sent.
    NotStarted,
    Streaming,
    /// Finish reason seen, waiting for a usage chunk.
    Draining,
    /// `message_stop` sent.
    Finished,
}

/// The content block currently receiving fragments.
#[derive(Debug)]
enum OpenBlock {
    Text {
        index: u32,
        text: String,
    },
    Thinking {
        index: u32,
        thinking: String,
    },
    Tool {
        index: u32,
        upstream_index: u32,
        id: String,
        name: String,
        arguments: String,
    },
    /// A tool call whose name has not arrived yet. It has no block index until it opens.
    PendingTool {
        upstream_index: u32,
        id: Option<String>,
        arguments: String,
    },
}

/// Per-stream state turning upstream chunks into an Anthropic event sequence.
///
/// The produced sequence always follows the Anthropic grammar: one `message_start`, any
/// number of well-nested content blocks with increasing indices, then `message_delta` and
/// `message_stop`, no matter how the upstream stream ends.
#[derive(Debug)]
pub(crate) struct StreamTranslator {
    message_id: String,
    model: String,
    estimated_input_tokens: u32,
    phase: Phase,
    next_index: u32,
    open: Option<OpenBlock>,
    seen_tool_indices: HashSet<u32>,
    seen_tool_ids: HashSet<String>,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
    tool_use_emitted: bool,
    content: Vec<AnthropicContent>,
}

impl StreamTranslator {
    /// `model` is echoed back to the caller, `estimated_input_tokens` is reported until
    /// the upstream sends real usage.
    pub(crate) fn new(model: String, estimated_input_tokens: u32) -> Self {
        Self {
            message_id: message_id(),
            model,
            estimated_input_tokens,
            phase: Phase::NotStarted,
            next_index: 0,
            open: None,
            seen_tool_indices: HashSet::new(),
            seen_tool_ids: HashSet::new(),
            finish_reason: None,
            usage: None,
            tool_use_emitted: false,
            content: Vec::new(),
        }
    }

    /// Blocks finalized so far, in index order.
    pub(crate) fn content(&self) -> &[AnthropicContent] {
        &self.content
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Translates one upstream chunk.
    pub(crate) fn push(&mut self, chunk: ChatCompletionChunk) -> Vec<AnthropicStreamEvent> {
        let mut events = Vec::new();

        match self.phase {
            Phase::Finished => return events,
            Phase::NotStarted => self.start(&mut events),
            Phase::Streaming | Phase::Draining => {}
        }

        if let Some(usage) = chunk.usage {
            self.usage = Some(usage);
        }

        if self.phase == Phase::Streaming {
            // Only the first choice is translated.
            if let Some(choice) = chunk.choices.into_iter().find(|choice| choice.index == 0) {
                self.push_choice(choice, &mut events);
            }
        }

        if self.phase == Phase::Draining && self.usage.is_some() {
            self.finalize(&mut events);
        }

        events
    }

    /// Terminates the message after the upstream stream ended.
    ///
    /// Without a finish reason the message stops with `pause_turn`.
    pub(crate) fn finish(&mut self) -> Vec<AnthropicStreamEvent> {
        let mut events = Vec::new();

        match self.phase {
            Phase::Finished => return events,
            Phase::NotStarted => self.start(&mut events),
            Phase::Streaming => log::warn!("Upstream stream ended without a finish reason"),
            Phase::Draining => {}
        }

        self.close_open(&mut events);
        self.finalize(&mut events);

        events
    }

    /// Terminates the message after an upstream failure, reporting it as an `error` event.
    pub(crate) fn abort(&mut self, error: &LlmError) -> Vec<AnthropicStreamEvent> {
        let mut events = Vec::new();

        match self.phase {
            Phase::Finished => return events,
            Phase::NotStarted => self.start(&mut events),
            Phase::Streaming | Phase::Draining => {}
        }

        self.close_open(&mut events);

        events.push(AnthropicStreamEvent::Error {
            error: AnthropicErrorDetails::from(error),
        });

        self.finalize(&mut events);

        events
    }

    fn start(&mut self, events: &mut Vec<AnthropicStreamEvent>) {
        self.phase = Phase::Streaming;

        events.push(AnthropicStreamEvent::MessageStart {
            message: AnthropicStreamMessageStart {
                id: self.message_id.clone(),
                message_type: "message".to_string(),
                role: AnthropicRole::Assistant,
                content: Vec::new(),
                model: self.model.clone(),
                stop_reason: None,
                stop_sequence: None,
                usage: AnthropicUsage {
                    input_tokens: self.estimated_input_tokens,
                    output_tokens: 0,
                },
            },
        });
    }

    fn push_choice(&mut self, mut choice: ChunkChoice, events: &mut Vec<AnthropicStreamEvent>) {
        if let Some(reasoning) = choice.delta.take_reasoning() {
            self.push_thinking(reasoning, events);
        }

        if let Some(text) = choice.delta.content.take() {
            self.push_text(text, events);
        }

        for call in choice.delta.tool_calls.take().into_iter().flatten() {
            self.push_tool_call(call, events);
        }

        if let Some(finish_reason) = choice.finish_reason {
            self.close_open(events);
            self.finish_reason = Some(finish_reason);
            self.phase = Phase::Draining;
        }
    }

    fn push_text(&mut self, text: String, events: &mut Vec<AnthropicStreamEvent>) {
        if text.is_empty() {
            return;
        }

        let index = match &mut self.open {
            Some(OpenBlock::Text { index, text: buffer }) => {
                buffer.push_str(&text);
                *index
            }
            _ => {
                self.close_open(events);

                let index = self.next_block_index();

                events.push(AnthropicStreamEvent::ContentBlockStart {
                    index,
                    content_block: AnthropicContent::Text { text: String::new() },
                });

                self.open = Some(OpenBlock::Text {
                    index,
                    text: text.clone(),
                });

                index
            }
        };

        events.push(AnthropicStreamEvent::ContentBlockDelta {
            index,
            delta: AnthropicContentDelta::TextDelta { text },
        });
    }

    fn push_thinking(&mut self, thinking: String, events: &mut Vec<AnthropicStreamEvent>) {
        let index = match &mut self.open {
            Some(OpenBlock::Thinking {
                index,
                thinking: buffer,
            }) => {
                buffer.push_str(&thinking);
                *index
            }
            _ => {
                self.close_open(events);

                let index = self.next_block_index();

                events.push(AnthropicStreamEvent::ContentBlockStart {
                    index,
                    content_block: AnthropicContent::Thinking {
                        thinking: String::new(),
                        signature: Some(content::REASONING_SIGNATURE.to_string()),
                    },
                });

                self.open = Some(OpenBlock::Thinking {
                    index,
                    thinking: thinking.clone(),
                });

                index
            }
        };

        events.push(AnthropicStreamEvent::ContentBlockDelta {
            index,
            delta: AnthropicContentDelta::ThinkingDelta { thinking },
        });
    }

    fn push_tool_call(&mut self, call: ToolCallDelta, events: &mut Vec<AnthropicStreamEvent>) {
        let (name, fragment) = call
            .function
            .map(|function| {
                (
                    function.name.filter(|name| !name.is_empty()),
                    function.arguments.unwrap_or_default(),
                )
            })
            .unwrap_or_default();

        if !self.continues_open_tool(call.index, call.id.as_deref()) {
            let is_new = match call.id.as_deref() {
                Some(id) => !self.seen_tool_ids.contains(id),
                None => !self.seen_tool_indices.contains(&call.index),
            };

            if !is_new {
                log::warn!("Dropping fragment for tool call {} after its block was closed", call.index);
                return;
            }

            self.close_open(events);
            self.seen_tool_indices.insert(call.index);

            self.open = Some(OpenBlock::PendingTool {
                upstream_index: call.index,
                id: None,
                arguments: String::new(),
            });
        }

        let mut ready_name = None;

        match &mut self.open {
            Some(OpenBlock::PendingTool { id, arguments, .. }) => {
                if let Some(new_id) = call.id.filter(|_| id.is_none()) {
                    self.seen_tool_ids.insert(new_id.clone());
                    *id = Some(new_id);
                }

                arguments.push_str(&fragment);
                ready_name = name;
            }
            Some(OpenBlock::Tool { index, arguments, .. }) if !fragment.is_empty() => {
                arguments.push_str(&fragment);

                events.push(AnthropicStreamEvent::ContentBlockDelta {
                    index: *index,
                    delta: AnthropicContentDelta::InputJsonDelta { partial_json: fragment },
                });
            }
            _ => {}
        }

        if let Some(name) = ready_name {
            self.open_pending_tool(name, events);
        }
    }

    /// Whether a tool call fragment belongs to the open tool block.
    fn continues_open_tool(&self, upstream_index: u32, new_id: Option<&str>) -> bool {
        match &self.open {
            Some(OpenBlock::Tool {
                upstream_index: open_index,
                id,
                ..
            }) => *open_index == upstream_index && new_id.is_none_or(|new_id| new_id == id.as_str()),
            Some(OpenBlock::PendingTool {
                upstream_index: open_index,
                id,
                ..
            }) => *open_index == upstream_index && (id.as_deref().is_none() || new_id.is_none() || id.as_deref() == new_id),
            _ => false,
        }
    }

    /// Opens a pending tool block, flushing the arguments buffered so far as one delta.
    fn open_pending_tool(&mut self, name: String, events: &mut Vec<AnthropicStreamEvent>) {
        let Some(OpenBlock::PendingTool {
            upstream_index,
            id,
            arguments,
        }) = self.open.take()
        else {
            return;
        };

        let index = self.next_block_index();
        let id = id.unwrap_or_else(content::tool_use_id);

        events.push(AnthropicStreamEvent::ContentBlockStart {
            index,
            content_block: AnthropicContent::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: Value::Object(Default::default()),
            },
        });

        if !arguments.is_empty() {
            events.push(AnthropicStreamEvent::ContentBlockDelta {
                index,
                delta: AnthropicContentDelta::InputJsonDelta {
                    partial_json: arguments.clone(),
                },
            });
        }

        self.open = Some(OpenBlock::Tool {
            index,
            upstream_index,
            id,
            name,
            arguments,
        });
    }

    fn close_open(&mut self, events: &mut Vec<AnthropicStreamEvent>) {
        if let Some(OpenBlock::PendingTool { upstream_index, .. }) = &self.open {
            log::warn!("Tool call {upstream_index} ended before its name arrived");
            self.open_pending_tool(String::new(), events);
        }

        let Some(block) = self.open.take() else {
            return;
        };

        let (index, block) = match block {
            OpenBlock::Text { index, text } => (index, AnthropicContent::Text { text }),
            OpenBlock::Thinking { index, thinking } => (
                index,
                AnthropicContent::Thinking {
                    thinking,
                    signature: Some(content::REASONING_SIGNATURE.to_string()),
                },
            ),
            OpenBlock::Tool {
                index,
                id,
                name,
                arguments,
                ..
            } => {
                self.tool_use_emitted = true;
                let input = content::parse_tool_input(&arguments, &name);

                (index, AnthropicContent::ToolUse { id, name, input })
            }
            OpenBlock::PendingTool { .. } => return,
        };

        events.push(AnthropicStreamEvent::ContentBlockStop { index });
        self.content.push(block);
    }

    fn finalize(&mut self, events: &mut Vec<AnthropicStreamEvent>) {
        let stop_reason = match self.phase {
            Phase::Draining => stop_reason(self.finish_reason.as_ref(), self.tool_use_emitted),
            Phase::NotStarted | Phase::Streaming | Phase::Finished => AnthropicStopReason::PauseTurn,
        };

        let usage = match self.usage {
            Some(usage) => AnthropicUsage::from(usage),
            None => AnthropicUsage {
                input_tokens: self.estimated_input_tokens,
                output_tokens: 0,
            },
        };

        events.push(AnthropicStreamEvent::MessageDelta {
            delta: AnthropicMessageDelta {
                stop_reason: Some(stop_reason),
                stop_sequence: None,
            },
            usage,
        });

        events.push(AnthropicStreamEvent::MessageStop);
        self.phase = Phase::Finished;

        log::debug!(
            "Streamed message {} finished with {stop_reason} after {} content blocks: {:?}",
            self.message_id,
            self.content.len(),
            self.content
        );
    }

    fn next_block_index(&mut self) -> u32 {
        let index = self.next_index;
        self.next_index += 1;
        index
    }
}

/// Drives a translator over an upstream chunk stream.
///
/// The upstream is polled only when the previous events were consumed, and it is dropped
/// as soon as the message is finished.
pub(crate) fn translate_stream(
    upstream: ChatCompletionStream,
    translator: StreamTranslator,
) -> impl Stream<Item = AnthropicStreamEvent> + Send {
    stream::unfold(Some((upstream, translator)), |state| async move {
        let (mut upstream, mut translator) = state?;

        match upstream.next().await {
            Some(Ok(chunk)) => {
                let events = translator.push(chunk);
                let next = (!translator.is_finished()).then_some((upstream, translator));

                Some((events, next))
            }
            Some(Err(error)) => {
                log::error!("Upstream stream failed: {error}");
                Some((translator.abort(&error), None))
            }
            None => Some((translator.finish(), None)),
        }
    })
    .flat_map(stream::iter)
}
