//! Wire types of both protocols.
//!
//! Callers speak Anthropic Messages, the upstream speaks OpenAI chat completions.

pub(crate) mod anthropic;
pub(crate) mod openai;
