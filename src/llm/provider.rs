//! The uniform request/stream contract every LLM provider implements.
//!
//! Core orchestrator code never sees provider-specific wire shapes — that
//! normalization happens inside each [`LlmProvider`] impl (spec §9,
//! "heterogenous tool-call shapes ... normalized at the provider boundary").

use crate::error::Result;
use crate::tools::schema::ToolSchema;
use crate::types::ToolCall;
use async_trait::async_trait;
use std::time::Duration;

/// Per-call knobs threaded down from [`crate::config::Settings`].
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub system_prompt: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

/// A tool schema as advertised to the LLM (name + description + parameters).
#[derive(Debug, Clone)]
pub struct ToolAdvert {
    pub name: String,
    pub description: String,
    pub schema: ToolSchema,
}

/// Final (non-streaming) result of one LLM call.
#[derive(Debug, Clone, Default)]
pub struct GenerateResult {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// One chunk delivered to a streaming [`StreamSink`]. The adapter guarantees
/// exactly one terminal chunk (`Done` or `Error`) per call.
#[derive(Debug, Clone)]
pub enum StreamChunk {
    Content { delta: String },
    ToolCallDelta { index: usize, id: Option<String>, name: Option<String>, arguments_delta: String },
    Done { content: String, tool_calls: Vec<ToolCall> },
    Error { message: String },
}

/// Sink streaming chunks are delivered to, in order.
#[async_trait]
pub trait StreamSink: Send + Sync {
    async fn send(&self, chunk: StreamChunk);
}

/// A channel-backed [`StreamSink`], used by the gateway to forward chunks
/// onto a connection's outbound queue.
pub struct ChannelSink(pub tokio::sync::mpsc::Sender<StreamChunk>);

#[async_trait]
impl StreamSink for ChannelSink {
    async fn send(&self, chunk: StreamChunk) {
        let _ = self.0.send(chunk).await;
    }
}

/// Uniform interface over provider variants (component A, spec §4.A).
///
/// Implementors are responsible for: mapping [`crate::types::Message`]
/// history and [`ToolAdvert`]s into their wire format, parsing responses
/// back into [`GenerateResult`]/[`StreamChunk`]s, and raising errors the
/// adapter's retry/circuit-breaker layer (see [`crate::llm::retry`],
/// [`crate::llm::circuit_breaker`]) can classify.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(
        &self,
        messages: &[crate::types::Message],
        tools: &[ToolAdvert],
        options: &GenerateOptions,
    ) -> Result<GenerateResult>;

    async fn stream(
        &self,
        messages: &[crate::types::Message],
        tools: &[ToolAdvert],
        options: &GenerateOptions,
        sink: &(dyn StreamSink),
    ) -> Result<GenerateResult>;
}
