//! Anthropic Messages-style provider: system prompt sent out-of-band from
//! the message list, tool use/result blocks instead of OpenAI's flat
//! `tool_calls`/`tool` role — mapped to the same [`LlmProvider`] contract.

use super::provider::{
    GenerateOptions, GenerateResult, LlmProvider, StreamChunk, StreamSink, ToolAdvert, Usage,
};
use crate::error::{Error, Result};
use crate::types::{Message, Role, ToolCall};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde_json::{Value, json};

pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, "https://api.anthropic.com/v1".to_string())
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key: api_key.into(),
        }
    }

    /// Anthropic has no separate `tool` role: tool results are a `user`
    /// message containing a `tool_result` content block.
    fn to_wire_message(m: &Message) -> Option<Value> {
        match m.role {
            Role::System => None, // sent out-of-band via the top-level `system` field
            Role::User => Some(json!({"role": "user", "content": m.content})),
            Role::Assistant => {
                let mut content = Vec::new();
                if !m.content.is_empty() {
                    content.push(json!({"type": "text", "text": m.content}));
                }
                for tc in &m.tool_calls {
                    content.push(json!({
                        "type": "tool_use",
                        "id": tc.id,
                        "name": tc.name,
                        "input": tc.arguments,
                    }));
                }
                Some(json!({"role": "assistant", "content": content}))
            }
            Role::Tool => Some(json!({
                "role": "user",
                "content": [{
                    "type": "tool_result",
                    "tool_use_id": m.tool_call_id.clone().unwrap_or_default(),
                    "content": m.content,
                }]
            })),
        }
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: &[ToolAdvert],
        options: &GenerateOptions,
        stream: bool,
    ) -> Value {
        let wire_messages: Vec<Value> = messages.iter().filter_map(Self::to_wire_message).collect();
        let mut body = json!({
            "model": options.model,
            "system": options.system_prompt,
            "messages": wire_messages,
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
            "stream": stream,
        });
        if !tools.is_empty() {
            body["tools"] = json!(
                tools
                    .iter()
                    .map(|t| json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.schema.to_json_schema(),
                    }))
                    .collect::<Vec<_>>()
            );
        }
        body
    }

    fn classify_status(status: reqwest::StatusCode, body: &str) -> Error {
        match status.as_u16() {
            401 | 403 => Error::NonRetryable(format!("auth failure: {body}")),
            400 => {
                if body.contains("prompt is too long") || body.contains("context") {
                    Error::ContextLengthExceeded(body.to_string())
                } else {
                    Error::NonRetryable(format!("malformed request: {body}"))
                }
            }
            429 => Error::RateLimit(body.to_string()),
            529 => Error::RateLimit(body.to_string()),
            s if s >= 500 => Error::Llm(format!("server error {s}: {body}")),
            s => Error::Llm(format!("unexpected status {s}: {body}")),
        }
    }

    fn parse_content(value: &Value) -> (String, Vec<ToolCall>) {
        let mut content = String::new();
        let mut tool_calls = Vec::new();
        if let Some(blocks) = value.get("content").and_then(|c| c.as_array()) {
            for block in blocks {
                match block.get("type").and_then(|t| t.as_str()) {
                    Some("text") => {
                        if let Some(t) = block.get("text").and_then(|t| t.as_str()) {
                            content.push_str(t);
                        }
                    }
                    Some("tool_use") => {
                        let id = block
                            .get("id")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string();
                        let name = block
                            .get("name")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string();
                        let arguments = block.get("input").cloned().unwrap_or(Value::Null);
                        tool_calls.push(ToolCall { id, name, arguments });
                    }
                    _ => {}
                }
            }
        }
        (content, tool_calls)
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn generate(
        &self,
        messages: &[Message],
        tools: &[ToolAdvert],
        options: &GenerateOptions,
    ) -> Result<GenerateResult> {
        let body = self.build_request(messages, tools, options, false);
        let resp = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .timeout(options.timeout)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(Self::classify_status(status, &text));
        }

        let parsed: Value = serde_json::from_str(&text)?;
        let (content, tool_calls) = Self::parse_content(&parsed);
        Ok(GenerateResult {
            content,
            tool_calls,
            usage: parsed
                .get("usage")
                .map(|u| Usage {
                    prompt_tokens: u.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                    completion_tokens: u.get("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0)
                        as u32,
                })
                .unwrap_or_default(),
        })
    }

    async fn stream(
        &self,
        messages: &[Message],
        tools: &[ToolAdvert],
        options: &GenerateOptions,
        sink: &(dyn StreamSink),
    ) -> Result<GenerateResult> {
        let body = self.build_request(messages, tools, options, true);
        let resp = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .timeout(options.timeout)
            .send()
            .await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) => {
                let err = Error::from(e);
                sink.send(StreamChunk::Error { message: err.to_string() }).await;
                return Err(err);
            }
        };

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let err = Self::classify_status(status, &text);
            sink.send(StreamChunk::Error { message: err.to_string() }).await;
            return Err(err);
        }

        let mut content = String::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();
        let mut pending_json: std::collections::HashMap<usize, String> = Default::default();
        let mut stream = resp.bytes_stream().eventsource();

        while let Some(event) = stream.next().await {
            let event = match event {
                Ok(e) => e,
                Err(e) => {
                    let err = Error::stream(e.to_string());
                    sink.send(StreamChunk::Error { message: err.to_string() }).await;
                    return Err(err);
                }
            };
            let Ok(parsed) = serde_json::from_str::<Value>(&event.data) else {
                continue;
            };
            match parsed.get("type").and_then(|t| t.as_str()) {
                Some("content_block_start") => {
                    let index = parsed.get("index").and_then(|i| i.as_u64()).unwrap_or(0) as usize;
                    if let Some(block) = parsed.get("content_block") {
                        if block.get("type").and_then(|t| t.as_str()) == Some("tool_use") {
                            let id = block.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                            let name = block.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                            while tool_calls.len() <= index {
                                tool_calls.push(ToolCall {
                                    id: String::new(),
                                    name: String::new(),
                                    arguments: Value::Null,
                                });
                            }
                            tool_calls[index].id = id.clone();
                            tool_calls[index].name = name.clone();
                            pending_json.insert(index, String::new());
                            sink.send(StreamChunk::ToolCallDelta {
                                index,
                                id: Some(id),
                                name: Some(name),
                                arguments_delta: String::new(),
                            })
                            .await;
                        }
                    }
                }
                Some("content_block_delta") => {
                    let index = parsed.get("index").and_then(|i| i.as_u64()).unwrap_or(0) as usize;
                    if let Some(delta) = parsed.get("delta") {
                        match delta.get("type").and_then(|t| t.as_str()) {
                            Some("text_delta") => {
                                if let Some(t) = delta.get("text").and_then(|v| v.as_str()) {
                                    content.push_str(t);
                                    sink.send(StreamChunk::Content { delta: t.to_string() }).await;
                                }
                            }
                            Some("input_json_delta") => {
                                if let Some(partial) =
                                    delta.get("partial_json").and_then(|v| v.as_str())
                                {
                                    pending_json.entry(index).or_default().push_str(partial);
                                    sink.send(StreamChunk::ToolCallDelta {
                                        index,
                                        id: None,
                                        name: None,
                                        arguments_delta: partial.to_string(),
                                    })
                                    .await;
                                }
                            }
                            _ => {}
                        }
                    }
                }
                Some("message_stop") => break,
                _ => {}
            }
        }

        for (index, json_str) in pending_json {
            if let Some(tc) = tool_calls.get_mut(index) {
                tc.arguments =
                    serde_json::from_str(&json_str).unwrap_or(Value::Object(Default::default()));
            }
        }
        let final_tool_calls: Vec<ToolCall> =
            tool_calls.into_iter().filter(|tc| !tc.id.is_empty()).collect();

        sink.send(StreamChunk::Done {
            content: content.clone(),
            tool_calls: final_tool_calls.clone(),
        })
        .await;

        Ok(GenerateResult {
            content,
            tool_calls: final_tool_calls,
            usage: Usage::default(),
        })
    }
}
