//! OpenAI Chat Completions-style provider: request/response mapping and SSE
//! streaming, behind the [`LlmProvider`] trait.

use super::provider::{
    GenerateOptions, GenerateResult, LlmProvider, StreamChunk, StreamSink, ToolAdvert, Usage,
};
use crate::error::{Error, Result};
use crate::types::{Message, Role, ToolCall};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde_json::{Value, json};

pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, "https://api.openai.com/v1".to_string())
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key: api_key.into(),
        }
    }

    fn role_str(role: Role) -> &'static str {
        match role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
            Role::System => "system",
        }
    }

    fn to_wire_message(m: &Message) -> Value {
        let mut obj = json!({
            "role": Self::role_str(m.role),
            "content": m.content,
        });
        if let Some(o) = obj.as_object_mut() {
            if !m.tool_calls.is_empty() {
                o.insert(
                    "tool_calls".into(),
                    json!(
                        m.tool_calls
                            .iter()
                            .map(|tc| json!({
                                "id": tc.id,
                                "type": "function",
                                "function": {
                                    "name": tc.name,
                                    "arguments": tc.arguments.to_string(),
                                }
                            }))
                            .collect::<Vec<_>>()
                    ),
                );
            }
            if let Some(id) = &m.tool_call_id {
                o.insert("tool_call_id".into(), json!(id));
            }
        }
        obj
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: &[ToolAdvert],
        options: &GenerateOptions,
        stream: bool,
    ) -> Value {
        let mut wire_messages = Vec::with_capacity(messages.len() + 1);
        wire_messages.push(json!({"role": "system", "content": options.system_prompt}));
        wire_messages.extend(messages.iter().map(Self::to_wire_message));

        let mut body = json!({
            "model": options.model,
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
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.schema.to_json_schema(),
                        }
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
                if body.contains("context_length_exceeded") {
                    Error::ContextLengthExceeded(body.to_string())
                } else {
                    Error::NonRetryable(format!("malformed request: {body}"))
                }
            }
            402 | 429 => Error::RateLimit(body.to_string()),
            s if s >= 500 => Error::Llm(format!("server error {s}: {body}")),
            s => Error::Llm(format!("unexpected status {s}: {body}")),
        }
    }

    fn parse_tool_calls(value: &Value) -> Vec<ToolCall> {
        value
            .get("tool_calls")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|tc| {
                        let id = tc.get("id")?.as_str()?.to_string();
                        let func = tc.get("function")?;
                        let name = func.get("name")?.as_str()?.to_string();
                        let args_str = func.get("arguments")?.as_str().unwrap_or("{}");
                        let arguments: Value =
                            serde_json::from_str(args_str).unwrap_or(Value::Object(Default::default()));
                        Some(ToolCall { id, name, arguments })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate(
        &self,
        messages: &[Message],
        tools: &[ToolAdvert],
        options: &GenerateOptions,
    ) -> Result<GenerateResult> {
        let body = self.build_request(messages, tools, options, false);
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
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
        let choice = parsed
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| Error::llm("no choices in response"))?;
        let message = choice
            .get("message")
            .ok_or_else(|| Error::llm("no message in choice"))?;

        Ok(GenerateResult {
            content: message
                .get("content")
                .and_then(|c| c.as_str())
                .unwrap_or_default()
                .to_string(),
            tool_calls: Self::parse_tool_calls(message),
            usage: parsed
                .get("usage")
                .map(|u| Usage {
                    prompt_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
                    completion_tokens: u
                        .get("completion_tokens")
                        .and_then(|v| v.as_u64())
                        .unwrap_or(0) as u32,
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
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(options.timeout)
            .send()
            .await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) => {
                let err = Error::from(e);
                sink.send(StreamChunk::Error {
                    message: err.to_string(),
                })
                .await;
                return Err(err);
            }
        };

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let err = Self::classify_status(status, &text);
            sink.send(StreamChunk::Error {
                message: err.to_string(),
            })
            .await;
            return Err(err);
        }

        let mut content = String::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();
        let mut stream = resp.bytes_stream().eventsource();

        while let Some(event) = stream.next().await {
            let event = match event {
                Ok(e) => e,
                Err(e) => {
                    let err = Error::stream(e.to_string());
                    sink.send(StreamChunk::Error {
                        message: err.to_string(),
                    })
                    .await;
                    return Err(err);
                }
            };
            if event.data == "[DONE]" {
                break;
            }
            let Ok(parsed) = serde_json::from_str::<Value>(&event.data) else {
                continue;
            };
            let Some(delta) = parsed
                .get("choices")
                .and_then(|c| c.get(0))
                .and_then(|c| c.get("delta"))
            else {
                continue;
            };
            if let Some(text) = delta.get("content").and_then(|c| c.as_str()) {
                if !text.is_empty() {
                    content.push_str(text);
                    sink.send(StreamChunk::Content {
                        delta: text.to_string(),
                    })
                    .await;
                }
            }
            if let Some(tc_deltas) = delta.get("tool_calls").and_then(|v| v.as_array()) {
                for tc in tc_deltas {
                    let index = tc.get("index").and_then(|i| i.as_u64()).unwrap_or(0) as usize;
                    let id = tc.get("id").and_then(|i| i.as_str()).map(String::from);
                    let func = tc.get("function");
                    let name = func
                        .and_then(|f| f.get("name"))
                        .and_then(|n| n.as_str())
                        .map(String::from);
                    let args_delta = func
                        .and_then(|f| f.get("arguments"))
                        .and_then(|a| a.as_str())
                        .unwrap_or_default()
                        .to_string();
                    while tool_calls.len() <= index {
                        tool_calls.push(ToolCall {
                            id: String::new(),
                            name: String::new(),
                            arguments: Value::String(String::new()),
                        });
                    }
                    if let Some(id) = &id {
                        tool_calls[index].id = id.clone();
                    }
                    if let Some(name) = &name {
                        tool_calls[index].name = name.clone();
                    }
                    if let Value::String(acc) = &mut tool_calls[index].arguments {
                        acc.push_str(&args_delta);
                    }
                    sink.send(StreamChunk::ToolCallDelta {
                        index,
                        id,
                        name,
                        arguments_delta: args_delta,
                    })
                    .await;
                }
            }
        }

        let final_tool_calls: Vec<ToolCall> = tool_calls
            .into_iter()
            .filter(|tc| !tc.id.is_empty())
            .map(|mut tc| {
                if let Value::String(s) = &tc.arguments {
                    tc.arguments =
                        serde_json::from_str(s).unwrap_or(Value::Object(Default::default()));
                }
                tc
            })
            .collect();

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
