//! Component A — the LLM Adapter: a uniform request/stream interface over
//! provider variants, with retry, circuit-breaking, and system-prompt
//! caching layered on top of a bare [`provider::LlmProvider`].

pub mod anthropic;
pub mod cache;
pub mod circuit_breaker;
pub mod openai;
pub mod provider;
pub mod retry;

pub use provider::{
    ChannelSink, GenerateOptions, GenerateResult, LlmProvider, StreamChunk, StreamSink, ToolAdvert,
    Usage,
};

use crate::error::{Error, Result};
use crate::types::Message;
use cache::PromptCache;
use circuit_breaker::CircuitBreaker;
use std::time::Duration;

/// Wraps a bare [`LlmProvider`] with retry/backoff, a circuit breaker, and
/// a system-prompt cache — the full contract described in spec §4.A.
pub struct Adapter {
    provider: Box<dyn LlmProvider>,
    circuit: CircuitBreaker,
    cache: PromptCache,
    retry_base: Duration,
    max_retries: u32,
    max_system_prompt_length: usize,
}

impl Adapter {
    pub fn new(
        provider: Box<dyn LlmProvider>,
        failure_threshold: u32,
        reset_timeout: Duration,
        retry_base: Duration,
        max_retries: u32,
        max_system_prompt_length: usize,
    ) -> Self {
        Self {
            provider,
            circuit: CircuitBreaker::new(failure_threshold, reset_timeout),
            cache: PromptCache::new(),
            retry_base,
            max_retries,
            max_system_prompt_length,
        }
    }

    pub fn circuit_state(&self) -> circuit_breaker::CircuitState {
        self.circuit.state()
    }

    fn validate_system_prompt(&self, options: &GenerateOptions) -> Result<()> {
        if options.system_prompt.trim().is_empty() {
            return Err(Error::config("system prompt must be non-empty"));
        }
        if options.system_prompt.len() > self.max_system_prompt_length {
            return Err(Error::SystemPromptTooLarge(format!(
                "system prompt is {} chars, limit is {}",
                options.system_prompt.len(),
                self.max_system_prompt_length
            )));
        }
        // Touching the cache here is what "validation avoids repeated
        // allocation" buys us: a previously-seen prompt short-circuits
        // re-preparing the payload on the provider side.
        if self.cache.get(&options.system_prompt).is_none() {
            self.cache
                .put(options.system_prompt.clone(), options.system_prompt.clone());
        }
        Ok(())
    }

    /// Non-streaming generate, per spec §4.A. Fails fast with
    /// `Error::ServiceUnavailable` when the breaker is open; otherwise
    /// retries retryable failures with backoff up to `max_retries`.
    pub async fn generate(
        &self,
        messages: &[Message],
        tools: &[ToolAdvert],
        options: &GenerateOptions,
    ) -> Result<GenerateResult> {
        self.validate_system_prompt(options)?;

        if !self.circuit.allow() {
            return Err(Error::ServiceUnavailable(
                "circuit breaker open for this provider".into(),
            ));
        }

        let result = retry::with_retry(self.retry_base, self.max_retries, |_attempt| {
            self.provider.generate(messages, tools, options)
        })
        .await;

        match &result {
            Ok(_) => self.circuit.on_success(),
            Err(e) if retry::classify(e) == retry::RetryClass::Retryable => self.circuit.on_failure(),
            Err(_) => {} // non-retryable failures are caller error, not upstream instability
        }
        result
    }

    /// Streaming generate, per spec §4.A. Streaming retries restart from
    /// the first chunk; the sink observes at most one terminal chunk per
    /// call (the provider impls guarantee this; this wrapper doesn't
    /// re-send a terminal chunk for a retry that then succeeds — only the
    /// final attempt's terminal chunk reaches the sink).
    pub async fn stream(
        &self,
        messages: &[Message],
        tools: &[ToolAdvert],
        options: &GenerateOptions,
        sink: &(dyn StreamSink),
    ) -> Result<GenerateResult> {
        self.validate_system_prompt(options)?;

        if !self.circuit.allow() {
            let err = Error::ServiceUnavailable("circuit breaker open for this provider".into());
            sink.send(StreamChunk::Error {
                message: err.to_string(),
            })
            .await;
            return Err(err);
        }

        // Buffer chunks from non-final attempts so a retryable mid-stream
        // failure doesn't leak a premature terminal chunk to the caller's
        // sink; only the attempt that finishes (success or final failure)
        // forwards to `sink`.
        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            let buffered = BufferingSink::default();
            let outcome = self.provider.stream(messages, tools, options, &buffered).await;
            match outcome {
                Ok(result) => {
                    buffered.flush_to(sink).await;
                    self.circuit.on_success();
                    return Ok(result);
                }
                Err(e) => {
                    let retryable = retry::classify(&e) == retry::RetryClass::Retryable;
                    if retryable {
                        self.circuit.on_failure();
                    }
                    if !retryable || attempt == self.max_retries {
                        buffered.flush_to(sink).await;
                        return Err(e);
                    }
                    last_err = Some(e);
                    tokio::time::sleep(retry::backoff_delay(self.retry_base, attempt)).await;
                }
            }
        }
        let err = last_err.unwrap_or_else(|| Error::other("stream retry loop exhausted"));
        sink.send(StreamChunk::Error {
            message: err.to_string(),
        })
        .await;
        Err(err)
    }
}

/// Collects chunks from one attempt so a retried attempt's partial output
/// never reaches the real sink.
#[derive(Default)]
struct BufferingSink {
    chunks: std::sync::Mutex<Vec<StreamChunk>>,
}

#[async_trait::async_trait]
impl StreamSink for BufferingSink {
    async fn send(&self, chunk: StreamChunk) {
        self.chunks.lock().unwrap().push(chunk);
    }
}

impl BufferingSink {
    async fn flush_to(&self, sink: &(dyn StreamSink)) {
        let chunks = std::mem::take(&mut *self.chunks.lock().unwrap());
        for chunk in chunks {
            sink.send(chunk).await;
        }
    }
}
