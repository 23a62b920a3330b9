//! Error types for the conversation orchestrator.
//!
//! Every fallible operation in this crate returns [`Result<T>`]. Each [`Error`]
//! variant carries enough information to be classified (see [`Classification`])
//! so that callers — the orchestrator, the gateway — can decide whether to
//! retry, surface the failure to the user, or recover silently.
//!
//! ## Design Philosophy
//!
//! - **Explicit Error Handling**: `Result<T>` for all fallible operations, no
//!   silent failures.
//! - **Classification, not exceptions**: retry/circuit-breaker decisions are a
//!   pure function of the error kind (`Error::classify`), never exception
//!   unwinding.
//! - **Easy conversion**: `#[from]` on the wrapping variants keeps `?` usable
//!   across HTTP, JSON, and timeout boundaries.

use thiserror::Error;

/// Type alias for `Result<T, Error>` used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Severity of an error, used to decide how loudly to log and surface it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// The taxonomy category named in spec §7, stable across releases since
/// clients pattern-match on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    LlmError,
    RateLimit,
    ServiceUnavailable,
    ValidationError,
    SystemPromptTooLarge,
    ToolError,
    UnknownTool,
    SessionNotFound,
    InvalidMessage,
    Cancelled,
    Config,
}

/// Classification attached to every error: category, severity, and whether a
/// caller should retry. Mirrors the `{category, severity, retryable}` shape in
/// spec §6/§7 so it serializes directly into an `ERROR` frame.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Classification {
    pub category: ErrorCode,
    pub severity: Severity,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_actions: Vec<String>,
}

/// Comprehensive error type covering every failure mode in the orchestrator.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport failure talking to an LLM provider or tool data source.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration detected at startup validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// Upstream LLM provider returned an error response after retries were
    /// exhausted, or a transport failure that isn't classified more
    /// specifically below.
    #[error("LLM provider error: {0}")]
    Llm(String),

    /// The LLM or a tool's upstream was rate-limited.
    #[error("rate limited: {0}")]
    RateLimit(String),

    /// The circuit breaker for this provider is open; calls fail fast.
    #[error("service unavailable (circuit open): {0}")]
    ServiceUnavailable(String),

    /// An authentication, quota, or malformed-request failure that must not
    /// be retried.
    #[error("non-retryable provider error: {0}")]
    NonRetryable(String),

    /// The conversation's context length exceeds what the provider accepts.
    #[error("context length exceeded: {0}")]
    ContextLengthExceeded(String),

    /// System prompt is empty or exceeds `maxSystemPromptLength`.
    #[error("system prompt too large: {0}")]
    SystemPromptTooLarge(String),

    /// Malformed user input (e.g. an invalid tool argument).
    #[error("validation error: {0}")]
    Validation(String),

    /// A tool name the LLM requested is not registered.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// An individual tool invocation failed. Never surfaced as a terminal
    /// error — captured as a [`crate::types::ToolResult`] instead.
    #[error("tool execution error: {0}")]
    Tool(String),

    /// No session exists for the given id.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// A client frame failed to parse or violated the protocol.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Request was cancelled by a connection close. Never surfaced to the
    /// user — no reply is sent.
    #[error("request cancelled")]
    Cancelled,

    /// Request exceeded `requestTimeout`, `llmTimeout`, or `toolTimeout`.
    #[error("operation timed out")]
    Timeout,

    /// Catch-all for conditions that don't fit the categories above.
    #[error("error: {0}")]
    Other(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn llm(msg: impl Into<String>) -> Self {
        Error::Llm(msg.into())
    }

    /// An SSE stream failure mid-response; treated as a provider error for
    /// retry/circuit-breaker classification purposes.
    pub fn stream(msg: impl Into<String>) -> Self {
        Error::Llm(format!("stream error: {}", msg.into()))
    }

    pub fn tool(msg: impl Into<String>) -> Self {
        Error::Tool(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn invalid_message(msg: impl Into<String>) -> Self {
        Error::InvalidMessage(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    pub fn timeout() -> Self {
        Error::Timeout
    }

    /// Map this error to the classification taxonomy defined in spec §7.
    ///
    /// This is the single place that decides category/severity/retryability;
    /// the orchestrator and gateway never inspect error variants directly.
    pub fn classify(&self) -> Classification {
        use ErrorCode::*;
        use Severity::*;

        match self {
            Error::RateLimit(_) => Classification {
                category: RateLimit,
                severity: Medium,
                retryable: true,
                suggested_actions: vec!["wait a few seconds and try again".into()],
            },
            Error::ServiceUnavailable(_) => Classification {
                category: ServiceUnavailable,
                severity: High,
                retryable: true,
                suggested_actions: vec!["try again shortly".into()],
            },
            Error::Llm(_) | Error::Http(_) | Error::Timeout => Classification {
                category: LlmError,
                severity: Medium,
                retryable: true,
                suggested_actions: vec!["wait and retry".into()],
            },
            Error::Validation(_) => Classification {
                category: ValidationError,
                severity: Low,
                retryable: false,
                suggested_actions: vec!["check the request and try again".into()],
            },
            Error::SystemPromptTooLarge(_) => Classification {
                category: SystemPromptTooLarge,
                severity: High,
                retryable: false,
                suggested_actions: vec!["shorten the system prompt".into()],
            },
            Error::ContextLengthExceeded(_) | Error::NonRetryable(_) | Error::Config(_) => {
                Classification {
                    category: ValidationError,
                    severity: High,
                    retryable: false,
                    suggested_actions: vec![],
                }
            }
            Error::Tool(_) => Classification {
                category: ToolError,
                severity: Low,
                retryable: false,
                suggested_actions: vec![],
            },
            Error::UnknownTool(_) => Classification {
                category: UnknownTool,
                severity: Low,
                retryable: false,
                suggested_actions: vec![],
            },
            Error::SessionNotFound(_) => Classification {
                category: SessionNotFound,
                severity: Low,
                retryable: false,
                suggested_actions: vec![],
            },
            Error::InvalidMessage(_) | Error::Json(_) => Classification {
                category: InvalidMessage,
                severity: Low,
                retryable: false,
                suggested_actions: vec![],
            },
            Error::Cancelled => Classification {
                category: Cancelled,
                severity: Low,
                retryable: false,
                suggested_actions: vec![],
            },
            Error::Other(_) => Classification {
                category: InvalidMessage,
                severity: Medium,
                retryable: false,
                suggested_actions: vec![],
            },
        }
    }

    /// A short, user-safe apology to embed as `content` on a failed
    /// `CHAT_RESPONSE`. Never includes internal error detail.
    pub fn user_facing_message(&self) -> String {
        match self.classify().category {
            ErrorCode::RateLimit => {
                "I'm getting rate-limited right now — please try again in a moment.".into()
            }
            ErrorCode::ServiceUnavailable => {
                "The assistant is temporarily unavailable. Please try again shortly.".into()
            }
            ErrorCode::SystemPromptTooLarge => {
                "This session's configuration is invalid. Please contact support.".into()
            }
            _ => "Sorry, I ran into a problem answering that. Please try again.".into(),
        }
    }
}
