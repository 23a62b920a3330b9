//! Shared conversation data model: messages, tool calls, tool results, and
//! the session/connection records that hold them.
//!
//! Assistant↔tool linkage is by id, never by pointer — the history is a flat,
//! append-only sequence (spec §9, "cyclic references").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
    System,
}

/// A structured request, emitted by the LLM, naming a tool and its
/// arguments. Always normalized to this flat shape before it reaches
/// orchestrator code — see [`crate::validator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// One turn in a session's conversation.
///
/// Invariant: every `Role::Tool` message's `tool_call_id` references a
/// `tool_calls[i].id` on an earlier `Role::Assistant` message in the same
/// session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::new(Role::Assistant, content)
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(Role::Tool, content)
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self.role, Role::System)
    }
}

/// The server-produced response to a [`ToolCall`], appended to history as a
/// `Role::Tool` message once serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: String,
    pub tool_call_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_classification: Option<crate::error::ErrorCode>,
    pub execution_time_ms: u64,
}

impl ToolResult {
    pub fn ok(tool_name: impl Into<String>, tool_call_id: impl Into<String>, result: serde_json::Value, execution_time_ms: u64) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_call_id: tool_call_id.into(),
            success: true,
            result: Some(result),
            error: None,
            error_classification: None,
            execution_time_ms,
        }
    }

    pub fn err(
        tool_name: impl Into<String>,
        tool_call_id: impl Into<String>,
        error: impl Into<String>,
        classification: crate::error::ErrorCode,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_call_id: tool_call_id.into(),
            success: false,
            result: None,
            error: Some(error.into()),
            error_classification: Some(classification),
            execution_time_ms,
        }
    }

    /// Serialize this result as the content of the `tool`-role message that
    /// gets appended to history, so the LLM can read (and recover from) it
    /// on the next round.
    pub fn to_message_content(&self) -> String {
        if self.success {
            serde_json::to_string(self.result.as_ref().unwrap_or(&serde_json::Value::Null))
                .unwrap_or_else(|_| "{}".to_string())
        } else {
            serde_json::json!({ "error": self.error.clone().unwrap_or_default() }).to_string()
        }
    }
}

/// Per-session counters surfaced via the metrics snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub message_count: u64,
    pub tool_call_count: u64,
}

/// Per-client mutable conversational state.
///
/// Lifecycle: created on first inbound message for an unknown id (or on
/// connection accept); mutated only by the orchestrator owning that
/// session's request; destroyed by the reaper or on explicit close.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub metrics: SessionMetrics,
    pub max_history: usize,
}

impl Session {
    pub fn new(id: impl Into<String>, max_history: usize) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            messages: Vec::new(),
            created_at: now,
            last_activity: now,
            metrics: SessionMetrics::default(),
            max_history,
        }
    }

    /// Append a message, evicting the oldest non-system message FIFO if
    /// this exceeds `max_history`. System messages are always retained.
    pub fn append(&mut self, message: Message) {
        if matches!(message.role, Role::Assistant) {
            self.metrics.tool_call_count += message.tool_calls.len() as u64;
        }
        self.messages.push(message);
        self.metrics.message_count += 1;
        self.last_activity = Utc::now();
        self.enforce_history_bound();
    }

    fn enforce_history_bound(&mut self) {
        while self.messages.len() > self.max_history {
            let evict_at = self.messages.iter().position(|m| !m.is_system());
            match evict_at {
                Some(idx) => {
                    self.messages.remove(idx);
                }
                None => break, // only system messages remain; nothing more to evict
            }
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn is_expired(&self, now: DateTime<Utc>, session_timeout: chrono::Duration) -> bool {
        now - self.last_activity > session_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_append_tracks_message_count() {
        let mut s = Session::new("s1", 10);
        s.append(Message::user("hi"));
        assert_eq!(s.metrics.message_count, 1);
    }

    #[test]
    fn test_session_history_bound_evicts_oldest_non_system() {
        let mut s = Session::new("s1", 3);
        s.append(Message::new(Role::System, "sys"));
        for i in 0..5 {
            s.append(Message::user(format!("msg{i}")));
        }
        assert_eq!(s.messages.len(), 3);
        assert!(s.messages.iter().any(|m| m.is_system()));
        // the oldest non-system messages (msg0, msg1) should be gone
        assert!(!s.messages.iter().any(|m| m.content == "msg0"));
        assert!(!s.messages.iter().any(|m| m.content == "msg1"));
    }

    #[test]
    fn test_tool_result_message_content_roundtrips_error() {
        let r = ToolResult::err(
            "get_gas_prices",
            "call1",
            "Service unavailable",
            crate::error::ErrorCode::ToolError,
            12,
        );
        let content = r.to_message_content();
        assert!(content.contains("Service unavailable"));
    }
}
