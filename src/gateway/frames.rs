//! Client-facing wire frames (spec §6). JSON, UTF-8, one frame per
//! WebSocket text message.

use crate::error::Classification;
use crate::orchestrator::AssistantMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound frame from the client. `CHAT_MESSAGE.payload` is left as `Value`
/// and parsed by [`ChatPayload::from_value`] so an unrecognized `type`
/// still deserializes (and can be warned about) instead of failing the
/// whole frame.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatPayload {
    pub message: String,
    #[serde(default)]
    pub history: Option<Vec<crate::types::Message>>,
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum OutboundFrame {
    #[serde(rename = "CONNECTION_ESTABLISHED")]
    ConnectionEstablished {
        payload: ConnectionEstablishedPayload,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "PONG")]
    Pong { id: String, timestamp: DateTime<Utc> },
    #[serde(rename = "CHAT_RESPONSE")]
    ChatResponse {
        id: String,
        payload: ChatResponsePayload,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "STREAM_CHUNK")]
    StreamChunk { id: String, payload: StreamChunkPayload },
    #[serde(rename = "STREAM_END")]
    StreamEnd {
        id: String,
        payload: ChatResponsePayload,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "ERROR")]
    Error {
        id: Option<String>,
        payload: ErrorPayload,
        timestamp: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionEstablishedPayload {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponsePayload {
    pub message: AssistantMessage,
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamChunkPayload {
    pub delta: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub error: ErrorDescriptor,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub classification: Classification,
    #[serde(rename = "suggestedActions")]
    pub suggested_actions: Vec<String>,
}

impl OutboundFrame {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"ERROR","payload":{"error":{"type":"INTERNAL","message":"failed to serialize outbound frame"}}}"#
                .to_string()
        })
    }
}

pub fn error_frame(id: Option<String>, err: &crate::error::Error) -> OutboundFrame {
    let classification = err.classify();
    let kind = serde_json::to_value(classification.category)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "UNKNOWN".into());
    OutboundFrame::Error {
        id,
        payload: ErrorPayload {
            error: ErrorDescriptor {
                kind,
                message: err.user_facing_message(),
                suggested_actions: classification.suggested_actions.clone(),
                classification,
            },
        },
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_frame_parses_chat_message() {
        let raw = r#"{"type":"CHAT_MESSAGE","id":"m1","payload":{"message":"hi"}}"#;
        let frame: InboundFrame = serde_json::from_str(raw).unwrap();
        assert_eq!(frame.kind, "CHAT_MESSAGE");
        let payload: ChatPayload = serde_json::from_value(frame.payload.unwrap()).unwrap();
        assert_eq!(payload.message, "hi");
    }

    #[test]
    fn test_inbound_frame_parses_ping_without_payload() {
        let raw = r#"{"type":"PING","id":"p1"}"#;
        let frame: InboundFrame = serde_json::from_str(raw).unwrap();
        assert_eq!(frame.kind, "PING");
        assert!(frame.payload.is_none());
    }

    #[test]
    fn test_error_frame_serializes_with_matching_id() {
        let err = crate::error::Error::RateLimit("slow down".into());
        let frame = error_frame(Some("m1".into()), &err);
        let json = frame.to_json();
        assert!(json.contains("\"id\":\"m1\""));
        assert!(json.contains("RATE_LIMIT") || json.contains("RateLimit"));
    }
}
