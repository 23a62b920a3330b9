//! Component C — the Tool-Call Validator: normalizes the heterogenous
//! tool-call shapes an LLM may emit into the flat [`ToolCall`] shape the
//! rest of the orchestrator works with (spec §4.C).
//!
//! A call is valid iff it has a non-empty string `id` and a resolvable
//! `name` (top-level or nested `function.name`). Nested
//! `function.arguments` JSON strings are parsed; parse failure drops the
//! call with a warning. Array-typed `arguments` are rejected.

use crate::types::ToolCall;
use serde_json::Value;
use tracing::warn;

/// Accept an arbitrary sequence of raw tool-call JSON values (as emitted by
/// the LLM adapter) and return the filtered, normalized sequence.
pub fn normalize(raw_calls: &[Value]) -> Vec<ToolCall> {
    raw_calls.iter().filter_map(normalize_one).collect()
}

fn normalize_one(raw: &Value) -> Option<ToolCall> {
    let id = raw.get("id").and_then(|v| v.as_str());
    let Some(id) = id.filter(|s| !s.is_empty()) else {
        warn!("dropping tool call with missing or empty id");
        return None;
    };

    // Flat shape: {id, name, arguments}
    if let Some(name) = raw.get("name").and_then(|v| v.as_str()) {
        let arguments = raw.get("arguments").cloned().unwrap_or(Value::Null);
        return finish(id, name, arguments);
    }

    // Nested shape: {id, function: {name, arguments: "json string"}}
    if let Some(function) = raw.get("function") {
        let Some(name) = function.get("name").and_then(|v| v.as_str()) else {
            warn!(tool_call_id = id, "dropping tool call with no resolvable name");
            return None;
        };
        let arguments = match function.get("arguments") {
            Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
                Ok(v) => v,
                Err(e) => {
                    warn!(tool_call_id = id, error = %e, "dropping tool call with unparseable arguments JSON");
                    return None;
                }
            },
            Some(other) => other.clone(),
            None => Value::Null,
        };
        return finish(id, name, arguments);
    }

    warn!(tool_call_id = id, "dropping tool call with no resolvable name");
    None
}

fn finish(id: &str, name: &str, arguments: Value) -> Option<ToolCall> {
    if arguments.is_array() {
        warn!(tool_call_id = id, "dropping tool call with array-typed arguments");
        return None;
    }
    let arguments = if arguments.is_null() {
        Value::Object(Default::default())
    } else {
        arguments
    };
    Some(ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_shape_normalizes() {
        let raw = vec![json!({"id": "c1", "name": "get_gas_prices", "arguments": {"network": "ethereum"}})];
        let calls = normalize(&raw);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_gas_prices");
    }

    #[test]
    fn test_nested_shape_normalizes_and_parses_arguments() {
        let raw = vec![json!({
            "id": "c1",
            "function": {"name": "get_crypto_price", "arguments": "{\"symbol\":\"BTC\"}"}
        })];
        let calls = normalize(&raw);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments.get("symbol").unwrap(), "BTC");
    }

    #[test]
    fn test_missing_id_dropped() {
        let raw = vec![json!({"name": "get_gas_prices", "arguments": {}})];
        assert!(normalize(&raw).is_empty());
    }

    #[test]
    fn test_empty_id_dropped() {
        let raw = vec![json!({"id": "", "name": "get_gas_prices"})];
        assert!(normalize(&raw).is_empty());
    }

    #[test]
    fn test_unresolvable_name_dropped() {
        let raw = vec![json!({"id": "c1"})];
        assert!(normalize(&raw).is_empty());
    }

    #[test]
    fn test_unparseable_nested_arguments_dropped() {
        let raw = vec![json!({
            "id": "c1",
            "function": {"name": "get_gas_prices", "arguments": "not json"}
        })];
        assert!(normalize(&raw).is_empty());
    }

    #[test]
    fn test_array_arguments_rejected() {
        let raw = vec![json!({"id": "c1", "name": "get_gas_prices", "arguments": ["ethereum"]})];
        assert!(normalize(&raw).is_empty());
    }

    #[test]
    fn test_missing_arguments_defaults_to_empty_object() {
        let raw = vec![json!({"id": "c1", "name": "get_gas_prices"})];
        let calls = normalize(&raw);
        assert_eq!(calls.len(), 1);
        assert!(calls[0].arguments.is_object());
    }

    #[test]
    fn test_normalizing_already_normalized_is_identity() {
        let call = ToolCall {
            id: "c1".into(),
            name: "get_gas_prices".into(),
            arguments: json!({"network": "polygon"}),
        };
        let raw = vec![json!({"id": call.id, "name": call.name, "arguments": call.arguments})];
        let result = normalize(&raw);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, call.id);
        assert_eq!(result[0].name, call.name);
        assert_eq!(result[0].arguments, call.arguments);
    }
}
