//! Component D — the Result Formatter: reshapes raw tool outputs into a
//! uniform, presentation-oriented shape and flags partial failures (spec
//! §4.D).

use crate::types::ToolResult;
use serde::Serialize;
use serde_json::{json, Value};

/// The fixed `toolName -> type` mapping from spec §4.D.
fn type_for_tool(tool_name: &str) -> Option<&'static str> {
    match tool_name {
        "get_gas_prices" => Some("gas_prices"),
        "get_crypto_price" => Some("crypto_price"),
        "get_lending_rates" => Some("lending_rates"),
        "get_token_balance" => Some("token_balance"),
        "get_all_token_balances" => Some("portfolio"),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum FormattedEntry {
    Success {
        #[serde(rename = "type")]
        kind: String,
        data: Value,
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
    },
    Failure {
        #[serde(rename = "type")]
        kind: String,
        message: String,
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct FormattedResults {
    pub results: Vec<FormattedEntry>,
    #[serde(rename = "hasErrors")]
    pub has_errors: bool,
    #[serde(rename = "errorCount")]
    pub error_count: usize,
}

/// Gas-price reshape: `{slow, standard, fast}` as `{gwei, usdCost}`,
/// matching the illustrative example in spec §4.D. Other tool types pass
/// their raw result through — the mapping table only fixes the `type`
/// discriminant, not every tool's internal shape.
fn reshape_gas_prices(raw: &Value) -> Value {
    let tiers = raw.get("gasPrices").cloned().unwrap_or(Value::Null);
    let tier = |name: &str| -> Value {
        let entry = tiers.get(name);
        json!({
            "gwei": entry.and_then(|v| v.get("gwei")).cloned().unwrap_or(Value::Null),
            "usdCost": entry.and_then(|v| v.get("usdCost")).cloned().unwrap_or(Value::Null),
        })
    };
    json!({
        "slow": tier("slow"),
        "standard": tier("standard"),
        "fast": tier("fast"),
    })
}

pub fn format_results(results: &[ToolResult]) -> FormattedResults {
    let mut error_count = 0usize;
    let entries = results
        .iter()
        .map(|r| {
            if r.success {
                let kind = type_for_tool(&r.tool_name).unwrap_or("unknown").to_string();
                let raw = r.result.clone().unwrap_or(Value::Null);
                let data = if kind == "gas_prices" {
                    reshape_gas_prices(&raw)
                } else {
                    raw
                };
                FormattedEntry::Success {
                    kind,
                    data,
                    tool_call_id: r.tool_call_id.clone(),
                }
            } else {
                error_count += 1;
                FormattedEntry::Failure {
                    kind: type_for_tool(&r.tool_name).unwrap_or("unknown").to_string(),
                    message: r.error.clone().unwrap_or_else(|| "unknown error".into()),
                    tool_call_id: r.tool_call_id.clone(),
                }
            }
        })
        .collect();

    FormattedResults {
        results: entries,
        has_errors: error_count > 0,
        error_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    #[test]
    fn test_gas_prices_type_mapping() {
        let results = vec![ToolResult::ok(
            "get_gas_prices",
            "c1",
            json!({"gasPrices": {"slow": {"gwei": 10, "usdCost": 0.3}}}),
            5,
        )];
        let formatted = format_results(&results);
        assert!(!formatted.has_errors);
        match &formatted.results[0] {
            FormattedEntry::Success { kind, .. } => assert_eq!(kind, "gas_prices"),
            _ => panic!("expected success entry"),
        }
    }

    #[test]
    fn test_gas_prices_reshaped_into_slow_standard_fast() {
        let results = vec![ToolResult::ok(
            "get_gas_prices",
            "c1",
            json!({
                "network": "ethereum",
                "gasPrices": {
                    "slow": {"gwei": 10, "usdCost": 0.30},
                    "standard": {"gwei": 15, "usdCost": 0.45},
                    "fast": {"gwei": 20, "usdCost": 0.60},
                },
                "timestamp": "2026-01-01T00:00:00Z",
                "source": "placeholder",
            }),
            5,
        )];
        let formatted = format_results(&results);
        match &formatted.results[0] {
            FormattedEntry::Success { data, .. } => {
                assert_eq!(data["slow"]["gwei"], 10);
                assert_eq!(data["slow"]["usdCost"], 0.30);
                assert_eq!(data["standard"]["gwei"], 15);
                assert_eq!(data["fast"]["usdCost"], 0.60);
                assert!(data.get("network").is_none(), "wrapper fields must not leak through");
                assert!(data.get("timestamp").is_none());
            }
            _ => panic!("expected success entry"),
        }
    }

    #[test]
    fn test_all_five_tool_mappings() {
        let mapping = [
            ("get_gas_prices", "gas_prices"),
            ("get_crypto_price", "crypto_price"),
            ("get_lending_rates", "lending_rates"),
            ("get_token_balance", "token_balance"),
            ("get_all_token_balances", "portfolio"),
        ];
        for (tool, expected_type) in mapping {
            assert_eq!(type_for_tool(tool), Some(expected_type));
        }
    }

    #[test]
    fn test_has_errors_true_when_any_failure() {
        let results = vec![
            ToolResult::ok("get_gas_prices", "c1", json!({}), 1),
            ToolResult::err("get_crypto_price", "c2", "boom", ErrorCode::ToolError, 1),
        ];
        let formatted = format_results(&results);
        assert!(formatted.has_errors);
        assert_eq!(formatted.error_count, 1);
    }

    #[test]
    fn test_failure_entry_carries_tool_call_id_for_correlation() {
        let results = vec![ToolResult::err(
            "get_gas_prices",
            "c1",
            "Service unavailable",
            ErrorCode::ToolError,
            1,
        )];
        let formatted = format_results(&results);
        match &formatted.results[0] {
            FormattedEntry::Failure { tool_call_id, message, .. } => {
                assert_eq!(tool_call_id, "c1");
                assert_eq!(message, "Service unavailable");
            }
            _ => panic!("expected failure entry"),
        }
    }
}
