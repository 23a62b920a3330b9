//! Component E — the UI-Intent Generator: tool-result and keyword-pattern
//! rules mapping to `RENDER_COMPONENT` descriptors (spec §4.E).
//!
//! Two rule sources are consulted in order: tool-driven first, then
//! pattern-driven on `userText`. Duplicates are suppressed by component
//! name. `get_crypto_price` intentionally has no mapping in either table —
//! see SPEC_FULL.md §9's resolution of that open question.

use crate::types::ToolResult;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize)]
pub struct UiIntent {
    #[serde(rename = "type")]
    pub kind: &'static str, // always "RENDER_COMPONENT"
    pub component: &'static str,
    pub props: Value,
}

fn tool_driven_component(tool_name: &str) -> Option<&'static str> {
    match tool_name {
        "get_gas_prices" => Some("NetworkStatus"),
        "get_token_balance" | "get_all_token_balances" => Some("YourAssets"),
        "get_lending_rates" => Some("LendingSection"),
        "swap" => Some("TokenSwap"),
        "perpetual" | "leverage" => Some("PerpetualsSection"),
        "activity" | "history" => Some("RecentActivity"),
        _ => None,
    }
}

fn pattern_driven_component(user_text: &str) -> Option<&'static str> {
    let lower = user_text.to_lowercase();
    let has_any = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

    if has_any(&["gas", "fee"]) {
        Some("NetworkStatus")
    } else if has_any(&["swap", "exchange", "trade", "dex"]) {
        Some("TokenSwap")
    } else if has_any(&["lend", "apy", "earn", "interest"]) {
        Some("LendingSection")
    } else if has_any(&["balance", "asset", "portfolio"]) {
        Some("YourAssets")
    } else if has_any(&["perpetual", "leverage", "perp"]) {
        Some("PerpetualsSection")
    } else if has_any(&["activity", "history", "transactions"]) {
        Some("RecentActivity")
    } else {
        None
    }
}

/// Generate zero or more `RENDER_COMPONENT` intents given the round's tool
/// results, the user's text, and the assistant's final text.
///
/// `assistant_text` is accepted for symmetry with spec §4.E's signature but
/// neither rule source currently reads it — it exists so a future rule can
/// be added without changing the function's shape.
pub fn generate(tool_results: &[ToolResult], user_text: &str, _assistant_text: &str) -> Vec<UiIntent> {
    let mut seen = BTreeSet::new();
    let mut intents = Vec::new();

    for result in tool_results.iter().filter(|r| r.success) {
        if let Some(component) = tool_driven_component(&result.tool_name) {
            if seen.insert(component) {
                intents.push(UiIntent {
                    kind: "RENDER_COMPONENT",
                    component,
                    props: Value::Object(Default::default()),
                });
            }
        }
    }

    if let Some(component) = pattern_driven_component(user_text) {
        if seen.insert(component) {
            intents.push(UiIntent {
                kind: "RENDER_COMPONENT",
                component,
                props: Value::Object(Default::default()),
            });
        }
    }

    intents
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_gas_prices_tool_maps_to_network_status() {
        let results = vec![ToolResult::ok(
            "get_gas_prices",
            "c1",
            serde_json::json!({}),
            1,
        )];
        let intents = generate(&results, "", "");
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].component, "NetworkStatus");
    }

    #[test]
    fn test_crypto_price_tool_has_no_mapping() {
        let results = vec![ToolResult::ok(
            "get_crypto_price",
            "c1",
            serde_json::json!({}),
            1,
        )];
        let intents = generate(&results, "", "");
        assert!(intents.is_empty());
    }

    #[test]
    fn test_failed_tool_result_does_not_generate_intent() {
        let results = vec![ToolResult::err(
            "get_gas_prices",
            "c1",
            "fail",
            ErrorCode::ToolError,
            1,
        )];
        let intents = generate(&results, "", "");
        assert!(intents.is_empty());
    }

    #[test]
    fn test_pattern_driven_without_tools() {
        let intents = generate(&[], "check gas prices please", "");
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].component, "NetworkStatus");
    }

    #[test]
    fn test_pattern_match_is_case_insensitive() {
        let intents = generate(&[], "What's my PORTFOLIO worth?", "");
        assert_eq!(intents[0].component, "YourAssets");
    }

    #[test]
    fn test_duplicates_suppressed_across_sources() {
        let results = vec![ToolResult::ok(
            "get_gas_prices",
            "c1",
            serde_json::json!({}),
            1,
        )];
        // user text also matches the gas/fee keyword; should not duplicate
        let intents = generate(&results, "what are the current gas fees", "");
        assert_eq!(intents.len(), 1);
    }

    #[test]
    fn test_no_match_returns_empty() {
        let intents = generate(&[], "hello there", "");
        assert!(intents.is_empty());
    }

    #[test]
    fn test_deterministic_given_same_inputs() {
        let results = vec![ToolResult::ok(
            "get_lending_rates",
            "c1",
            serde_json::json!({}),
            1,
        )];
        let a = generate(&results, "what's the apy", "");
        let b = generate(&results, "what's the apy", "");
        assert_eq!(a.len(), b.len());
        assert_eq!(a[0].component, b[0].component);
    }
}
