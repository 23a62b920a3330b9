//! Default, pluggable tool implementations matching the illustrative
//! schemas in spec §6. Per spec's Non-goals, the core does not implement
//! real price/lending/gas data sources — these produce deterministic,
//! schema-valid placeholder data and exist to (a) make the crate runnable
//! out of the box and (b) demonstrate the [`ToolExecutor`] shape a caller
//! wires a real implementation into via [`super::registry::ToolRegistry::register`].

use super::registry::{ToolExecutor, ToolOutcome};
use super::schema::ToolSchema;
use crate::error::ErrorCode;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};

pub struct GasPricesTool;

#[async_trait]
impl ToolExecutor for GasPricesTool {
    async fn execute(&self, args: Value) -> ToolOutcome {
        let network = args
            .get("network")
            .and_then(|v| v.as_str())
            .unwrap_or("ethereum");
        ToolOutcome::Success(json!({
            "network": network,
            "gasPrices": {
                "slow": {"gwei": 10, "usdCost": 0.30},
                "standard": {"gwei": 15, "usdCost": 0.45},
                "fast": {"gwei": 20, "usdCost": 0.60},
            },
            "timestamp": Utc::now().to_rfc3339(),
            "source": "placeholder",
        }))
    }
}

pub fn gas_prices_schema() -> ToolSchema {
    ToolSchema::new().optional_enum(
        "network",
        &["ethereum", "polygon", "bsc", "arbitrum", "optimism"],
    )
}

pub struct CryptoPriceTool;

#[async_trait]
impl ToolExecutor for CryptoPriceTool {
    async fn execute(&self, args: Value) -> ToolOutcome {
        let Some(symbol) = args.get("symbol").and_then(|v| v.as_str()) else {
            return ToolOutcome::Failure {
                message: "symbol is required".into(),
                classification: ErrorCode::ValidationError,
            };
        };
        let currency = args
            .get("currency")
            .and_then(|v| v.as_str())
            .unwrap_or("USD");
        ToolOutcome::Success(json!({
            "symbol": symbol,
            "price": 0.0,
            "currency": currency,
            "change_24h": 0.0,
            "volume_24h": 0.0,
            "market_cap": 0.0,
            "timestamp": Utc::now().to_rfc3339(),
            "source": "placeholder",
        }))
    }
}

pub fn crypto_price_schema() -> ToolSchema {
    ToolSchema::new()
        .required_string("symbol")
        .optional_string("currency")
}

pub struct LendingRatesTool;

#[async_trait]
impl ToolExecutor for LendingRatesTool {
    async fn execute(&self, args: Value) -> ToolOutcome {
        let Some(token) = args.get("token").and_then(|v| v.as_str()) else {
            return ToolOutcome::Failure {
                message: "token is required".into(),
                classification: ErrorCode::ValidationError,
            };
        };
        ToolOutcome::Success(json!({
            "token": token,
            "protocols": [{
                "protocol": "placeholder-protocol",
                "symbol": token,
                "supplyAPY": 0.0,
                "borrowAPY": 0.0,
                "totalSupply": 0.0,
                "totalBorrow": 0.0,
                "utilizationRate": 0.0,
            }],
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }
}

pub fn lending_rates_schema() -> ToolSchema {
    ToolSchema::new()
        .required_string("token")
        .optional_string("protocols")
}

pub struct TokenBalanceTool;

#[async_trait]
impl ToolExecutor for TokenBalanceTool {
    async fn execute(&self, args: Value) -> ToolOutcome {
        let Some(address) = args.get("address").and_then(|v| v.as_str()) else {
            return ToolOutcome::Failure {
                message: "address is required".into(),
                classification: ErrorCode::ValidationError,
            };
        };
        let network = args
            .get("network")
            .and_then(|v| v.as_str())
            .unwrap_or("ethereum");
        ToolOutcome::Success(json!({
            "address": address,
            "network": network,
            "balance": "0",
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }
}

pub fn token_balance_schema() -> ToolSchema {
    ToolSchema::new()
        .required_string("address")
        .optional_string("network")
        .optional_string("tokenAddress")
}

pub struct AllTokenBalancesTool;

#[async_trait]
impl ToolExecutor for AllTokenBalancesTool {
    async fn execute(&self, args: Value) -> ToolOutcome {
        let Some(address) = args.get("address").and_then(|v| v.as_str()) else {
            return ToolOutcome::Failure {
                message: "address is required".into(),
                classification: ErrorCode::ValidationError,
            };
        };
        let network = args
            .get("network")
            .and_then(|v| v.as_str())
            .unwrap_or("ethereum");
        ToolOutcome::Success(json!({
            "address": address,
            "network": network,
            "balances": [],
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }
}

pub fn all_token_balances_schema() -> ToolSchema {
    ToolSchema::new()
        .required_string("address")
        .optional_string("network")
}

/// Register all five built-in tools (spec §6) onto a registry, as a
/// convenient default a caller can start from and override.
pub fn register_all(registry: &mut super::registry::ToolRegistry) {
    use std::sync::Arc;
    registry.register(
        "get_gas_prices",
        "Get current gas prices for a network",
        gas_prices_schema(),
        Arc::new(GasPricesTool),
    );
    registry.register(
        "get_crypto_price",
        "Get the current price of a cryptocurrency",
        crypto_price_schema(),
        Arc::new(CryptoPriceTool),
    );
    registry.register(
        "get_lending_rates",
        "Get lending/borrowing rates for a token across protocols",
        lending_rates_schema(),
        Arc::new(LendingRatesTool),
    );
    registry.register(
        "get_token_balance",
        "Get the balance of a specific token for an address",
        token_balance_schema(),
        Arc::new(TokenBalanceTool),
    );
    registry.register(
        "get_all_token_balances",
        "Get all token balances for an address",
        all_token_balances_schema(),
        Arc::new(AllTokenBalancesTool),
    );
}
