//! Conversation orchestrator for a DeFi chat assistant: session lifecycle,
//! an LLM adapter with retry/circuit-breaking, tool dispatch, result
//! formatting, UI-intent generation, and a WebSocket gateway.
//!
//! ## Design Philosophy
//!
//! - **Explicit error handling**: every fallible operation returns
//!   [`error::Result`]; failure classification is a pure function
//!   ([`error::Error::classify`]), never exception unwinding.
//! - **Typed state machines over booleans**: the circuit breaker
//!   ([`llm::circuit_breaker`]) and error classification are explicit enums,
//!   not ad-hoc flags.
//! - **Fail fast on configuration**: [`config::Settings::from_env`]
//!   validates everything once at startup.

pub mod config;
pub mod error;
pub mod formatter;
pub mod gateway;
pub mod llm;
pub mod orchestrator;
pub mod session;
pub mod telemetry;
pub mod tools;
pub mod types;
pub mod ui_intent;
pub mod validator;

pub use error::{Error, Result};
