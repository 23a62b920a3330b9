//! Component H — the Connection Gateway: accepts WebSocket connections,
//! demultiplexes by session id, enforces the connection limit, handles
//! ping/pong liveness, and forwards chat messages to the orchestrator
//! (spec §4.H).

pub mod connection;
pub mod frames;
pub mod server;

pub use server::{build_router, GatewayState};
