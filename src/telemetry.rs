//! Structured logging init and the metrics/health snapshot (spec §6,
//! "Observability"). Logging backend is `tracing`/`tracing-subscriber`,
//! selected by [`crate::config::LogFormat`]/[`crate::config::LogLevel`].

use crate::config::{LogFormat, LogLevel};
use crate::llm::Adapter;
use crate::session::SessionStore;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. Call once, at process start.
pub fn init_tracing(level: LogLevel, format: LogFormat) {
    let filter = EnvFilter::new(level.as_filter_str());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[derive(Debug, Serialize)]
pub struct ConnectionsSnapshot {
    pub active: usize,
    pub max: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionsSnapshot {
    pub active: usize,
    #[serde(rename = "totalMessages")]
    pub total_messages: usize,
}

#[derive(Debug, Serialize)]
pub struct LlmSnapshot {
    pub requests: u64,
    pub failures: u64,
    #[serde(rename = "circuitState")]
    pub circuit_state: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub uptime: u64,
    pub memory: MemorySnapshot,
    pub connections: ConnectionsSnapshot,
    pub sessions: SessionsSnapshot,
    pub llm: LlmSnapshot,
}

#[derive(Debug, Serialize)]
pub struct MemorySnapshot {
    #[serde(rename = "rssBytes")]
    pub rss_bytes: u64,
}

/// Process-wide counters surfaced at `/metrics`. Counters are incremented
/// by whichever code observes the outcome directly — today that's the
/// binary's call sites around [`Adapter::generate`]/[`Adapter::stream`].
pub struct Telemetry {
    started_at: Instant,
    llm_requests: AtomicU64,
    llm_failures: AtomicU64,
    sessions: Arc<SessionStore>,
    adapter: Arc<Adapter>,
}

impl Telemetry {
    pub fn new(sessions: Arc<SessionStore>, adapter: Arc<Adapter>) -> Self {
        Self {
            started_at: Instant::now(),
            llm_requests: AtomicU64::new(0),
            llm_failures: AtomicU64::new(0),
            sessions,
            adapter,
        }
    }

    pub fn record_llm_request(&self) {
        self.llm_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_llm_failure(&self) {
        self.llm_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, active_connections: usize, max_connections: usize) -> MetricsSnapshot {
        let circuit_state = match self.adapter.circuit_state() {
            crate::llm::circuit_breaker::CircuitState::Closed => "closed",
            crate::llm::circuit_breaker::CircuitState::Open => "open",
            crate::llm::circuit_breaker::CircuitState::HalfOpen => "half_open",
        };
        MetricsSnapshot {
            uptime: self.started_at.elapsed().as_secs(),
            memory: MemorySnapshot { rss_bytes: 0 },
            connections: ConnectionsSnapshot {
                active: active_connections,
                max: max_connections,
            },
            sessions: SessionsSnapshot {
                active: self.sessions.len(),
                total_messages: 0,
            },
            llm: LlmSnapshot {
                requests: self.llm_requests.load(Ordering::Relaxed),
                failures: self.llm_failures.load(Ordering::Relaxed),
                circuit_state,
            },
        }
    }
}
