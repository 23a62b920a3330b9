//! Explicit circuit-breaker state machine, one instance per provider
//! adapter (spec §3: "per-provider singleton inside the LLM adapter").
//!
//! `closed --(>=threshold consecutive failures)--> open
//!  open --(resetTimeout elapsed)--> half_open
//!  half_open --(success)--> closed
//!  half_open --(failure)--> open`

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    failures: u32,
    opened_at: Option<Instant>,
}

/// CAS-safe (single `Mutex`-guarded) breaker. Call [`CircuitBreaker::allow`]
/// before attempting the upstream call; report the outcome with
/// [`CircuitBreaker::on_success`] / [`CircuitBreaker::on_failure`].
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            reset_timeout,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: 0,
                opened_at: None,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }

    /// Returns `true` if a call should be attempted now. In `Open` state
    /// this also performs the `open -> half_open` transition once
    /// `reset_timeout` has elapsed, letting the next call through as a
    /// probe.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                if let Some(opened_at) = inner.opened_at {
                    if opened_at.elapsed() >= self.reset_timeout {
                        inner.state = CircuitState::HalfOpen;
                        return true;
                    }
                }
                false
            }
        }
    }

    pub fn on_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = CircuitState::Closed;
        inner.failures = 0;
        inner.opened_at = None;
    }

    /// Only retryable failures count toward the threshold — non-retryable
    /// errors (bad auth, malformed request) are a caller bug, not upstream
    /// instability, so they don't trip the breaker.
    pub fn on_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
            }
            CircuitState::Closed => {
                inner.failures += 1;
                if inner.failures >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            CircuitState::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trips_open_after_threshold_failures() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(30));
        for _ in 0..3 {
            cb.on_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow());
    }

    #[test]
    fn test_stays_closed_below_threshold() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(30));
        cb.on_failure();
        cb.on_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow());
    }

    #[test]
    fn test_half_open_after_reset_timeout() {
        let cb = CircuitBreaker::new(1, Duration::from_millis(1));
        cb.on_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cb.allow());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_success_closes_circuit() {
        let cb = CircuitBreaker::new(1, Duration::from_millis(1));
        cb.on_failure();
        std::thread::sleep(Duration::from_millis(5));
        cb.allow();
        cb.on_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_failure_reopens_circuit() {
        let cb = CircuitBreaker::new(1, Duration::from_millis(1));
        cb.on_failure();
        std::thread::sleep(Duration::from_millis(5));
        cb.allow();
        cb.on_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(30));
        cb.on_failure();
        cb.on_failure();
        cb.on_success();
        cb.on_failure();
        cb.on_failure();
        // two more failures after reset shouldn't trip a threshold-3 breaker
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
