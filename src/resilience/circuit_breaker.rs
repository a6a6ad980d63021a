//! Circuit breaker for upstream provider protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: provider assumed down, calls are suppressed locally
//! - Probing: reset timeout elapsed, one trial call is let through
//!
//! # State Transitions
//! ```text
//! Closed  → Open:    consecutive_failures >= threshold
//! Open    → Probing: permit() after reset_timeout (counters self-reset)
//! Probing → Closed:  probe succeeds
//! Probing → Open:    probe fails (new timer from the failure)
//! ```
//!
//! States are derived from the counters; only the probe start is stored. It
//! never blocks `permit` and expires after `reset_timeout`, so an abandoned
//! probe cannot wedge the breaker or turn a later failure into a reopen.
//! Every failure restarts the timer, including failures recorded while open.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::observability::metrics;

/// Derived breaker status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerStatus {
    Closed,
    Open,
    Probing,
}

impl BreakerStatus {
    /// Two-valued label used by the health surface.
    pub fn as_health_label(&self) -> &'static str {
        match self {
            BreakerStatus::Open => "open",
            BreakerStatus::Closed | BreakerStatus::Probing => "closed",
        }
    }
}

/// Failure bookkeeping for one provider key.
#[derive(Debug, Clone)]
pub struct CircuitState {
    pub key: String,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<Instant>,
    pub threshold: u32,
    pub reset_timeout: Duration,
    probe_started_at: Option<Instant>,
}

impl CircuitState {
    fn new(key: String, threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            key,
            consecutive_failures: 0,
            last_failure_at: None,
            threshold,
            reset_timeout,
            probe_started_at: None,
        }
    }

    fn status_at(&self, now: Instant) -> BreakerStatus {
        if self.consecutive_failures < self.threshold {
            return BreakerStatus::Closed;
        }
        match self.last_failure_at {
            Some(at) if now.duration_since(at) < self.reset_timeout => BreakerStatus::Open,
            _ => BreakerStatus::Probing,
        }
    }

    /// Whether a probe let through by `permit` is still awaiting its outcome.
    fn probe_pending_at(&self, now: Instant) -> bool {
        self.probe_started_at
            .is_some_and(|at| now.duration_since(at) < self.reset_timeout)
    }
}

/// A single provider's circuit breaker.
///
/// All operations take the same lock, so they are linearizable for this key.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<CircuitState>,
}

impl CircuitBreaker {
    pub fn new(key: impl Into<String>, threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(CircuitState::new(key.into(), threshold, reset_timeout)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CircuitState> {
        // A panic while holding the lock cannot leave the counters half-written.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// May the provider be called now?
    ///
    /// Performs the half-open self-reset when the reset timeout has elapsed.
    pub fn permit(&self) -> bool {
        let mut state = self.lock();
        match state.status_at(Instant::now()) {
            BreakerStatus::Closed => true,
            BreakerStatus::Open => false,
            BreakerStatus::Probing => {
                state.consecutive_failures = 0;
                state.last_failure_at = None;
                state.probe_started_at = Some(Instant::now());
                tracing::info!(provider = %state.key, "Circuit half-open, allowing probe call");
                metrics::record_breaker_open(&state.key, false);
                true
            }
        }
    }

    /// Record a successful call; closes the breaker.
    pub fn record_success(&self) {
        let mut state = self.lock();
        if state.probe_pending_at(Instant::now()) || state.consecutive_failures >= state.threshold {
            tracing::info!(provider = %state.key, "Circuit closed after successful call");
        }
        state.consecutive_failures = 0;
        state.last_failure_at = None;
        state.probe_started_at = None;
        metrics::record_breaker_open(&state.key, false);
    }

    /// Record a failed call. Restarts the reset timer unconditionally.
    pub fn record_failure(&self) {
        let mut state = self.lock();
        let now = Instant::now();
        let was_probing = state.probe_pending_at(now);
        state.probe_started_at = None;
        state.consecutive_failures = if was_probing {
            state.threshold.max(state.consecutive_failures + 1)
        } else {
            state.consecutive_failures.saturating_add(1)
        };
        state.last_failure_at = Some(now);

        if was_probing {
            tracing::warn!(provider = %state.key, "Probe call failed, circuit reopened");
        } else if state.consecutive_failures == state.threshold {
            tracing::warn!(
                provider = %state.key,
                failures = state.consecutive_failures,
                "Circuit opened after repeated failures"
            );
        }
        if state.consecutive_failures >= state.threshold {
            metrics::record_breaker_open(&state.key, true);
        }
    }

    /// Current derived status, without side effects.
    pub fn status(&self) -> BreakerStatus {
        self.lock().status_at(Instant::now())
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> CircuitState {
        self.lock().clone()
    }
}

/// Process-wide registry of breakers, one per provider key.
#[derive(Debug)]
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    threshold: u32,
    reset_timeout: Duration,
}

impl BreakerRegistry {
    /// Create a registry with breakers for the given keys.
    pub fn new<I, K>(config: &BreakerConfig, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let registry = Self {
            breakers: DashMap::new(),
            threshold: config.failure_threshold,
            reset_timeout: Duration::from_secs(config.reset_timeout_secs),
        };
        for key in keys {
            registry.breaker(&key.into());
        }
        registry
    }

    /// Registry with explicit parameters.
    pub fn with_limits(threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            breakers: DashMap::new(),
            threshold,
            reset_timeout,
        }
    }

    /// Get the breaker for `key`, creating it on first use.
    pub fn breaker(&self, key: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(key) {
            return existing.clone();
        }
        self.breakers
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(key, self.threshold, self.reset_timeout)))
            .clone()
    }

    pub fn permit(&self, key: &str) -> bool {
        self.breaker(key).permit()
    }

    pub fn record_success(&self, key: &str) {
        self.breaker(key).record_success();
    }

    pub fn record_failure(&self, key: &str) {
        self.breaker(key).record_failure();
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("weatherapi", 3, Duration::from_secs(300))
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_starts_closed() {
        let cb = breaker();
        assert!(cb.permit());
        assert_eq!(cb.status(), BreakerStatus::Closed);
        assert_eq!(cb.consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_at_threshold() {
        let cb = breaker();
        cb.record_failure();
        cb.record_failure();
        assert!(cb.permit());

        cb.record_failure();
        assert!(!cb.permit());
        assert_eq!(cb.status(), BreakerStatus::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failures() {
        let cb = breaker();
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.consecutive_failures(), 0);
        assert!(cb.snapshot().last_failure_at.is_none());

        cb.record_failure();
        cb.record_failure();
        assert!(cb.permit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_open_breaker() {
        let cb = breaker();
        for _ in 0..5 {
            cb.record_failure();
        }
        cb.record_success();
        assert_eq!(cb.consecutive_failures(), 0);
        assert!(cb.permit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopen_scenario_with_timer_restart() {
        let cb = breaker();

        // failures at t=0, t=1, t=2
        cb.record_failure();
        advance(Duration::from_secs(1)).await;
        cb.record_failure();
        advance(Duration::from_secs(1)).await;
        cb.record_failure();

        // t=3
        advance(Duration::from_secs(1)).await;
        assert!(!cb.permit());

        // the timer runs from the last failure (t=2)
        advance(Duration::from_secs(298)).await;
        assert!(!cb.permit());

        // t=302: timeout elapsed, probe allowed with counters reset
        advance(Duration::from_secs(1)).await;
        assert_eq!(cb.status(), BreakerStatus::Probing);
        assert!(cb.permit());
        let state = cb.snapshot();
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.last_failure_at.is_none());

        // one failed probe reopens immediately
        cb.record_failure();
        assert!(!cb.permit());
        assert_eq!(cb.status(), BreakerStatus::Open);

        advance(Duration::from_secs(299)).await;
        assert!(!cb.permit());
        advance(Duration::from_secs(1)).await;
        assert!(cb.permit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_while_open_restart_timer() {
        let cb = breaker();
        for _ in 0..3 {
            cb.record_failure();
        }
        advance(Duration::from_secs(200)).await;
        cb.record_failure();
        advance(Duration::from_secs(200)).await;
        // 400s since opening but only 200s since the last failure
        assert!(!cb.permit());
        assert_eq!(cb.consecutive_failures(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_half_open_call_closes() {
        let cb = breaker();
        for _ in 0..3 {
            cb.record_failure();
        }
        advance(Duration::from_secs(300)).await;
        assert!(cb.permit());
        cb.record_success();

        cb.record_failure();
        assert!(cb.permit(), "standard closed accounting after a good probe");
        assert_eq!(cb.consecutive_failures(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_half_open_call_expires() {
        let cb = breaker();
        for _ in 0..3 {
            cb.record_failure();
        }
        advance(Duration::from_secs(300)).await;
        // probe let through, but its outcome is never recorded
        assert!(cb.permit());

        advance(Duration::from_secs(300)).await;
        cb.record_failure();
        assert_eq!(cb.consecutive_failures(), 1);
        assert_eq!(cb.status(), BreakerStatus::Closed);
        assert!(cb.permit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_keys_are_independent() {
        let registry = BreakerRegistry::with_limits(2, Duration::from_secs(60));
        registry.record_failure("a");
        registry.record_failure("a");
        assert!(!registry.permit("a"));
        assert!(registry.permit("b"));
        assert!(Arc::ptr_eq(&registry.breaker("a"), &registry.breaker("a")));
    }

    #[test]
    fn test_health_labels() {
        assert_eq!(BreakerStatus::Open.as_health_label(), "open");
        assert_eq!(BreakerStatus::Probing.as_health_label(), "closed");
        assert_eq!(BreakerStatus::Closed.as_health_label(), "closed");
    }
}
