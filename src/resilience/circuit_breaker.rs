//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: upstream assumed down, requests fail fast
//! - Half-Open: one probe admitted to test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold
//! Open → Half-Open: first attempt after the reset timeout (failure count halved)
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails
//! ```
//!
//! # Design Decisions
//! - One breaker per upstream target, kept in an injected registry
//! - Fail fast in Open state (no network I/O)
//! - Single probe in Half-Open (prevents hammering a recovering upstream)
//! - A probe that never reports back is replaced after another reset timeout
//! - Counters are atomics; exact counts under races are not required

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

/// Circuit state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(val: u8) -> Self {
        match val {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Breaker guarding one upstream target.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    /// Milliseconds since `created` at the last recorded failure.
    last_failure_ms: AtomicU64,
    /// Milliseconds since `created` when the current probe was admitted.
    probe_started_ms: AtomicU64,
    created: Instant,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            state: AtomicU8::new(CircuitState::Closed as u8),
            consecutive_failures: AtomicU32::new(0),
            last_failure_ms: AtomicU64::new(0),
            probe_started_ms: AtomicU64::new(0),
            created: Instant::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Whether a call may be issued now.
    ///
    /// After the reset timeout this admits exactly one probe; later callers are
    /// refused until the probe's outcome is recorded. A probe whose outcome is
    /// still missing one reset timeout later (its caller was cancelled) is
    /// abandoned and the next caller becomes the probe.
    pub fn can_attempt(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                let started = self.probe_started_ms.load(Ordering::Acquire);
                let now = self.elapsed_ms();
                if u128::from(now.saturating_sub(started)) <= self.reset_timeout.as_millis() {
                    return false;
                }
                let reclaimed = self
                    .probe_started_ms
                    .compare_exchange(started, now, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok();
                if reclaimed {
                    tracing::warn!(
                        target_name = %self.name,
                        "Probe outcome never recorded, admitting a new probe"
                    );
                }
                reclaimed
            }
            CircuitState::Open => {
                let since_failure =
                    self.elapsed_ms().saturating_sub(self.last_failure_ms.load(Ordering::Acquire));
                if u128::from(since_failure) <= self.reset_timeout.as_millis() {
                    return false;
                }

                self.probe_started_ms.store(self.elapsed_ms(), Ordering::Release);
                let claimed = self
                    .state
                    .compare_exchange(
                        CircuitState::Open as u8,
                        CircuitState::HalfOpen as u8,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok();
                if claimed {
                    let _ = self.consecutive_failures.fetch_update(
                        Ordering::AcqRel,
                        Ordering::Acquire,
                        |failures| Some(failures / 2),
                    );
                    tracing::info!(
                        target_name = %self.name,
                        since_failure_ms = since_failure,
                        "Circuit half-open, admitting probe"
                    );
                }
                claimed
            }
        }
    }

    /// Reset failures and close the circuit.
    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
        let previous = self.state.swap(CircuitState::Closed as u8, Ordering::AcqRel);
        if previous != CircuitState::Closed as u8 {
            tracing::info!(target_name = %self.name, "Circuit closed");
            metrics::record_circuit_state(&self.name, false);
        }
    }

    /// Count a failure; opens the circuit at the threshold or when a probe fails.
    pub fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        self.last_failure_ms.store(self.elapsed_ms(), Ordering::Release);

        let open_now = match self.state() {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => failures >= self.failure_threshold,
            CircuitState::Open => false,
        };
        if open_now {
            self.state.store(CircuitState::Open as u8, Ordering::Release);
            tracing::error!(
                target_name = %self.name,
                failures = failures,
                "Circuit breaker opened"
            );
            metrics::record_circuit_state(&self.name, true);
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.created.elapsed().as_millis() as u64
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub target: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
}

/// Breakers keyed by upstream target name.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    failure_threshold: u32,
    reset_timeout: Duration,
}

impl CircuitBreakerRegistry {
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            failure_threshold: config.failure_threshold,
            reset_timeout: Duration::from_millis(config.reset_timeout_ms),
        }
    }

    /// Breaker for `target`, created on first use.
    pub fn get(&self, target: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(target) {
            return existing.value().clone();
        }
        self.breakers
            .entry(target.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    target,
                    self.failure_threshold,
                    self.reset_timeout,
                ))
            })
            .value()
            .clone()
    }

    pub fn snapshot(&self) -> Vec<CircuitSnapshot> {
        let mut out: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| CircuitSnapshot {
                target: entry.key().clone(),
                state: entry.value().state(),
                consecutive_failures: entry.value().consecutive_failures(),
            })
            .collect();
        out.sort_by(|a, b| a.target.cmp(&b.target));
        out
    }
}
