//! Closed / open / half-open breaker guarding one remote service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Thresholds of a [`CircuitBreaker`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open a closed breaker.
    pub failure_threshold: u32,
    /// Seconds an open breaker waits before letting a trial call through.
    pub cooldown_secs: u64,
    /// Consecutive half-open successes that close the breaker.
    pub success_threshold: u32,
}

impl CircuitBreakerConfig {
    pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
    pub const DEFAULT_COOLDOWN_SECS: u64 = 60;
    pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 2;

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: Self::DEFAULT_FAILURE_THRESHOLD,
            cooldown_secs: Self::DEFAULT_COOLDOWN_SECS,
            success_threshold: Self::DEFAULT_SUCCESS_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub half_open_successes: u32,
    /// Time since the breaker last opened, if it is open or half-open.
    pub open_for: Option<Duration>,
}

#[derive(Debug, thiserror::Error)]
#[error("Circuit breaker '{service}' is open, retry in {retry_in:?}")]
pub struct CircuitOpenError {
    pub service: String,
    pub retry_in: Duration,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    opened_at: Option<Instant>,
}

/// Failure isolation for one logical remote service.
///
/// Shared by every in-flight call to that service. All transitions happen
/// under one mutex that is never held across an `.await`.
#[derive(Debug)]
pub struct CircuitBreaker {
    service: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(service: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            service: service.into(),
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                opened_at: None,
            }),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        // Every update leaves the state consistent, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admits a call, or fails without any I/O while the breaker is open.
    ///
    /// An open breaker whose cooldown has elapsed moves to half-open and admits the call.
    pub fn try_acquire(&self) -> Result<(), CircuitOpenError> {
        let mut inner = self.lock();
        if inner.state != CircuitState::Open {
            return Ok(());
        }
        let cooldown = self.config.cooldown();
        let elapsed = inner
            .opened_at
            .map(|opened_at| opened_at.elapsed())
            .unwrap_or(cooldown);
        if elapsed >= cooldown {
            inner.state = CircuitState::HalfOpen;
            inner.half_open_successes = 0;
            tracing::info!(service = %self.service, "Circuit breaker half-open");
            Ok(())
        } else {
            Err(CircuitOpenError {
                service: self.service.clone(),
                retry_in: cooldown - elapsed,
            })
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.half_open_successes = 0;
                    inner.opened_at = None;
                    tracing::info!(service = %self.service, "Circuit breaker closed");
                }
            }
            // A call admitted before the breaker opened finished late.
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    tracing::warn!(
                        service = %self.service,
                        failures = inner.consecutive_failures,
                        "Circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.consecutive_failures += 1;
                inner.half_open_successes = 0;
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                tracing::warn!(service = %self.service, "Circuit breaker reopened from half-open");
            }
            CircuitState::Open => {
                inner.consecutive_failures += 1;
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.lock();
        CircuitSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            half_open_successes: inner.half_open_successes,
            open_for: inner.opened_at.map(|opened_at| opened_at.elapsed()),
        }
    }
}
