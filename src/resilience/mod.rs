//! Failure isolation for facilitator calls.
//!
//! A [`CircuitBreaker`] is owned by the client that uses it and shared by all of
//! that client's in-flight calls. [`retry_with_breaker`] wraps each call: the
//! breaker decides whether an attempt may run at all, the [`RetryPolicy`] decides
//! how many attempts a call gets and how long to wait between them.

mod circuit_breaker;
mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitOpenError, CircuitSnapshot, CircuitState,
};
pub use retry::{RetryError, RetryPolicy, Transient, retry_with_breaker};
