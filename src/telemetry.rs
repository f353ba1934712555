//! Log setup for binaries and tests embedding the settlement core.
//!
//! The library itself only emits `tracing` spans and events; nothing is printed
//! until a subscriber is installed. [`Telemetry::init`] installs a `fmt` subscriber
//! filtered by `RUST_LOG`, falling back to `info`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Telemetry {
    /// `false` when another global subscriber was already in place.
    pub installed: bool,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::init()
    }
}

impl Telemetry {
    /// Installs the global subscriber. Calling it again is harmless.
    pub fn init() -> Self {
        Self::init_with_filter(Self::env_filter())
    }

    pub fn init_with_filter(filter: EnvFilter) -> Self {
        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .is_ok();
        if installed {
            tracing::debug!("Log subscriber installed");
        }
        Self { installed }
    }

    pub fn env_filter() -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    }
}
