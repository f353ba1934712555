//! Configuration for the settlement core.
//!
//! Loaded from a JSON file. Secrets may reference environment variables
//! (`"$CDP_API_KEY_SECRET"`), resolved while the file is parsed; a `.env` file in
//! the working directory is loaded first if present.
//!
//! ```json
//! {
//!   "facilitator": {
//!     "base_url": "https://api.cdp.coinbase.com/platform/v2/x402/",
//!     "protocol_version": 2,
//!     "api_key_id": "$CDP_API_KEY_ID",
//!     "api_key_secret": "$CDP_API_KEY_SECRET"
//!   },
//!   "solana_rpc_url": "https://api.devnet.solana.com"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;
use x402_settle_types::config::LiteralOrEnv;
use x402_settle_types::proto::ProtocolVersion;

use crate::resilience::{CircuitBreakerConfig, RetryPolicy};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub facilitator: FacilitatorClientConfig,
    /// Needed to build Solana authorizations.
    #[serde(default)]
    pub solana_rpc_url: Option<LiteralOrEnv<Url>>,
}

/// An extra header sent with every facilitator call, e.g. to scope calls to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderConfig {
    pub name: String,
    pub value: String,
}

/// How to reach and authenticate against a facilitator.
#[derive(Debug, Clone, Deserialize)]
pub struct FacilitatorClientConfig {
    /// Endpoint paths are resolved against this URL.
    pub base_url: LiteralOrEnv<Url>,
    #[serde(default = "config_defaults::verify_path")]
    pub verify_path: String,
    #[serde(default = "config_defaults::settle_path")]
    pub settle_path: String,
    #[serde(default = "config_defaults::supported_path")]
    pub supported_path: String,
    /// Body shape of verify and settle requests. Fixed for the client's lifetime.
    #[serde(default)]
    pub protocol_version: ProtocolVersion,
    #[serde(default = "config_defaults::verify_timeout_ms")]
    pub verify_timeout_ms: u64,
    #[serde(default = "config_defaults::settle_timeout_ms")]
    pub settle_timeout_ms: u64,
    #[serde(default = "config_defaults::supported_timeout_ms")]
    pub supported_timeout_ms: u64,
    #[serde(default = "config_defaults::supported_cache_ttl_secs")]
    pub supported_cache_ttl_secs: u64,
    /// Without an API key, requests carry no `Authorization` header.
    #[serde(default)]
    pub api_key_id: Option<LiteralOrEnv<String>>,
    /// PEM EC key (ES256) or base64 Ed25519 key (EdDSA).
    #[serde(default)]
    pub api_key_secret: Option<LiteralOrEnv<String>>,
    #[serde(default)]
    pub project_header: Option<HeaderConfig>,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    #[serde(default = "RetryPolicy::verification")]
    pub verify_retry: RetryPolicy,
    #[serde(default = "RetryPolicy::settlement")]
    pub settle_retry: RetryPolicy,
}

impl FacilitatorClientConfig {
    /// Defaults for everything but the base URL.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url: LiteralOrEnv::from_literal(base_url),
            verify_path: config_defaults::verify_path(),
            settle_path: config_defaults::settle_path(),
            supported_path: config_defaults::supported_path(),
            protocol_version: ProtocolVersion::default(),
            verify_timeout_ms: config_defaults::verify_timeout_ms(),
            settle_timeout_ms: config_defaults::settle_timeout_ms(),
            supported_timeout_ms: config_defaults::supported_timeout_ms(),
            supported_cache_ttl_secs: config_defaults::supported_cache_ttl_secs(),
            api_key_id: None,
            api_key_secret: None,
            project_header: None,
            circuit_breaker: CircuitBreakerConfig::default(),
            verify_retry: RetryPolicy::verification(),
            settle_retry: RetryPolicy::settlement(),
        }
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }

    pub fn supported_timeout(&self) -> Duration {
        Duration::from_millis(self.supported_timeout_ms)
    }

    pub fn supported_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.supported_cache_ttl_secs)
    }
}

mod config_defaults {
    pub fn verify_path() -> String {
        "verify".to_string()
    }

    pub fn settle_path() -> String {
        "settle".to_string()
    }

    pub fn supported_path() -> String {
        "supported".to_string()
    }

    /// Verification only checks a signature.
    pub fn verify_timeout_ms() -> u64 {
        500
    }

    /// Settlement waits for the transaction to land.
    pub fn settle_timeout_ms() -> u64 {
        30_000
    }

    pub fn supported_timeout_ms() -> u64 {
        5_000
    }

    pub fn supported_cache_ttl_secs() -> u64 {
        10 * 60
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Config {
    /// Loads `.env` if present, then parses the JSON file at `path`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }
}
