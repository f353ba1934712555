//! Facilitator protocol types.
//!
//! Callers work with one canonical [`PaymentRequirements`] and the typed
//! outcomes [`VerifyOutcome`] / [`SettleOutcome`]. The version-specific wire
//! shapes live in [`v1`] and [`v2`]; [`VerifyRequest::new`] picks one according
//! to the [`ProtocolVersion`] a client was built with.
//!
//! # Wire Format
//!
//! All types serialize to JSON using camelCase field names. Atomic amounts are
//! always integer strings.

use serde::{Deserialize, Serialize};
use serde_with::{VecSkipError, serde_as};
use std::collections::HashMap;
use std::fmt;

use crate::chain::{ChainId, NetworkKind};

pub mod v1;
pub mod v2;

/// The only payment scheme the settlement core produces.
pub const SCHEME_EXACT: &str = "exact";

/// Wire protocol spoken with a facilitator. Fixed for the lifetime of a client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ProtocolVersion {
    V1,
    #[default]
    V2,
}

impl From<ProtocolVersion> for u8 {
    fn from(value: ProtocolVersion) -> Self {
        match value {
            ProtocolVersion::V1 => v1::X402Version1::VALUE,
            ProtocolVersion::V2 => v2::X402Version2::VALUE,
        }
    }
}

impl TryFrom<u8> for ProtocolVersion {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            v1::X402Version1::VALUE => Ok(ProtocolVersion::V1),
            v2::X402Version2::VALUE => Ok(ProtocolVersion::V2),
            other => Err(format!("unsupported x402 version {other}")),
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", u8::from(*self))
    }
}

impl ProtocolVersion {
    /// How `network` is spelled on the wire in this version. A v1 network
    /// outside the registry has no name and goes out as its CAIP-2 id.
    pub fn network_id(&self, network: &NetworkKind) -> String {
        match self {
            ProtocolVersion::V1 => network.to_string(),
            ProtocolVersion::V2 => network.chain_id().to_string(),
        }
    }
}

/// Terms under which a payment is accepted.
///
/// This is the version-neutral form. It is immutable once issued; the wire
/// encodings are derived from it via [`v1::PaymentRequirements`] and
/// [`v2::PaymentRequirements`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Always [`SCHEME_EXACT`].
    pub scheme: String,
    pub network: NetworkKind,
    /// Token atomic units as an integer string.
    pub max_amount_required: String,
    /// URI of the paid resource.
    pub resource: String,
    pub description: String,
    pub mime_type: String,
    pub pay_to: String,
    pub max_timeout_seconds: u64,
    /// Token contract (EVM) or mint (Solana).
    pub asset: String,
    /// EIP-712 domain `{name, version}` on EVM, `{feePayer}` on Solana.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl PaymentRequirements {
    /// Facilitator fee payer advertised in `extra.feePayer`, if any.
    pub fn fee_payer(&self) -> Option<&str> {
        self.extra.as_ref()?.get("feePayer")?.as_str()
    }
}

/// JSON body of a verify or settle call, already encoded for one protocol version.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct VerifyRequest(Box<serde_json::value::RawValue>);

/// Settle carries exactly the body that was verified.
pub type SettleRequest = VerifyRequest;

impl VerifyRequest {
    /// Encodes `payload` (the signed authorization) against `requirements`.
    pub fn new<TPayload: Serialize>(
        version: ProtocolVersion,
        requirements: &PaymentRequirements,
        payload: TPayload,
    ) -> Result<Self, serde_json::Error> {
        let raw = match version {
            ProtocolVersion::V1 => {
                let body = v1::VerifyRequest {
                    x402_version: v1::X402Version1,
                    payment_payload: v1::PaymentPayload {
                        x402_version: v1::X402Version1,
                        scheme: requirements.scheme.clone(),
                        network: version.network_id(&requirements.network),
                        payload,
                    },
                    payment_requirements: requirements.into(),
                };
                serde_json::value::to_raw_value(&body)?
            }
            ProtocolVersion::V2 => {
                let accepted = v2::PaymentRequirements::from(requirements);
                let body = v2::VerifyRequest {
                    x402_version: v2::X402Version2,
                    payment_payload: v2::PaymentPayload {
                        x402_version: v2::X402Version2,
                        accepted: accepted.clone(),
                        payload,
                        resource: Some(requirements.into()),
                    },
                    payment_requirements: accepted,
                };
                serde_json::value::to_raw_value(&body)?
            }
        };
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        self.0.get()
    }
}

/// Result of the verify phase.
///
/// `verified = false` is terminal: the authorization is never settled and the
/// call is never retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
    pub verified: bool,
    pub payer_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
}

impl From<v1::VerifyResponse> for VerifyOutcome {
    fn from(value: v1::VerifyResponse) -> Self {
        VerifyOutcome {
            verified: value.is_valid,
            payer_address: value.payer,
            invalid_reason: value.invalid_reason,
        }
    }
}

/// Result of the settle phase, or of a full verify-then-settle exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

/// Reason reported when a facilitator claims success but returns no transaction.
pub const MISSING_TRANSACTION_REASON: &str = "settlement reported success without a transaction hash";

impl SettleOutcome {
    pub fn failure<R: Into<String>>(reason: R, payer: Option<String>) -> Self {
        SettleOutcome {
            success: false,
            tx_hash: None,
            network: None,
            error_reason: Some(reason.into()),
            payer,
        }
    }
}

impl From<v1::SettleResponse> for SettleOutcome {
    /// `success` is only kept when a non-empty transaction hash backs it.
    fn from(value: v1::SettleResponse) -> Self {
        let tx_hash = value.transaction.filter(|tx| !tx.trim().is_empty());
        match (value.success, tx_hash) {
            (true, Some(tx_hash)) => SettleOutcome {
                success: true,
                tx_hash: Some(tx_hash),
                network: value.network,
                error_reason: None,
                payer: value.payer,
            },
            (true, None) => SettleOutcome {
                network: value.network,
                ..SettleOutcome::failure(MISSING_TRANSACTION_REASON, value.payer)
            },
            (false, tx_hash) => SettleOutcome {
                success: false,
                tx_hash,
                network: value.network,
                error_reason: value.error_reason,
                payer: value.payer,
            },
        }
    }
}

/// One `(version, scheme, network)` combination a facilitator accepts.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SupportedPaymentKind {
    pub x402_version: u8,
    pub scheme: String,
    /// CAIP-2 chain id for V2, network name for V1.
    pub network: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl SupportedPaymentKind {
    /// Resolves the kind's network, whichever spelling it uses.
    pub fn network_kind(&self) -> Option<NetworkKind> {
        self.network.parse().ok()
    }
}

/// Response of `GET /supported`. Kinds that fail to parse are skipped.
#[serde_as]
#[derive(Clone, Default, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedResponse {
    #[serde_as(as = "VecSkipError<_>")]
    pub kinds: Vec<SupportedPaymentKind>,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub signers: HashMap<ChainId, Vec<String>>,
}

impl SupportedResponse {
    /// Whether the facilitator accepts `scheme` on `network` in `version`.
    pub fn supports(&self, version: ProtocolVersion, scheme: &str, network: &NetworkKind) -> bool {
        self.kinds.iter().any(|kind| {
            kind.x402_version == u8::from(version)
                && kind.scheme == scheme
                && kind.network_kind().as_ref() == Some(network)
        })
    }
}
