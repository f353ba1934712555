//! Protocol version 1 (V1) wire types.
//!
//! V1 names networks by their short name (e.g., "base-sepolia") and sends the
//! payment requirements flat, next to a payload that repeats scheme and network:
//!
//! ```json
//! {
//!   "x402Version": 1,
//!   "paymentPayload": { "x402Version": 1, "scheme": "exact", "network": "base", "payload": { ... } },
//!   "paymentRequirements": { "scheme": "exact", "network": "base", "maxAmountRequired": "10000", ... }
//! }
//! ```
//!
//! The facilitator response shapes are shared with V2.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::Display;

use crate::proto;

/// Version marker that serializes as the integer `1`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct X402Version1;

impl X402Version1 {
    pub const VALUE: u8 = 1;
}

impl Serialize for X402Version1 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(Self::VALUE)
    }
}

impl<'de> Deserialize<'de> for X402Version1 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let num = u8::deserialize(deserializer)?;
        if num == Self::VALUE {
            Ok(X402Version1)
        } else {
            Err(serde::de::Error::custom(format!(
                "expected version {}, got {}",
                Self::VALUE,
                num
            )))
        }
    }
}

impl Display for X402Version1 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Self::VALUE)
    }
}

/// Body of `POST /verify` and `POST /settle` for V1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest<TPayload> {
    pub x402_version: X402Version1,
    pub payment_payload: PaymentPayload<TPayload>,
    pub payment_requirements: PaymentRequirements,
}

/// The signed authorization, tagged with scheme and network.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload<TPayload> {
    pub x402_version: X402Version1,
    pub scheme: String,
    /// The network name (e.g., "base-sepolia").
    pub network: String,
    pub payload: TPayload,
}

/// V1 payment requirements: network by name, amount as `maxAmountRequired`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: String,
    pub network: String,
    pub max_amount_required: String,
    pub resource: String,
    pub description: String,
    pub mime_type: String,
    pub pay_to: String,
    pub max_timeout_seconds: u64,
    pub asset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl From<&proto::PaymentRequirements> for PaymentRequirements {
    fn from(value: &proto::PaymentRequirements) -> Self {
        PaymentRequirements {
            scheme: value.scheme.clone(),
            network: proto::ProtocolVersion::V1.network_id(&value.network),
            max_amount_required: value.max_amount_required.clone(),
            resource: value.resource.clone(),
            description: value.description.clone(),
            mime_type: value.mime_type.clone(),
            pay_to: value.pay_to.clone(),
            max_timeout_seconds: value.max_timeout_seconds,
            asset: value.asset.clone(),
            extra: value.extra.clone(),
        }
    }
}

/// Response of `POST /verify`, as sent by the facilitator.
///
/// `isValid` and its type are mandatory; a body without it is malformed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
}

/// Response of `POST /settle`, as sent by the facilitator.
///
/// Some facilitators spell the error field in snake case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    pub success: bool,
    #[serde(
        default,
        alias = "error_reason",
        skip_serializing_if = "Option::is_none"
    )]
    pub error_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}
