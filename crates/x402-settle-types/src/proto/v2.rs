//! Protocol version 2 (V2) wire types.
//!
//! V2 identifies networks by CAIP-2 chain id, renames `maxAmountRequired` to
//! `amount`, moves resource metadata into [`ResourceInfo`], and nests the
//! accepted requirements inside the payment payload:
//!
//! ```json
//! {
//!   "x402Version": 2,
//!   "paymentPayload": {
//!     "x402Version": 2,
//!     "accepted": { "scheme": "exact", "network": "eip155:8453", "amount": "10000", ... },
//!     "payload": { ... },
//!     "resource": { "url": "...", "description": "...", "mimeType": "..." }
//!   },
//!   "paymentRequirements": { "scheme": "exact", "network": "eip155:8453", "amount": "10000", ... }
//! }
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Display, Formatter};

use crate::chain::ChainId;
use crate::proto;
use crate::proto::v1;

/// Version marker that serializes as the integer `2`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct X402Version2;

impl X402Version2 {
    pub const VALUE: u8 = 2;
}

impl Serialize for X402Version2 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(Self::VALUE)
    }
}

impl<'de> Deserialize<'de> for X402Version2 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let num = u8::deserialize(deserializer)?;
        if num == Self::VALUE {
            Ok(X402Version2)
        } else {
            Err(serde::de::Error::custom(format!(
                "expected version {}, got {}",
                Self::VALUE,
                num
            )))
        }
    }
}

impl Display for X402Version2 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Self::VALUE)
    }
}

pub type VerifyResponse = v1::VerifyResponse;

pub type SettleResponse = v1::SettleResponse;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    pub url: String,
    pub description: String,
    pub mime_type: String,
}

/// Body of `POST /verify` and `POST /settle` for V2.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest<TPayload> {
    pub x402_version: X402Version2,
    pub payment_payload: PaymentPayload<TPayload>,
    pub payment_requirements: PaymentRequirements,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload<TPayload> {
    pub x402_version: X402Version2,
    pub accepted: PaymentRequirements,
    pub payload: TPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: String,
    pub network: ChainId,
    pub amount: String,
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
            network: value.network.chain_id(),
            amount: value.max_amount_required.clone(),
            pay_to: value.pay_to.clone(),
            max_timeout_seconds: value.max_timeout_seconds,
            asset: value.asset.clone(),
            extra: value.extra.clone(),
        }
    }
}

impl From<&proto::PaymentRequirements> for ResourceInfo {
    fn from(value: &proto::PaymentRequirements) -> Self {
        ResourceInfo {
            url: value.resource.clone(),
            description: value.description.clone(),
            mime_type: value.mime_type.clone(),
        }
    }
}
