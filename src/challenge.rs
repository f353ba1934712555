//! Payment requirements from a USD price.
//!
//! ```rust
//! use x402_settle::challenge::PaymentChallenge;
//! use x402_settle_types::chain::NetworkKind;
//!
//! let requirements = PaymentChallenge::exact(
//!     "$0.01",
//!     NetworkKind::Evm { chain_id: 84532 },
//!     "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
//!     "https://api.example.com/weather",
//! )
//! .with_description("Weather report")
//! .requirements()
//! .unwrap();
//! assert_eq!(requirements.max_amount_required, "10000");
//! ```

use serde_json::json;
use std::str::FromStr;
use x402_settle_eip155::chain::ChecksummedAddress;
use x402_settle_eip155::networks as eip155_networks;
use x402_settle_solana::networks as solana_networks;
use x402_settle_types::chain::NetworkKind;
use x402_settle_types::proto::{PaymentRequirements, SCHEME_EXACT};
use x402_settle_types::util::{MoneyAmount, MoneyAmountParseError};

pub const DEFAULT_MIME_TYPE: &str = "application/json";
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum ChallengeError {
    #[error("Invalid price: {0}")]
    InvalidPrice(#[from] MoneyAmountParseError),
    #[error("No USDC deployment known on {0}")]
    NoKnownAsset(NetworkKind),
    #[error("Invalid {network} recipient address: {address}")]
    InvalidRecipient {
        network: NetworkKind,
        address: String,
    },
}

/// An "exact" USDC challenge under construction.
#[derive(Debug, Clone)]
pub struct PaymentChallenge {
    price: String,
    network: NetworkKind,
    pay_to: String,
    resource: String,
    description: String,
    mime_type: String,
    max_timeout_seconds: u64,
    fee_payer: Option<String>,
}

impl PaymentChallenge {
    /// Charge `price_usd` in USDC on `network`, paid to `pay_to` for `resource`.
    pub fn exact(
        price_usd: impl Into<String>,
        network: NetworkKind,
        pay_to: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            price: price_usd.into(),
            network,
            pay_to: pay_to.into(),
            resource: resource.into(),
            description: String::new(),
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
            fee_payer: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn with_max_timeout_seconds(mut self, seconds: u64) -> Self {
        self.max_timeout_seconds = seconds;
        self
    }

    /// Facilitator account that pays Solana transaction fees. Ignored on EVM.
    pub fn with_fee_payer(mut self, fee_payer: impl Into<String>) -> Self {
        self.fee_payer = Some(fee_payer.into());
        self
    }

    /// Resolves the asset and converts the price to atomic units. EVM
    /// addresses come out EIP-55 checksummed.
    ///
    /// The same inputs always give the same requirements.
    pub fn requirements(&self) -> Result<PaymentRequirements, ChallengeError> {
        let price = MoneyAmount::parse(&self.price)?;
        let (pay_to, asset, decimals, extra) = match self.network {
            NetworkKind::Evm { chain_id } => {
                let pay_to = ChecksummedAddress::from_str(&self.pay_to).map_err(|_| {
                    ChallengeError::InvalidRecipient {
                        network: self.network,
                        address: self.pay_to.clone(),
                    }
                })?;
                let deployment = eip155_networks::usdc_deployment(chain_id)
                    .ok_or(ChallengeError::NoKnownAsset(self.network))?;
                let extra = json!({
                    "name": deployment.eip712.name,
                    "version": deployment.eip712.version,
                });
                (
                    pay_to.to_string(),
                    ChecksummedAddress::from(deployment.address).to_string(),
                    deployment.decimals,
                    Some(extra),
                )
            }
            NetworkKind::Solana(cluster) => {
                solana_pubkey::Pubkey::from_str(&self.pay_to).map_err(|_| {
                    ChallengeError::InvalidRecipient {
                        network: self.network,
                        address: self.pay_to.clone(),
                    }
                })?;
                let deployment = solana_networks::usdc_deployment(cluster);
                let extra = self
                    .fee_payer
                    .as_ref()
                    .map(|fee_payer| json!({ "feePayer": fee_payer }));
                (
                    self.pay_to.clone(),
                    deployment.mint.to_string(),
                    deployment.decimals,
                    extra,
                )
            }
        };
        let atomic = price.to_atomic_units(decimals)?;

        Ok(PaymentRequirements {
            scheme: SCHEME_EXACT.to_string(),
            network: self.network,
            max_amount_required: atomic.to_string(),
            resource: self.resource.clone(),
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
            pay_to,
            max_timeout_seconds: self.max_timeout_seconds,
            asset,
            extra,
        })
    }
}
