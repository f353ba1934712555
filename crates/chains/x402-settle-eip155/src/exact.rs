//! ERC-3009 `transferWithAuthorization` for the "exact" scheme.
//!
//! [`sign_erc3009_authorization`] produces an [`ExactEvmPayload`], the JSON
//! object a facilitator expects under `paymentPayload.payload`:
//!
//! ```json
//! {
//!   "signature": "0x…",
//!   "authorization": {
//!     "from": "0x…", "to": "0x…", "value": "1000000",
//!     "validAfter": "1700000000", "validBefore": "1700003600", "nonce": "0x…"
//!   }
//! }
//! ```

use alloy_primitives::{Address, B256, Bytes, FixedBytes, Signature, U256};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{Eip712Domain, SolStruct, eip712_domain, sol};
use async_trait::async_trait;
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use x402_settle_types::timestamp::UnixTimestamp;

use crate::chain::{TokenDeploymentEip712, decimal_u256};

/// Width of the `[validAfter, validBefore)` window of every authorization.
pub const AUTHORIZATION_WINDOW_SECS: u64 = 3600;

/// Signed ERC-3009 authorization: the message and its detached signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayload {
    pub signature: Bytes,
    pub authorization: ExactEvmPayloadAuthorization,
}

/// Who may move how many tokens to whom, and when.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayloadAuthorization {
    pub from: Address,
    pub to: Address,
    #[serde(with = "decimal_u256")]
    pub value: U256,
    pub valid_after: UnixTimestamp,
    pub valid_before: UnixTimestamp,
    pub nonce: B256,
}

impl ExactEvmPayloadAuthorization {
    /// The EIP-712 struct the facilitator reconstructs to check the signature.
    pub fn as_typed_data(&self) -> TransferWithAuthorization {
        TransferWithAuthorization {
            from: self.from,
            to: self.to,
            value: self.value,
            validAfter: U256::from(self.valid_after.as_secs()),
            validBefore: U256::from(self.valid_before.as_secs()),
            nonce: self.nonce,
        }
    }
}

sol!(
    /// ERC-3009 `TransferWithAuthorization` as typed for EIP-712.
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
);

/// Inputs of an ERC-3009 signature.
#[derive(Debug, Clone)]
pub struct Eip3009SigningParams {
    /// Numeric EIP-155 chain id
    pub chain_id: u64,
    /// Token contract, the EIP-712 verifying contract
    pub asset_address: Address,
    pub pay_to: Address,
    pub amount: U256,
    /// Domain name and version of the token contract
    pub domain: TokenDeploymentEip712,
}

impl Eip3009SigningParams {
    pub fn eip712_domain(&self) -> Eip712Domain {
        eip712_domain! {
            name: self.domain.name.clone(),
            version: self.domain.version.clone(),
            chain_id: self.chain_id,
            verifying_contract: self.asset_address,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Erc3009SignError {
    #[error("Failed to sign ERC-3009 authorization: {0}")]
    Signer(#[source] alloy_signer::Error),
}

/// Signs a transfer of `params.amount` valid for one hour from now.
pub async fn sign_erc3009_authorization<S: SignerLike + Sync>(
    signer: &S,
    params: &Eip3009SigningParams,
) -> Result<ExactEvmPayload, Erc3009SignError> {
    sign_erc3009_authorization_at(signer, params, UnixTimestamp::now()).await
}

/// Like [`sign_erc3009_authorization`], with the window anchored at `now`.
///
/// `validAfter = now` and `validBefore = now + 3600`, so `validAfter <= now < validBefore`
/// holds at signing time. Every call draws a fresh random 32-byte nonce.
pub async fn sign_erc3009_authorization_at<S: SignerLike + Sync>(
    signer: &S,
    params: &Eip3009SigningParams,
    now: UnixTimestamp,
) -> Result<ExactEvmPayload, Erc3009SignError> {
    let nonce: [u8; 32] = rng().random();

    let authorization = ExactEvmPayloadAuthorization {
        from: signer.address(),
        to: params.pay_to,
        value: params.amount,
        valid_after: now,
        valid_before: now + AUTHORIZATION_WINDOW_SECS,
        nonce: FixedBytes(nonce),
    };

    let domain = params.eip712_domain();
    let eip712_hash = authorization.as_typed_data().eip712_signing_hash(&domain);
    let signature = signer
        .sign_hash(&eip712_hash)
        .await
        .map_err(Erc3009SignError::Signer)?;

    tracing::debug!(
        chain_id = params.chain_id,
        from = %authorization.from,
        to = %authorization.to,
        value = %authorization.value,
        "Signed ERC-3009 authorization"
    );

    Ok(ExactEvmPayload {
        signature: signature.as_bytes().into(),
        authorization,
    })
}

/// Signing capability, implemented for owned and `Arc`-shared signers.
///
/// Alloy's `Signer` is not implemented for `Arc<T>`, and `PrivateKeySigner`
/// is shared between concurrent authorizations.
#[async_trait]
pub trait SignerLike {
    fn address(&self) -> Address;

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, alloy_signer::Error>;
}

#[async_trait]
impl SignerLike for PrivateKeySigner {
    fn address(&self) -> Address {
        PrivateKeySigner::address(self)
    }

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, alloy_signer::Error> {
        alloy_signer::Signer::sign_hash(self, hash).await
    }
}

#[async_trait]
impl<T: SignerLike + Send + Sync> SignerLike for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign_hash(&self, hash: &FixedBytes<32>) -> Result<Signature, alloy_signer::Error> {
        (**self).sign_hash(hash).await
    }
}
