//! EIP-155 (EVM) support for x402 settlement.
//!
//! Payments on EVM chains are gasless ERC-3009 `transferWithAuthorization`
//! messages: the payer signs an EIP-712 typed message that lets anyone, in
//! practice the facilitator, move exactly `value` tokens from `from` to `to`
//! inside a one-hour window. The facilitator pays gas but never gains any
//! spending authority beyond the signed amount.
//!
//! - [`chain`] - Checksummed addresses, chain references, token deployments
//! - [`networks`] - USDC deployments with their EIP-712 domains
//! - [`exact`] - ERC-3009 authorization types and signing
//!
//! ```
//! use x402_settle_eip155::networks::usdc_deployment;
//!
//! let usdc = usdc_deployment(8453).unwrap();
//! assert_eq!(usdc.decimals, 6);
//! assert_eq!(usdc.eip712.name, "USD Coin");
//! ```

pub mod chain;
pub mod exact;
pub mod networks;

pub use exact::{Eip3009SigningParams, Erc3009SignError, SignerLike, sign_erc3009_authorization};
