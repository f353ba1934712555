//! Settlement core for [x402](https://www.x402.org) payments.
//!
//! The crate takes a payment from a USD price to an on-chain settlement and a
//! tamper-evident receipt:
//!
//! 1. [`challenge`] turns a price into [`PaymentRequirements`].
//! 2. [`authorization`] signs a chain-specific authorization for them: an ERC-3009
//!    `transferWithAuthorization` on EVM chains, or a partially signed three-instruction
//!    transfer on Solana.
//! 3. [`facilitator_client`] submits it to a remote facilitator, verify first and settle
//!    only when verification passed. Calls are JWT-authenticated and run behind the
//!    [`resilience`] circuit breaker and retry policies.
//! 4. [`receipt`] mints a checksummed receipt per settled operation and folds batches of
//!    receipts into a Merkle root for anchoring.
//!
//! Chain-specific pieces live in the `x402-settle-eip155` and `x402-settle-solana` crates,
//! wire types in `x402-settle-types`.
//!
//! # Example
//!
//! ```rust,no_run
//! use alloy_signer_local::PrivateKeySigner;
//! use x402_settle::{AuthorizationBuilder, FacilitatorClient, PayerKey, PaymentChallenge};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let requirements = PaymentChallenge::exact(
//!     "$0.01",
//!     "base-sepolia".parse()?,
//!     "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
//!     "https://api.example.com/weather",
//! )
//! .requirements()?;
//! let payer = PayerKey::Evm(PrivateKeySigner::random());
//! let authorization = AuthorizationBuilder::evm_only()
//!     .authorize(&requirements, &payer)
//!     .await?;
//! let facilitator = FacilitatorClient::try_from("https://facilitator.x402.rs")?;
//! let outcome = facilitator.verify_and_settle(&authorization, &requirements).await?;
//! println!("settled: {:?}", outcome.tx_hash);
//! # Ok(())
//! # }
//! ```

pub mod authorization;
pub mod challenge;
pub mod config;
pub mod facilitator_client;
pub mod jwt;
pub mod receipt;
pub mod resilience;
pub mod telemetry;

pub use authorization::{Authorization, AuthorizationBuilder, AuthorizationError, PayerKey};
pub use challenge::PaymentChallenge;
pub use facilitator_client::{FacilitatorClient, FacilitatorClientError};
pub use receipt::{Receipt, ReceiptLedger};
pub use resilience::{CircuitBreaker, CircuitOpenError, CircuitState};
pub use x402_settle_types::chain::NetworkKind;
pub use x402_settle_types::proto::{
    PaymentRequirements, ProtocolVersion, SettleOutcome, VerifyOutcome,
};
