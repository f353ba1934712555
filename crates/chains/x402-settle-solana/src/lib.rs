//! Solana support for x402 settlement.
//!
//! A Solana payment is a versioned transaction the payer signs but does not
//! submit. The facilitator adds its fee-payer signature and broadcasts it. To
//! be accepted, the transaction must contain exactly three instructions, in
//! this order:
//!
//! 1. `SetComputeUnitLimit`
//! 2. `SetComputeUnitPrice`
//! 3. `TransferChecked` from the payer's associated token account to the
//!    recipient's
//!
//! The facilitator's fee payer never appears among the transfer accounts, so
//! the only thing it can do with the transaction is pay for it.
//!
//! - [`chain`] - Base58 addresses and token deployments
//! - [`networks`] - USDC mints per cluster
//! - [`rpc`] - The subset of the Solana RPC the builder needs
//! - [`exact`] - Transaction builder and partially-signed transaction wrapper

pub mod chain;
pub mod exact;
pub mod networks;
pub mod rpc;

pub use exact::{
    ExactSolanaPayload, SolanaExactError, TransactionInt, TransferParams,
    build_signed_transfer_transaction,
};
