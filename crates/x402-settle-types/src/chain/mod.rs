//! Chain identification.
//!
//! - [`ChainId`] - A CAIP-2 compliant chain identifier (e.g., `eip155:8453` for Base)
//! - [`NetworkKind`] - The resolved chain family of a known network, which decides
//!   how a payment is authorized and how it is named on the wire

mod chain_id;
mod network;

pub use chain_id::*;
pub use network::*;
