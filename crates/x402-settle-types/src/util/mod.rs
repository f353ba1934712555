//! Helper types.
//!
//! - [`b64`] - Base64 wrapper used for serialized transactions and raw keys
//! - [`money_amount`] - Human-readable USD price parsing

pub mod b64;
pub mod money_amount;

pub use b64::*;
pub use money_amount::*;
