#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for x402 settlement.
//!
//! This crate holds the chain-agnostic vocabulary shared by the authorization
//! builders and the facilitator client: chain identifiers, the closed
//! [`NetworkKind`](chain::NetworkKind) enum that decides which chain family a
//! payment runs on, and the wire format of facilitator requests and responses
//! for both protocol versions.
//!
//! # Modules
//!
//! - [`chain`] - CAIP-2 chain ids and [`NetworkKind`](chain::NetworkKind)
//! - [`config`] - Configuration values that resolve environment variables
//! - [`networks`] - Registry of well-known networks (name ↔ CAIP-2)
//! - [`proto`] - Payment requirements, V1/V2 request bodies, typed outcomes
//! - [`timestamp`] - Unix timestamps for authorization windows
//! - [`util`] - Base64 and human-readable money amounts
//!
//! # Protocol Versions
//!
//! - **V1** ([`proto::v1`]): network names (e.g., "base-sepolia"), `maxAmountRequired`
//! - **V2** ([`proto::v2`]): CAIP-2 chain ids (e.g., "eip155:84532"), `amount`,
//!   requirements nested under `paymentPayload.accepted`

pub mod chain;
pub mod config;
pub mod networks;
pub mod proto;
pub mod timestamp;
pub mod util;
