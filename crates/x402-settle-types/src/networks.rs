//! Registry of well-known networks.
//!
//! Protocol v1 names networks with short strings (`"base-sepolia"`), protocol v2
//! with CAIP-2 chain ids (`"eip155:84532"`). The settlement core accepts either
//! form from callers and has to emit the right one on the wire, so it keeps a
//! fixed table mapping one to the other.
//!
//! The table is deliberately closed: a network that is not listed here cannot be
//! resolved into a [`NetworkKind`](crate::chain::NetworkKind), and therefore no
//! authorization can be built for it.
//!
//! ```
//! use x402_settle_types::chain::ChainId;
//! use x402_settle_types::networks::{chain_id_by_network_name, network_name_by_chain_id};
//!
//! let polygon = chain_id_by_network_name("polygon").unwrap();
//! assert_eq!(polygon.to_string(), "eip155:137");
//!
//! let devnet = ChainId::new("solana", "EtWTRABZaYq6iMfeYKouRu166VU2xqa1");
//! assert_eq!(network_name_by_chain_id(&devnet), Some("solana-devnet"));
//! ```

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::chain::ChainId;

/// CAIP-2 namespace of EVM chains.
pub const EIP155_NAMESPACE: &str = "eip155";
/// CAIP-2 namespace of Solana clusters.
pub const SOLANA_NAMESPACE: &str = "solana";

/// A known network: its v1 name and its CAIP-2 components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub name: &'static str,
    pub namespace: &'static str,
    /// Decimal chain id for EVM, truncated genesis hash for Solana.
    pub reference: &'static str,
}

impl NetworkInfo {
    const fn evm(name: &'static str, chain_id: &'static str) -> Self {
        Self {
            name,
            namespace: EIP155_NAMESPACE,
            reference: chain_id,
        }
    }

    const fn solana(name: &'static str, genesis: &'static str) -> Self {
        Self {
            name,
            namespace: SOLANA_NAMESPACE,
            reference: genesis,
        }
    }

    pub fn chain_id(&self) -> ChainId {
        ChainId::new(self.namespace, self.reference)
    }
}

/// Every network the settlement core can build authorizations for.
pub static KNOWN_NETWORKS: &[NetworkInfo] = &[
    NetworkInfo::evm("base", "8453"),
    NetworkInfo::evm("base-sepolia", "84532"),
    NetworkInfo::evm("polygon", "137"),
    NetworkInfo::evm("polygon-amoy", "80002"),
    NetworkInfo::evm("avalanche", "43114"),
    NetworkInfo::evm("avalanche-fuji", "43113"),
    NetworkInfo::solana("solana", "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp"),
    NetworkInfo::solana("solana-devnet", "EtWTRABZaYq6iMfeYKouRu166VU2xqa1"),
];

static NAME_TO_CHAIN_ID: LazyLock<HashMap<&'static str, ChainId>> = LazyLock::new(|| {
    KNOWN_NETWORKS
        .iter()
        .map(|n| (n.name, n.chain_id()))
        .collect()
});

static CHAIN_ID_TO_NAME: LazyLock<HashMap<ChainId, &'static str>> = LazyLock::new(|| {
    KNOWN_NETWORKS
        .iter()
        .map(|n| (n.chain_id(), n.name))
        .collect()
});

/// Looks up the CAIP-2 chain id of a v1 network name. Case-sensitive.
pub fn chain_id_by_network_name(name: &str) -> Option<&ChainId> {
    NAME_TO_CHAIN_ID.get(name)
}

/// Reverse of [`chain_id_by_network_name`].
pub fn network_name_by_chain_id(chain_id: &ChainId) -> Option<&'static str> {
    CHAIN_ID_TO_NAME.get(chain_id).copied()
}
