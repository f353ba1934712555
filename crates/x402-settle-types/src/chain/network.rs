use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;
use std::str::FromStr;

use crate::chain::ChainId;
use crate::networks::{self, EIP155_NAMESPACE, SOLANA_NAMESPACE};

/// A Solana cluster the settlement core knows how to pay on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolanaCluster {
    Mainnet,
    Devnet,
}

impl SolanaCluster {
    /// CAIP-2 reference: the first 32 characters of the cluster's genesis hash.
    pub fn genesis_reference(&self) -> &'static str {
        match self {
            SolanaCluster::Mainnet => "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp",
            SolanaCluster::Devnet => "EtWTRABZaYq6iMfeYKouRu166VU2xqa1",
        }
    }

    fn from_genesis_reference(reference: &str) -> Option<Self> {
        [SolanaCluster::Mainnet, SolanaCluster::Devnet]
            .into_iter()
            .find(|cluster| cluster.genesis_reference() == reference)
    }
}

/// The chain family a payment runs on.
///
/// Parsing and [`NetworkKind::from_chain_id`] only yield networks listed in
/// [`KNOWN_NETWORKS`](crate::networks::KNOWN_NETWORKS); a hand-built `Evm`
/// variant may name any chain, see [`NetworkKind::is_known`]. It selects the
/// authorization path (ERC-3009 vs. Solana transfer transaction) and provides
/// both wire spellings of the network: the v1 name and the v2 CAIP-2 id.
///
/// Parsing accepts either spelling:
///
/// ```
/// use x402_settle_types::chain::{NetworkKind, SolanaCluster};
///
/// let a: NetworkKind = "base-sepolia".parse().unwrap();
/// let b: NetworkKind = "eip155:84532".parse().unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a, NetworkKind::Evm { chain_id: 84532 });
///
/// let devnet: NetworkKind = "solana-devnet".parse().unwrap();
/// assert_eq!(devnet, NetworkKind::Solana(SolanaCluster::Devnet));
///
/// assert!("eip155:1".parse::<NetworkKind>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkKind {
    Evm { chain_id: u64 },
    Solana(SolanaCluster),
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown network {0}")]
pub struct UnknownNetworkError(pub String);

impl NetworkKind {
    /// Resolves a CAIP-2 chain id against the known networks registry.
    pub fn from_chain_id(chain_id: &ChainId) -> Result<Self, UnknownNetworkError> {
        let unknown = || UnknownNetworkError(chain_id.to_string());
        if networks::network_name_by_chain_id(chain_id).is_none() {
            return Err(unknown());
        }
        match chain_id.namespace() {
            EIP155_NAMESPACE => {
                let chain_id = chain_id.reference().parse::<u64>().map_err(|_| unknown())?;
                Ok(NetworkKind::Evm { chain_id })
            }
            SOLANA_NAMESPACE => SolanaCluster::from_genesis_reference(chain_id.reference())
                .map(NetworkKind::Solana)
                .ok_or_else(unknown),
            _ => Err(unknown()),
        }
    }

    /// CAIP-2 chain id, the network spelling used by protocol v2.
    pub fn chain_id(&self) -> ChainId {
        match self {
            NetworkKind::Evm { chain_id } => ChainId::new(EIP155_NAMESPACE, chain_id.to_string()),
            NetworkKind::Solana(cluster) => {
                ChainId::new(SOLANA_NAMESPACE, cluster.genesis_reference())
            }
        }
    }

    /// Network name, the spelling used by protocol v1. `None` for a hand-built
    /// `Evm` variant whose chain id is not in the registry.
    pub fn network_name(&self) -> Option<&'static str> {
        networks::network_name_by_chain_id(&self.chain_id())
    }

    /// Whether this network is listed in the registry.
    pub fn is_known(&self) -> bool {
        self.network_name().is_some()
    }

    pub fn is_evm(&self) -> bool {
        matches!(self, NetworkKind::Evm { .. })
    }

    pub fn is_solana(&self) -> bool {
        matches!(self, NetworkKind::Solana(_))
    }
}

/// The v1 name, or the CAIP-2 id for chains outside the registry.
impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.network_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.chain_id()),
        }
    }
}

impl FromStr for NetworkKind {
    type Err = UnknownNetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chain_id = match networks::chain_id_by_network_name(s) {
            Some(chain_id) => chain_id.clone(),
            None => ChainId::from_str(s).map_err(|_| UnknownNetworkError(s.to_string()))?,
        };
        NetworkKind::from_chain_id(&chain_id)
    }
}

impl Serialize for NetworkKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NetworkKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NetworkKind::from_str(&s).map_err(de::Error::custom)
    }
}
