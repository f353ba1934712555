//! Solana value types as they appear on the wire.

use serde_with::{DeserializeFromStr, SerializeDisplay};
use solana_pubkey::Pubkey;
use std::fmt;
use std::str::FromStr;
use x402_settle_types::chain::{NetworkKind, SolanaCluster};

/// A Solana public key, serialized as base58.
///
/// ```
/// use std::str::FromStr;
/// use x402_settle_solana::chain::Address;
///
/// let addr = Address::from_str("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v").unwrap();
/// assert_eq!(addr.to_string(), "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");
/// ```
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, SerializeDisplay, DeserializeFromStr)]
pub struct Address(Pubkey);

impl Address {
    pub const fn new(pubkey: Pubkey) -> Self {
        Self(pubkey)
    }

    pub fn pubkey(&self) -> &Pubkey {
        &self.0
    }
}

impl From<Pubkey> for Address {
    fn from(pubkey: Pubkey) -> Self {
        Self(pubkey)
    }
}

impl From<Address> for Pubkey {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Not a base58 Solana address: {0}")]
pub struct AddressFormatError(String);

impl FromStr for Address {
    type Err = AddressFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pubkey::from_str(s)
            .map(Self)
            .map_err(|_| AddressFormatError(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Network {0} is not a Solana cluster")]
pub struct NotASolanaNetwork(pub NetworkKind);

/// Resolves the Solana cluster of a network.
pub fn cluster_of(network: NetworkKind) -> Result<SolanaCluster, NotASolanaNetwork> {
    match network {
        NetworkKind::Solana(cluster) => Ok(cluster),
        other => Err(NotASolanaNetwork(other)),
    }
}

/// An SPL token mint on a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SolanaTokenDeployment {
    pub cluster: SolanaCluster,
    pub mint: Address,
    pub decimals: u8,
}
