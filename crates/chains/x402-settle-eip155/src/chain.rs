//! EVM value types as they appear on the wire.

use alloy_primitives::{Address, U256, hex};
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::fmt;
use std::str::FromStr;
use x402_settle_types::chain::{ChainId, NetworkKind};
use x402_settle_types::networks::EIP155_NAMESPACE;

/// An Ethereum address that serializes with EIP-55 checksum encoding.
///
/// ```
/// use x402_settle_eip155::chain::ChecksummedAddress;
///
/// let addr: ChecksummedAddress = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045".parse().unwrap();
/// assert_eq!(addr.to_string(), "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045");
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct ChecksummedAddress(pub Address);

impl FromStr for ChecksummedAddress {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_str(s).map(Self)
    }
}

impl fmt::Display for ChecksummedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_checksum(None))
    }
}

impl From<ChecksummedAddress> for Address {
    fn from(value: ChecksummedAddress) -> Self {
        value.0
    }
}

impl From<Address> for ChecksummedAddress {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

/// Serde adapter for `U256` as a decimal string (`"1000000"`), not alloy's default hex.
pub mod decimal_u256 {
    use alloy_primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        U256::from_str_radix(&s, 10).map_err(serde::de::Error::custom)
    }
}

/// Parses an atomic amount written as a decimal integer string.
pub fn parse_atomic_amount(amount: &str) -> Option<U256> {
    let amount = amount.trim();
    if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    U256::from_str_radix(amount, 10).ok()
}

/// Numeric EIP-155 chain id (e.g., `8453` for Base).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Eip155ChainReference(u64);

impl Eip155ChainReference {
    pub fn new(chain_id: u64) -> Self {
        Self(chain_id)
    }

    pub fn inner(&self) -> u64 {
        self.0
    }

    pub fn as_chain_id(&self) -> ChainId {
        ChainId::new(EIP155_NAMESPACE, self.0.to_string())
    }
}

impl fmt::Display for Eip155ChainReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Network {0} is not an EVM network")]
pub struct NotAnEvmNetwork(pub NetworkKind);

impl TryFrom<NetworkKind> for Eip155ChainReference {
    type Error = NotAnEvmNetwork;

    fn try_from(value: NetworkKind) -> Result<Self, Self::Error> {
        match value {
            NetworkKind::Evm { chain_id } => Ok(Eip155ChainReference(chain_id)),
            other => Err(NotAnEvmNetwork(other)),
        }
    }
}

/// EIP-712 domain name and version of a token contract.
///
/// Must match what the contract returns on-chain, or every signature over it
/// fails verification.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TokenDeploymentEip712 {
    pub name: String,
    pub version: String,
}

impl Default for TokenDeploymentEip712 {
    /// Circle's FiatTokenV2 domain.
    fn default() -> Self {
        Self {
            name: "USD Coin".into(),
            version: "2".into(),
        }
    }
}

/// A token contract on an EVM chain.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Eip155TokenDeployment {
    pub chain_reference: Eip155ChainReference,
    pub address: Address,
    pub decimals: u8,
    pub eip712: TokenDeploymentEip712,
}
