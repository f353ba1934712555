//! [CAIP-2](https://standards.chainagnostic.org/CAIPs/caip-2) chain ids, the network
//! spelling of protocol v2.
//!
//! ```
//! use x402_settle_types::chain::ChainId;
//!
//! let polygon: ChainId = "eip155:137".parse().unwrap();
//! assert!(polygon.is_eip155());
//! assert_eq!(polygon.reference(), "137");
//! ```

use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::fmt;
use std::str::FromStr;

use crate::networks::{EIP155_NAMESPACE, SOLANA_NAMESPACE};

/// `namespace:reference`, serialized as one string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct ChainId {
    pub namespace: String,
    pub reference: String,
}

impl ChainId {
    pub fn new<N: Into<String>, R: Into<String>>(namespace: N, reference: R) -> Self {
        Self {
            namespace: namespace.into(),
            reference: reference.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn is_eip155(&self) -> bool {
        self.namespace == EIP155_NAMESPACE
    }

    pub fn is_solana(&self) -> bool {
        self.namespace == SOLANA_NAMESPACE
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.reference)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid chain id format {0}, expected namespace:reference")]
pub struct ChainIdFormatError(String);

impl FromStr for ChainId {
    type Err = ChainIdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, reference) = s
            .split_once(':')
            .filter(|(namespace, reference)| !namespace.is_empty() && !reference.is_empty())
            .ok_or_else(|| ChainIdFormatError(s.to_string()))?;
        Ok(ChainId::new(namespace, reference))
    }
}
