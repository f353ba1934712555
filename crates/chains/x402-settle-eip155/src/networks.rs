//! USDC deployments on the known EVM networks.
//!
//! Domain names differ between chains: Circle deployed the testnet contracts on
//! Base Sepolia and Polygon as `"USDC"`, the rest as `"USD Coin"`.

use alloy_primitives::address;
use std::sync::LazyLock;

use crate::chain::{Eip155ChainReference, Eip155TokenDeployment, TokenDeploymentEip712};

fn deployment(
    chain_id: u64,
    address: alloy_primitives::Address,
    domain_name: &str,
) -> Eip155TokenDeployment {
    Eip155TokenDeployment {
        chain_reference: Eip155ChainReference::new(chain_id),
        address,
        decimals: 6,
        eip712: TokenDeploymentEip712 {
            name: domain_name.into(),
            version: "2".into(),
        },
    }
}

static USDC_DEPLOYMENTS: LazyLock<Vec<Eip155TokenDeployment>> = LazyLock::new(|| {
    vec![
        // Base
        deployment(
            8453,
            address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
            "USD Coin",
        ),
        deployment(
            84532,
            address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
            "USDC",
        ),
        // Polygon
        deployment(
            137,
            address!("0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359"),
            "USDC",
        ),
        deployment(
            80002,
            address!("0x41E94Eb019C0762f9Bfcf9Fb1E58725BfB0e7582"),
            "USDC",
        ),
        // Avalanche
        deployment(
            43114,
            address!("0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E"),
            "USD Coin",
        ),
        deployment(
            43113,
            address!("0x5425890298aed601595a70AB815c96711a31Bc65"),
            "USD Coin",
        ),
    ]
});

/// USDC on the EVM chain with the given numeric id.
pub fn usdc_deployment(chain_id: u64) -> Option<&'static Eip155TokenDeployment> {
    USDC_DEPLOYMENTS
        .iter()
        .find(|d| d.chain_reference.inner() == chain_id)
}

/// USDC deployment whose contract is `asset`, if `asset` is a known USDC contract.
pub fn usdc_by_address(
    chain_id: u64,
    asset: &alloy_primitives::Address,
) -> Option<&'static Eip155TokenDeployment> {
    usdc_deployment(chain_id).filter(|d| &d.address == asset)
}
