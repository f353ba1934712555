//! USDC mints per cluster.

use solana_pubkey::pubkey;
use x402_settle_types::chain::SolanaCluster;

use crate::chain::{Address, SolanaTokenDeployment};

pub fn usdc_deployment(cluster: SolanaCluster) -> SolanaTokenDeployment {
    let mint = match cluster {
        SolanaCluster::Mainnet => pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"),
        SolanaCluster::Devnet => pubkey!("4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU"),
    };
    SolanaTokenDeployment {
        cluster,
        mint: Address::new(mint),
        decimals: 6,
    }
}
