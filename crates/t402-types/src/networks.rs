//! Well-known networks and their default stablecoin deployments.
//!
//! The protocol itself works with any CAIP-2 id. This table exists so servers can
//! say `"base"` or `"tron"` instead of spelling the id, and so a price like
//! `"$0.10"` can be turned into base units of the network's default stablecoin.
//!
//! ```
//! use t402_types::chain::ChainId;
//! use t402_types::networks::{chain_id_by_network_name, default_stablecoin};
//!
//! let tron = chain_id_by_network_name("tron").unwrap();
//! assert_eq!(tron, &ChainId::new("tron", "mainnet"));
//! assert_eq!(default_stablecoin(tron).unwrap().symbol, "USDT");
//! ```
//!
//! Tables are static and never mutated at runtime.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::chain::ChainId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub name: &'static str,
    pub namespace: &'static str,
    pub reference: &'static str,
}

impl NetworkInfo {
    pub fn chain_id(&self) -> ChainId {
        ChainId::new(self.namespace, self.reference)
    }
}

pub static KNOWN_NETWORKS: &[NetworkInfo] = &[
    // EVM
    NetworkInfo {
        name: "ethereum",
        namespace: "eip155",
        reference: "1",
    },
    NetworkInfo {
        name: "optimism",
        namespace: "eip155",
        reference: "10",
    },
    NetworkInfo {
        name: "unichain",
        namespace: "eip155",
        reference: "130",
    },
    NetworkInfo {
        name: "polygon",
        namespace: "eip155",
        reference: "137",
    },
    NetworkInfo {
        name: "base",
        namespace: "eip155",
        reference: "8453",
    },
    NetworkInfo {
        name: "arbitrum",
        namespace: "eip155",
        reference: "42161",
    },
    NetworkInfo {
        name: "ink",
        namespace: "eip155",
        reference: "57073",
    },
    NetworkInfo {
        name: "berachain",
        namespace: "eip155",
        reference: "80094",
    },
    NetworkInfo {
        name: "base-sepolia",
        namespace: "eip155",
        reference: "84532",
    },
    NetworkInfo {
        name: "arbitrum-sepolia",
        namespace: "eip155",
        reference: "421614",
    },
    // TON
    NetworkInfo {
        name: "ton",
        namespace: "ton",
        reference: "mainnet",
    },
    NetworkInfo {
        name: "ton-testnet",
        namespace: "ton",
        reference: "testnet",
    },
    // TRON
    NetworkInfo {
        name: "tron",
        namespace: "tron",
        reference: "mainnet",
    },
    NetworkInfo {
        name: "tron-nile",
        namespace: "tron",
        reference: "nile",
    },
    NetworkInfo {
        name: "tron-shasta",
        namespace: "tron",
        reference: "shasta",
    },
    // Solana
    NetworkInfo {
        name: "solana",
        namespace: "solana",
        reference: "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp",
    },
    NetworkInfo {
        name: "solana-devnet",
        namespace: "solana",
        reference: "EtWTRABZaYq6iMfeYKouRu166VU2xqa1",
    },
];

static NAME_TO_CHAIN_ID: LazyLock<HashMap<&'static str, ChainId>> = LazyLock::new(|| {
    KNOWN_NETWORKS
        .iter()
        .map(|network| (network.name, network.chain_id()))
        .collect()
});

static CHAIN_ID_TO_NAME: LazyLock<HashMap<ChainId, &'static str>> = LazyLock::new(|| {
    KNOWN_NETWORKS
        .iter()
        .map(|network| (network.chain_id(), network.name))
        .collect()
});

pub fn chain_id_by_network_name(name: &str) -> Option<&'static ChainId> {
    NAME_TO_CHAIN_ID.get(name)
}

pub fn network_name_by_chain_id(chain_id: &ChainId) -> Option<&'static str> {
    CHAIN_ID_TO_NAME.get(chain_id).copied()
}

/// A stablecoin deployment on one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StablecoinDeployment {
    pub network: &'static str,
    pub symbol: &'static str,
    /// Contract, Jetton master, or mint address in the family's native encoding.
    pub address: &'static str,
    pub decimals: u8,
    /// EIP-712 domain name and version, for EIP-3009 tokens.
    pub eip712: Option<(&'static str, &'static str)>,
}

/// The first entry per network is its default stablecoin.
pub static STABLECOINS: &[StablecoinDeployment] = &[
    StablecoinDeployment {
        network: "eip155:1",
        symbol: "USDT0",
        address: "0x6C96dE32CEa08842dcc4058c14d3aaAD7Fa41dee",
        decimals: 6,
        eip712: Some(("TetherToken", "1")),
    },
    StablecoinDeployment {
        network: "eip155:1",
        symbol: "USDC",
        address: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
        decimals: 6,
        eip712: Some(("USD Coin", "2")),
    },
    StablecoinDeployment {
        network: "eip155:42161",
        symbol: "USDT0",
        address: "0xFd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9",
        decimals: 6,
        eip712: Some(("TetherToken", "1")),
    },
    StablecoinDeployment {
        network: "eip155:42161",
        symbol: "USDC",
        address: "0xaf88d065e77c8cC2239327C5EDb3A432268e5831",
        decimals: 6,
        eip712: Some(("USD Coin", "2")),
    },
    StablecoinDeployment {
        network: "eip155:8453",
        symbol: "USDC",
        address: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
        decimals: 6,
        eip712: Some(("USD Coin", "2")),
    },
    StablecoinDeployment {
        network: "eip155:57073",
        symbol: "USDT0",
        address: "0x0200C29006150606B650577BBE7B6248F58470c1",
        decimals: 6,
        eip712: Some(("TetherToken", "1")),
    },
    StablecoinDeployment {
        network: "eip155:80094",
        symbol: "USDT0",
        address: "0x779Ded0c9e1022225f8E0630b35a9b54bE713736",
        decimals: 6,
        eip712: Some(("TetherToken", "1")),
    },
    StablecoinDeployment {
        network: "eip155:130",
        symbol: "USDT0",
        address: "0x588ce4F028D8e7B53B687865d6A67b3A54C75518",
        decimals: 6,
        eip712: Some(("TetherToken", "1")),
    },
    StablecoinDeployment {
        network: "eip155:137",
        symbol: "USDC",
        address: "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359",
        decimals: 6,
        eip712: Some(("USD Coin", "2")),
    },
    StablecoinDeployment {
        network: "eip155:10",
        symbol: "USDC",
        address: "0x0b2C639c533813f4Aa9D7837CAf62653d097Ff85",
        decimals: 6,
        eip712: Some(("USD Coin", "2")),
    },
    StablecoinDeployment {
        network: "ton:mainnet",
        symbol: "USDT",
        address: "EQCxE6mUtQJKFnGfaROTKOt1lZbDiiX1kCixRv7Nw2Id_sDs",
        decimals: 6,
        eip712: None,
    },
    StablecoinDeployment {
        network: "ton:testnet",
        symbol: "USDT",
        address: "kQD0GKBM8ZbryVk2aESmzfU6b9b_8era_IkvBSELujFZPsyy",
        decimals: 6,
        eip712: None,
    },
    StablecoinDeployment {
        network: "tron:mainnet",
        symbol: "USDT",
        address: "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t",
        decimals: 6,
        eip712: None,
    },
    StablecoinDeployment {
        network: "tron:nile",
        symbol: "USDT",
        address: "TXYZopYRdj2D9XRtbG411XZZ3kM5VkAeBf",
        decimals: 6,
        eip712: None,
    },
    StablecoinDeployment {
        network: "tron:shasta",
        symbol: "USDT",
        address: "TG3XXyExBkPp9nzdajDZsozEu4BkaSJozs",
        decimals: 6,
        eip712: None,
    },
    StablecoinDeployment {
        network: "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp",
        symbol: "USDC",
        address: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
        decimals: 6,
        eip712: None,
    },
    StablecoinDeployment {
        network: "solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1",
        symbol: "USDC",
        address: "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU",
        decimals: 6,
        eip712: None,
    },
];

/// All stablecoins known on a network, default first.
pub fn stablecoins(chain_id: &ChainId) -> impl Iterator<Item = &'static StablecoinDeployment> {
    let network = chain_id.to_string();
    STABLECOINS
        .iter()
        .filter(move |deployment| deployment.network == network)
}

pub fn default_stablecoin(chain_id: &ChainId) -> Option<&'static StablecoinDeployment> {
    stablecoins(chain_id).next()
}
