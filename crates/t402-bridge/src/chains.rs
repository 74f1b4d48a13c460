//! Chains USDT0 can be bridged between, with their LayerZero endpoint ids and
//! OFT contract addresses.

use alloy_primitives::{Address, address};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use t402_types::chain::ChainId;

pub const EIP155_NAMESPACE: &str = "eip155";

/// Bridge-capable chains. The set is fixed; a chain holding USDT0 that is not
/// listed here is never routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeChain {
    Ethereum,
    Arbitrum,
    Ink,
    Berachain,
    Unichain,
}

impl BridgeChain {
    pub const ALL: [BridgeChain; 5] = [
        BridgeChain::Ethereum,
        BridgeChain::Arbitrum,
        BridgeChain::Ink,
        BridgeChain::Berachain,
        BridgeChain::Unichain,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BridgeChain::Ethereum => "ethereum",
            BridgeChain::Arbitrum => "arbitrum",
            BridgeChain::Ink => "ink",
            BridgeChain::Berachain => "berachain",
            BridgeChain::Unichain => "unichain",
        }
    }

    pub fn evm_chain_id(&self) -> u64 {
        match self {
            BridgeChain::Ethereum => 1,
            BridgeChain::Arbitrum => 42161,
            BridgeChain::Ink => 57073,
            BridgeChain::Berachain => 80094,
            BridgeChain::Unichain => 130,
        }
    }

    pub fn chain_id(&self) -> ChainId {
        ChainId::new(EIP155_NAMESPACE, self.evm_chain_id().to_string())
    }

    /// LayerZero V2 endpoint id.
    pub fn endpoint_id(&self) -> u32 {
        match self {
            BridgeChain::Ethereum => 30101,
            BridgeChain::Arbitrum => 30110,
            BridgeChain::Ink => 30291,
            BridgeChain::Berachain => 30362,
            BridgeChain::Unichain => 30320,
        }
    }

    /// USDT0 OFT contract. On Ethereum this is the adapter locking USDT.
    pub fn oft_address(&self) -> Address {
        match self {
            BridgeChain::Ethereum => address!("0x6C96dE32CEa08842dcc4058c14d3aaAD7Fa41dee"),
            BridgeChain::Arbitrum => address!("0xFd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9"),
            BridgeChain::Ink => address!("0x0200C29006150606B650577BBE7B6248F58470c1"),
            BridgeChain::Berachain => address!("0x779Ded0c9e1022225f8E0630b35a9b54bE713736"),
            BridgeChain::Unichain => address!("0x588ce4F028D8e7B53B687865d6A67b3A54C75518"),
        }
    }

    /// ERC-20 holding the bridged balance: USDT behind the Ethereum adapter,
    /// the OFT itself elsewhere.
    pub fn token_address(&self) -> Address {
        match self {
            BridgeChain::Ethereum => address!("0xdAC17F958D2ee523a2206206994597C13D831ec7"),
            other => other.oft_address(),
        }
    }

    pub fn is_l1(&self) -> bool {
        matches!(self, BridgeChain::Ethereum)
    }

    pub fn from_chain_id(chain_id: &ChainId) -> Option<Self> {
        if chain_id.namespace() != EIP155_NAMESPACE {
            return None;
        }
        let id: u64 = chain_id.reference().parse().ok()?;
        Self::ALL.into_iter().find(|chain| chain.evm_chain_id() == id)
    }

    pub fn from_endpoint_id(eid: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|chain| chain.endpoint_id() == eid)
    }
}

impl fmt::Display for BridgeChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Chain {0} does not support USDT0 bridging")]
pub struct UnknownBridgeChain(pub String);

/// Accepts a chain name (`arbitrum`) or a CAIP-2 id (`eip155:42161`).
impl FromStr for BridgeChain {
    type Err = UnknownBridgeChain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let by_name = Self::ALL
            .into_iter()
            .find(|chain| chain.name().eq_ignore_ascii_case(s));
        by_name
            .or_else(|| ChainId::from_str(s).ok().and_then(|id| Self::from_chain_id(&id)))
            .ok_or_else(|| UnknownBridgeChain(s.to_string()))
    }
}

/// Typical end-to-end delivery time of a transfer between two chains.
///
/// Anything touching Ethereum waits for L1 finality.
pub fn estimated_bridge_time(from: BridgeChain, to: BridgeChain) -> Duration {
    if from.is_l1() || to.is_l1() {
        Duration::from_secs(900)
    } else {
        Duration::from_secs(300)
    }
}
