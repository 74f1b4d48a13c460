//! Chain identifiers and the capability each chain family must provide.
//!
//! - [`ChainId`] / [`ChainIdPattern`] - CAIP-2 ids and the patterns matched against them
//! - [`ChainRpc`] - the injected per-chain capability (sequence info, broadcast, balances)
//! - [`ChainRegistry`] - providers indexed by chain id

mod chain_id;
mod rpc;

pub use chain_id::*;
pub use rpc::*;

use std::collections::HashMap;
use std::sync::Arc;

/// Metadata every chain provider exposes regardless of family.
pub trait ChainProviderOps {
    /// Facilitator signer addresses on this chain, in the family's native encoding.
    fn signer_addresses(&self) -> Vec<String>;

    fn chain_id(&self) -> ChainId;
}

impl<T: ChainProviderOps> ChainProviderOps for Arc<T> {
    fn signer_addresses(&self) -> Vec<String> {
        (**self).signer_addresses()
    }
    fn chain_id(&self) -> ChainId {
        (**self).chain_id()
    }
}

/// Providers indexed by chain id.
///
/// Built once at startup and read-only afterwards.
#[derive(Debug)]
pub struct ChainRegistry<P>(HashMap<ChainId, P>);

impl<P> Default for ChainRegistry<P> {
    fn default() -> Self {
        Self(HashMap::new())
    }
}

impl<P: ChainProviderOps> ChainRegistry<P> {
    /// Indexes providers by the chain id they report.
    pub fn from_providers<I: IntoIterator<Item = P>>(providers: I) -> Self {
        Self(
            providers
                .into_iter()
                .map(|provider| (provider.chain_id(), provider))
                .collect(),
        )
    }
}

impl<P> ChainRegistry<P> {
    pub fn new(providers: HashMap<ChainId, P>) -> Self {
        Self(providers)
    }

    pub fn by_chain_id(&self, chain_id: &ChainId) -> Option<&P> {
        self.0.get(chain_id)
    }

    /// All providers whose chain id matches the pattern.
    pub fn by_chain_id_pattern(&self, pattern: &ChainIdPattern) -> Vec<&P> {
        self.0
            .iter()
            .filter_map(|(chain_id, provider)| pattern.matches(chain_id).then_some(provider))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChainId, &P)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
