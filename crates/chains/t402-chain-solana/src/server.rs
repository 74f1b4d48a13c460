use t402_types::scheme::{EXACT_SCHEME, SchemeId, SchemeServer};

use crate::types::SOLANA_NAMESPACE;

/// Prices resources in the network's default SPL stablecoin. The facilitator's
/// `feePayer` reaches clients through the default requirements enrichment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolanaExactServer;

impl SchemeId for SolanaExactServer {
    fn namespace(&self) -> &str {
        SOLANA_NAMESPACE
    }

    fn scheme(&self) -> &str {
        EXACT_SCHEME
    }
}

impl SchemeServer for SolanaExactServer {}
