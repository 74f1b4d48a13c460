use t402_types::scheme::{EXACT_SCHEME, SchemeId, SchemeServer};

use crate::types::TON_NAMESPACE;

/// Prices resources in USDT Jettons. Enrichment copies the facilitator's extra.
#[derive(Debug, Clone, Copy, Default)]
pub struct TonExactServer;

impl SchemeId for TonExactServer {
    fn namespace(&self) -> &str {
        TON_NAMESPACE
    }

    fn scheme(&self) -> &str {
        EXACT_SCHEME
    }
}

impl SchemeServer for TonExactServer {}

#[cfg(test)]
mod tests {
    use super::*;
    use t402_types::chain::ChainId;
    use t402_types::util::TokenAmount;

    #[test]
    fn test_testnet_price_uses_testnet_master() {
        let network = ChainId::new("ton", "testnet");
        let priced = TonExactServer.parse_price("0.25", &network).unwrap();
        assert_eq!(priced.amount, TokenAmount::from(250_000u64));
        assert!(crate::address::is_valid_address(&priced.asset));
    }
}
