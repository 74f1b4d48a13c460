use t402_types::scheme::{EXACT_SCHEME, SchemeId, SchemeServer};

use crate::types::TRON_NAMESPACE;

/// Prices resources in the network's USDT TRC-20 contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct TronExactServer;

impl SchemeId for TronExactServer {
    fn namespace(&self) -> &str {
        TRON_NAMESPACE
    }

    fn scheme(&self) -> &str {
        EXACT_SCHEME
    }
}

impl SchemeServer for TronExactServer {}

#[cfg(test)]
mod tests {
    use super::*;
    use t402_types::chain::ChainId;
    use t402_types::scheme::PriceError;

    #[test]
    fn test_unknown_network_has_no_default_asset() {
        let network = ChainId::new("tron", "unknown");
        let err = TronExactServer.parse_price("$1", &network).unwrap_err();
        assert!(matches!(err, PriceError::UnknownAsset(_)));

        let shasta = ChainId::new("tron", "shasta");
        let priced = TronExactServer.parse_price("$1", &shasta).unwrap();
        assert!(crate::address::is_valid_address(&priced.asset));
    }
}
