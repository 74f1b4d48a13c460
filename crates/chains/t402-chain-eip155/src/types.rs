//! Wire types for the EVM `exact` scheme.

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::{Eip712Domain, eip712_domain, sol};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use t402_types::chain::ChainId;
use t402_types::networks;
use t402_types::proto::v2::PaymentRequirements;
use t402_types::timestamp::UnixTimestamp;
use t402_types::util::TokenAmount;

pub const EIP155_NAMESPACE: &str = "eip155";

/// EIP-712 domain used when requirements do not name one.
pub const DEFAULT_DOMAIN_NAME: &str = "USD Coin";
pub const DEFAULT_DOMAIN_VERSION: &str = "2";

sol!(
    /// EIP-712 message signed by the payer.
    #[derive(Debug)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
);

sol! {
    /// EIP-3009 entry point with a split `(v, r, s)` signature.
    function transferWithAuthorization(
        address from,
        address to,
        uint256 value,
        uint256 validAfter,
        uint256 validBefore,
        bytes32 nonce,
        uint8 v,
        bytes32 r,
        bytes32 s
    ) external;
}

/// The `payload` object of an EVM `exact` payment.
///
/// ```json
/// {
///   "signature": "0x...65 bytes",
///   "authorization": {
///     "from": "0x...", "to": "0x...", "value": "10000",
///     "validAfter": "1700000000", "validBefore": "1700000300", "nonce": "0x...32 bytes"
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayload {
    pub signature: Bytes,
    pub authorization: ExactEvmAuthorization,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmAuthorization {
    pub from: Address,
    pub to: Address,
    pub value: TokenAmount,
    pub valid_after: UnixTimestamp,
    pub valid_before: UnixTimestamp,
    pub nonce: B256,
}

impl ExactEvmAuthorization {
    /// The typed message whose EIP-712 hash the payer signs.
    pub fn typed_message(&self) -> TransferWithAuthorization {
        TransferWithAuthorization {
            from: self.from,
            to: self.to,
            value: self.value.0,
            validAfter: U256::from(self.valid_after.as_secs()),
            validBefore: U256::from(self.valid_before.as_secs()),
            nonce: self.nonce,
        }
    }
}

/// Numeric chain id of an `eip155:<n>` network.
pub fn evm_chain_id(chain_id: &ChainId) -> Option<u64> {
    if chain_id.namespace != EIP155_NAMESPACE {
        return None;
    }
    chain_id.reference.parse().ok()
}

pub fn parse_address(address: &str) -> Option<Address> {
    if !address.starts_with("0x") && !address.starts_with("0X") {
        return None;
    }
    Address::from_str(address).ok()
}

pub fn is_valid_address(address: &str) -> bool {
    parse_address(address).is_some()
}

/// EIP-712 name and version of the token: `extra.name`/`extra.version`, then the
/// known deployment, then the USDC defaults.
pub fn domain_name_version(requirements: &PaymentRequirements) -> (String, String) {
    if let (Some(name), Some(version)) = (
        requirements.extra_str("name"),
        requirements.extra_str("version"),
    ) {
        return (name.to_string(), version.to_string());
    }
    let known = networks::stablecoins(&requirements.network).find(|deployment| {
        parse_address(deployment.address) == parse_address(&requirements.asset)
    });
    match known.and_then(|deployment| deployment.eip712) {
        Some((name, version)) => (name.to_string(), version.to_string()),
        None => (
            DEFAULT_DOMAIN_NAME.to_string(),
            DEFAULT_DOMAIN_VERSION.to_string(),
        ),
    }
}

pub fn eip712_domain(name: String, version: String, chain_id: u64, asset: Address) -> Eip712Domain {
    eip712_domain! {
        name: name,
        version: version,
        chain_id: chain_id,
        verifying_contract: asset,
    }
}
