use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Bridge tuning, usually embedded in a larger JSON config.
///
/// ```json
/// { "slippagePercent": 0.3, "minNativeBalanceWei": "2000000000000000" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    /// How long `wait_for_delivery` polls before giving up.
    #[serde(default = "config_defaults::timeout_millis")]
    pub timeout_millis: u64,
    #[serde(default = "config_defaults::poll_interval_millis")]
    pub poll_interval_millis: u64,
    #[serde(default = "config_defaults::slippage_percent")]
    pub slippage_percent: f64,
    /// Native balance a chain needs before it is considered for routing.
    #[serde(default = "config_defaults::min_native_balance_wei")]
    pub min_native_balance_wei: U256,
    /// Per-chain budget of a balance query.
    #[serde(default = "config_defaults::balance_timeout_millis")]
    pub balance_timeout_millis: u64,
    /// Budget of the whole balance fan-out.
    #[serde(default = "config_defaults::balances_deadline_millis")]
    pub balances_deadline_millis: u64,
    /// LayerZero Scan API base, for the injected message lookup.
    #[serde(default = "config_defaults::scan_api_url")]
    pub scan_api_url: Url,
}

impl BridgeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_millis)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_millis)
    }

    pub fn balance_timeout(&self) -> Duration {
        Duration::from_millis(self.balance_timeout_millis)
    }

    pub fn balances_deadline(&self) -> Duration {
        Duration::from_millis(self.balances_deadline_millis)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            timeout_millis: config_defaults::timeout_millis(),
            poll_interval_millis: config_defaults::poll_interval_millis(),
            slippage_percent: config_defaults::slippage_percent(),
            min_native_balance_wei: config_defaults::min_native_balance_wei(),
            balance_timeout_millis: config_defaults::balance_timeout_millis(),
            balances_deadline_millis: config_defaults::balances_deadline_millis(),
            scan_api_url: config_defaults::scan_api_url(),
        }
    }
}

mod config_defaults {
    use alloy_primitives::U256;
    use url::Url;

    pub const LAYERZERO_SCAN_URL: &str = "https://scan.layerzero-api.com/v1";

    pub fn timeout_millis() -> u64 {
        600_000
    }

    pub fn poll_interval_millis() -> u64 {
        10_000
    }

    pub fn slippage_percent() -> f64 {
        0.5
    }

    /// 0.001 ETH.
    pub fn min_native_balance_wei() -> U256 {
        U256::from(1_000_000_000_000_000u64)
    }

    pub fn balance_timeout_millis() -> u64 {
        10_000
    }

    pub fn balances_deadline_millis() -> u64 {
        20_000
    }

    pub fn scan_api_url() -> Url {
        Url::parse(LAYERZERO_SCAN_URL).expect("valid url")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: BridgeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.timeout(), Duration::from_secs(600));
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.slippage_percent, 0.5);
        assert_eq!(config.min_native_balance_wei, U256::from(10u64).pow(U256::from(15u64)));
        assert_eq!(config.scan_api_url.as_str(), "https://scan.layerzero-api.com/v1");
    }

    #[test]
    fn test_overrides() {
        let config: BridgeConfig = serde_json::from_str(
            r#"{ "slippagePercent": 1.5, "balancesDeadlineMillis": 5000, "scanApiUrl": "http://localhost:8080/v1" }"#,
        )
        .unwrap();
        assert_eq!(config.slippage_percent, 1.5);
        assert_eq!(config.balances_deadline(), Duration::from_secs(5));
        assert_eq!(config.balance_timeout(), Duration::from_secs(10));
        assert_eq!(config.scan_api_url.host_str(), Some("localhost"));
    }
}
