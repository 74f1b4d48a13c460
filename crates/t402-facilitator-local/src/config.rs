//! Facilitator configuration.
//!
//! Loaded from a JSON file whose path comes from `--config` or `CONFIG`
//! (default `config.json`), after `.env` is read into the environment. Every
//! field is optional:
//!
//! ```json
//! {
//!   "chains": {
//!     "ton:mainnet": {
//!       "rpc": [{ "http": "https://toncenter.com/api/v2/jsonRPC", "rateLimit": 10 }],
//!       "signers": ["$TON_FACILITATOR_ADDRESS"]
//!     }
//!   },
//!   "schemes": [
//!     { "id": "v2-ton-exact", "chains": "ton:*" },
//!     { "id": "v2-tron-exact", "chains": "tron:{mainnet,nile}", "enabled": false }
//!   ],
//!   "settlement": { "confirmationTimeoutSeconds": 60, "pollIntervalMillis": 1000 },
//!   "replayCache": { "enabled": true, "ttlSeconds": 3600, "maxEntries": 10000 },
//!   "dedupLocks": true
//! }
//! ```

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use t402_types::chain::{ChainId, ChainIdPattern};
use t402_types::config::{LiteralOrEnv, RpcConfig};
use t402_types::errors::T402ErrorCode;

#[derive(Parser, Debug)]
#[command(name = "t402-facilitator")]
#[command(about = "t402 payment facilitator")]
pub struct CliArgs {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "CONFIG", default_value = "config.json")]
    pub config: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Can not read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    pub fn code(&self) -> T402ErrorCode {
        T402ErrorCode::Internal
    }

    pub fn is_retryable(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitatorConfig {
    #[serde(default)]
    pub chains: HashMap<ChainId, ChainConfig>,
    #[serde(default)]
    pub schemes: Vec<SchemeConfig>,
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub replay_cache: ReplayCacheConfig,
    #[serde(default = "config_defaults::enabled")]
    pub dedup_locks: bool,
}

impl Default for FacilitatorConfig {
    fn default() -> Self {
        Self {
            chains: HashMap::new(),
            schemes: Vec::new(),
            settlement: SettlementConfig::default(),
            replay_cache: ReplayCacheConfig::default(),
            dedup_locks: config_defaults::enabled(),
        }
    }
}

/// Connection data for one chain. Transports are built from this outside the
/// facilitator and injected as `ChainRpc` providers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    #[serde(default)]
    pub rpc: Vec<RpcConfig>,
    #[serde(default)]
    pub signers: Vec<LiteralOrEnv<String>>,
}

impl ChainConfig {
    pub fn signer_addresses(&self) -> Vec<String> {
        self.signers.iter().map(|s| s.inner().clone()).collect()
    }
}

/// Enables a scheme implementation, identified by `v<version>-<namespace>-<scheme>`,
/// on a set of chains.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemeConfig {
    pub id: String,
    pub chains: ChainIdPattern,
    #[serde(default = "config_defaults::enabled")]
    pub enabled: bool,
    /// Scheme-specific settings, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementConfig {
    #[serde(default = "config_defaults::confirmation_timeout_seconds")]
    pub confirmation_timeout_seconds: u64,
    #[serde(default = "config_defaults::poll_interval_millis")]
    pub poll_interval_millis: u64,
}

impl SettlementConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_millis)
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout_seconds: config_defaults::confirmation_timeout_seconds(),
            poll_interval_millis: config_defaults::poll_interval_millis(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayCacheConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "config_defaults::replay_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "config_defaults::replay_max_entries")]
    pub max_entries: usize,
}

impl ReplayCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Default for ReplayCacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_seconds: config_defaults::replay_ttl_seconds(),
            max_entries: config_defaults::replay_max_entries(),
        }
    }
}

mod config_defaults {
    pub fn enabled() -> bool {
        true
    }

    pub fn confirmation_timeout_seconds() -> u64 {
        60
    }

    pub fn poll_interval_millis() -> u64 {
        1000
    }

    pub fn replay_ttl_seconds() -> u64 {
        3600
    }

    pub fn replay_max_entries() -> usize {
        10_000
    }
}

impl FacilitatorConfig {
    /// Reads `.env`, parses the command line and loads the file it names.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv()
            && !e.not_found()
        {
            tracing::warn!(error = %e, "Can not read .env file");
        }
        let cli = CliArgs::parse();
        Self::from_path(&cli.config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn chain(&self, chain_id: &ChainId) -> Option<&ChainConfig> {
        self.chains.get(chain_id)
    }

    pub fn enabled_schemes(&self) -> impl Iterator<Item = &SchemeConfig> {
        self.schemes.iter().filter(|scheme| scheme.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = FacilitatorConfig::from_json_str("{}").unwrap();
        assert!(config.chains.is_empty());
        assert!(config.schemes.is_empty());
        assert_eq!(config.settlement.confirmation_timeout(), Duration::from_secs(60));
        assert_eq!(config.settlement.poll_interval(), Duration::from_millis(1000));
        assert!(!config.replay_cache.enabled);
        assert_eq!(config.replay_cache.ttl(), Duration::from_secs(3600));
        assert_eq!(config.replay_cache.max_entries, 10_000);
        assert!(config.dedup_locks);
    }

    #[test]
    fn test_full_config() {
        let json = r#"{
            "chains": {
                "tron:nile": {
                    "rpc": [{ "http": "https://nile.trongrid.io/jsonrpc", "rateLimit": 5 }],
                    "signers": ["TJRabPrwbZy45sbavfcjinPJC18kjpRTv8"]
                }
            },
            "schemes": [
                { "id": "v2-tron-exact", "chains": "tron:*" },
                { "id": "v2-ton-exact", "chains": "ton:{mainnet,testnet}", "enabled": false }
            ],
            "settlement": { "confirmationTimeoutSeconds": 90 },
            "replayCache": { "enabled": true, "maxEntries": 5 },
            "dedupLocks": false
        }"#;
        let config = FacilitatorConfig::from_json_str(json).unwrap();

        let nile = config.chain(&ChainId::new("tron", "nile")).unwrap();
        assert_eq!(nile.rpc[0].rate_limit, Some(5));
        assert_eq!(nile.signer_addresses(), vec!["TJRabPrwbZy45sbavfcjinPJC18kjpRTv8"]);

        let enabled: Vec<&str> = config.enabled_schemes().map(|s| s.id.as_str()).collect();
        assert_eq!(enabled, vec!["v2-tron-exact"]);
        assert_eq!(config.schemes[1].chains, ChainIdPattern::set("ton", ["mainnet", "testnet"]));

        assert_eq!(config.settlement.confirmation_timeout_seconds, 90);
        assert_eq!(config.settlement.poll_interval_millis, 1000);
        assert!(config.replay_cache.enabled);
        assert_eq!(config.replay_cache.ttl_seconds, 3600);
        assert_eq!(config.replay_cache.max_entries, 5);
        assert!(!config.dedup_locks);
    }

    #[test]
    fn test_bad_json_is_an_error() {
        let err = FacilitatorConfig::from_json_str(r#"{ "schemes": [{ "id": 1 }] }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_missing_file() {
        let err = FacilitatorConfig::from_path(Path::new("/nonexistent/t402.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
