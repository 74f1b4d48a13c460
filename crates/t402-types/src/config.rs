//! Configuration helpers shared by t402 components.
//!
//! [`LiteralOrEnv`] lets any string-parsed config value be written either
//! literally or as a reference to an environment variable:
//!
//! ```json
//! {
//!   "http": "https://rpc.ankr.com/eth",
//!   "signer": "$EVM_FACILITATOR_ADDRESS",
//!   "apiKey": "${TONCENTER_API_KEY}"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::str::FromStr;
use url::Url;

/// One RPC endpoint of a chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RpcConfig {
    pub http: Url,
    /// Requests per second, if the endpoint is rate limited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
}

/// A value that is either a literal or resolved from `$VAR` / `${VAR}` at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn from_literal(value: T) -> Self {
        Self(value)
    }

    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }

    /// Returns the variable name when `s` is `$VAR` or `${VAR}`.
    fn parse_env_var_syntax(s: &str) -> Option<&str> {
        if let Some(braced) = s.strip_prefix("${").and_then(|r| r.strip_suffix('}')) {
            return (!braced.is_empty()).then_some(braced);
        }
        let name = s.strip_prefix('$')?;
        let valid = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_');
        valid.then_some(name)
    }
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let value = match Self::parse_env_var_syntax(&s) {
            Some(var_name) => std::env::var(var_name).map_err(|_| {
                serde::de::Error::custom(format!(
                    "Environment variable '{}' not found (referenced as '{}')",
                    var_name, s
                ))
            })?,
            None => s,
        };
        let parsed = value
            .parse::<T>()
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse value: {}", e)))?;
        Ok(LiteralOrEnv(parsed))
    }
}

impl<T: Serialize> Serialize for LiteralOrEnv<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}
