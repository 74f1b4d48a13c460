//! CAIP-2 chain identifiers and the patterns used to match them.
//!
//! A chain id is `namespace:reference`, e.g. `eip155:8453` for Base or
//! `ton:mainnet`. Equality is case-normalized per family: the namespace is always
//! lowercase, and so is the reference, except for families whose references are
//! case-sensitive encodings (Solana genesis hashes are base58).
//!
//! ```
//! use t402_types::chain::ChainId;
//!
//! let base: ChainId = "EIP155:8453".parse().unwrap();
//! assert_eq!(base.to_string(), "eip155:8453");
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::networks;

/// Namespaces whose references must keep their original case.
const CASE_SENSITIVE_NAMESPACES: &[&str] = &["solana"];

/// A CAIP-2 blockchain identifier.
///
/// Serializes to and from the colon-separated string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainId {
    /// The chain family, e.g. `eip155`, `ton`, `tron`, `solana`.
    pub namespace: String,
    /// The chain within the family, e.g. `8453` or `mainnet`.
    pub reference: String,
}

impl ChainId {
    /// Creates a chain id, normalizing case for the family.
    pub fn new<N: Into<String>, R: Into<String>>(namespace: N, reference: R) -> Self {
        let namespace = namespace.into().to_ascii_lowercase();
        let reference = reference.into();
        let reference = if CASE_SENSITIVE_NAMESPACES.contains(&namespace.as_str()) {
            reference
        } else {
            reference.to_ascii_lowercase()
        };
        Self {
            namespace,
            reference,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Looks up a chain id by a well-known network name such as `base` or `tron`.
    pub fn from_network_name(network_name: &str) -> Option<Self> {
        networks::chain_id_by_network_name(network_name).cloned()
    }

    /// Reverse of [`ChainId::from_network_name`].
    pub fn as_network_name(&self) -> Option<&'static str> {
        networks::network_name_by_chain_id(self)
    }

    /// The `namespace:*` key used for family-wide lookups.
    pub fn wildcard_key(&self) -> String {
        format!("{}:*", self.namespace)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.reference)
    }
}

impl From<ChainId> for String {
    fn from(value: ChainId) -> Self {
        value.to_string()
    }
}

/// Returned when a string is not `namespace:reference`.
#[derive(Debug, thiserror::Error)]
#[error("Invalid chain id format {0}")]
pub struct ChainIdFormatError(String);

impl FromStr for ChainId {
    type Err = ChainIdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, reference) = s.split_once(':').ok_or(ChainIdFormatError(s.into()))?;
        if namespace.is_empty() || reference.is_empty() {
            return Err(ChainIdFormatError(s.into()));
        }
        Ok(ChainId::new(namespace, reference))
    }
}

impl Serialize for ChainId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ChainId::from_str(&s).map_err(de::Error::custom)
    }
}

/// A pattern over chain ids, used as the network half of a registration key.
///
/// - `eip155:*` matches every chain of the family
/// - `eip155:8453` matches one chain
/// - `eip155:{1,8453}` matches any chain of the set
///
/// When several patterns match the same chain the most specific one wins:
/// exact, then set, then wildcard. See [`ChainIdPattern::specificity`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChainIdPattern {
    Wildcard {
        namespace: String,
    },
    Exact {
        namespace: String,
        reference: String,
    },
    Set {
        namespace: String,
        references: BTreeSet<String>,
    },
}

impl ChainIdPattern {
    pub fn wildcard<S: Into<String>>(namespace: S) -> Self {
        Self::Wildcard {
            namespace: namespace.into().to_ascii_lowercase(),
        }
    }

    pub fn exact<N: Into<String>, R: Into<String>>(namespace: N, reference: R) -> Self {
        let chain_id = ChainId::new(namespace, reference);
        Self::Exact {
            namespace: chain_id.namespace,
            reference: chain_id.reference,
        }
    }

    pub fn set<N: Into<String>, I, R>(namespace: N, references: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        let namespace = namespace.into().to_ascii_lowercase();
        let references = references
            .into_iter()
            .map(|r| ChainId::new(namespace.as_str(), r).reference)
            .collect();
        Self::Set {
            namespace,
            references,
        }
    }

    /// Check if a `ChainId` matches this pattern.
    pub fn matches(&self, chain_id: &ChainId) -> bool {
        match self {
            ChainIdPattern::Wildcard { namespace } => chain_id.namespace == *namespace,
            ChainIdPattern::Exact {
                namespace,
                reference,
            } => chain_id.namespace == *namespace && chain_id.reference == *reference,
            ChainIdPattern::Set {
                namespace,
                references,
            } => chain_id.namespace == *namespace && references.contains(&chain_id.reference),
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            ChainIdPattern::Wildcard { namespace } => namespace,
            ChainIdPattern::Exact { namespace, .. } => namespace,
            ChainIdPattern::Set { namespace, .. } => namespace,
        }
    }

    /// Higher is more specific. Exact is 2, set is 1, wildcard is 0.
    pub fn specificity(&self) -> u8 {
        match self {
            ChainIdPattern::Exact { .. } => 2,
            ChainIdPattern::Set { .. } => 1,
            ChainIdPattern::Wildcard { .. } => 0,
        }
    }

    /// Concrete chain ids named by this pattern. Empty for a wildcard.
    pub fn chain_ids(&self) -> Vec<ChainId> {
        match self {
            ChainIdPattern::Wildcard { .. } => Vec::new(),
            ChainIdPattern::Exact {
                namespace,
                reference,
            } => vec![ChainId::new(namespace.as_str(), reference.as_str())],
            ChainIdPattern::Set {
                namespace,
                references,
            } => references
                .iter()
                .map(|r| ChainId::new(namespace.as_str(), r.as_str()))
                .collect(),
        }
    }
}

impl fmt::Display for ChainIdPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainIdPattern::Wildcard { namespace } => write!(f, "{}:*", namespace),
            ChainIdPattern::Exact {
                namespace,
                reference,
            } => write!(f, "{}:{}", namespace, reference),
            ChainIdPattern::Set {
                namespace,
                references,
            } => {
                let refs: Vec<&str> = references.iter().map(|s| s.as_ref()).collect();
                write!(f, "{}:{{{}}}", namespace, refs.join(","))
            }
        }
    }
}

impl FromStr for ChainIdPattern {
    type Err = ChainIdFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, rest) = s.split_once(':').ok_or(ChainIdFormatError(s.into()))?;
        if namespace.is_empty() || rest.is_empty() {
            return Err(ChainIdFormatError(s.into()));
        }
        if rest == "*" {
            return Ok(ChainIdPattern::wildcard(namespace));
        }
        if let Some(inner) = rest.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
            let items: Vec<&str> = inner.split(',').map(str::trim).collect();
            if items.iter().any(|item| item.is_empty()) {
                return Err(ChainIdFormatError(s.into()));
            }
            return Ok(ChainIdPattern::set(namespace, items));
        }
        Ok(ChainIdPattern::exact(namespace, rest))
    }
}

impl Serialize for ChainIdPattern {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ChainIdPattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ChainIdPattern::from_str(&s).map_err(de::Error::custom)
    }
}

impl From<ChainId> for ChainIdPattern {
    fn from(chain_id: ChainId) -> Self {
        ChainIdPattern::Exact {
            namespace: chain_id.namespace,
            reference: chain_id.reference,
        }
    }
}
