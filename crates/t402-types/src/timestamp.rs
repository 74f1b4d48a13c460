//! Unix timestamps for authorization validity windows.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::ops::Add;
use std::time::SystemTime;

/// A point in time since the Unix epoch, kept at millisecond precision.
///
/// On the wire it is whole seconds, serialized as a stringified integer since JSON
/// numbers lose precision past 2^53. Deserialization also accepts a plain number,
/// which several wallets emit. TRON expirations arrive in milliseconds through
/// [`UnixTimestamp::from_millis`] and compare without rounding.
///
/// ```
/// use t402_types::timestamp::UnixTimestamp;
///
/// let expires = UnixTimestamp::from_secs(1_700_000_000) + 3600;
/// assert_eq!(expires.as_secs(), 1_700_003_600);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Ord, Eq, Hash)]
pub struct UnixTimestamp(u64);

impl Serialize for UnixTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_secs().to_string())
    }
}

impl<'de> Deserialize<'de> for UnixTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Number(u64),
            Text(String),
        }
        match Wire::deserialize(deserializer)? {
            Wire::Number(ts) => Ok(UnixTimestamp::from_secs(ts)),
            Wire::Text(s) => s.parse::<u64>().map(UnixTimestamp::from_secs).map_err(|_| {
                serde::de::Error::custom("timestamp must be a non-negative integer")
            }),
        }
    }
}

impl Display for UnixTimestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_secs())
    }
}

impl Add<u64> for UnixTimestamp {
    type Output = Self;

    /// Adds whole seconds.
    fn add(self, rhs: u64) -> Self::Output {
        UnixTimestamp(self.0.saturating_add(rhs.saturating_mul(1000)))
    }
}

impl UnixTimestamp {
    pub fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Current system time. A clock set before the epoch reads as zero.
    pub fn now() -> Self {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        Self(now)
    }

    /// Whole seconds, rounded down.
    pub fn as_secs(&self) -> u64 {
        self.0 / 1000
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Next whole second at or after this instant. Deadlines that travel as
    /// seconds are rounded this way so they never land before the intended time.
    pub fn ceil_secs(self) -> Self {
        Self(self.0.div_ceil(1000).saturating_mul(1000))
    }
}
