//! Local fast-reject state for settlement.
//!
//! Neither structure is a source of truth for replay protection; the chain is.
//! [`ReplayGuard`] remembers payloads this process already settled so a resubmission
//! is answered without touching the chain. [`DedupLocks`] serializes concurrent
//! settles of one payload so only the first one pays for the RPC round trips.

use alloy_primitives::{B256, keccak256};
use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

/// keccak-256 of the canonical JSON encoding of a payment payload.
///
/// JSON objects are re-serialized with sorted keys, so two encodings of the same
/// payload differing only in key order share a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PayloadFingerprint(B256);

impl PayloadFingerprint {
    pub fn of<T: Serialize>(payload: &T) -> Result<Self, serde_json::Error> {
        let canonical = serde_json::to_vec(&serde_json::to_value(payload)?)?;
        Ok(Self(keccak256(canonical)))
    }
}

impl fmt::Display for PayloadFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// TTL-bounded set of settled payload fingerprints.
#[derive(Debug)]
pub struct ReplayGuard {
    settled: DashMap<PayloadFingerprint, Instant>,
    ttl: Duration,
    max_entries: usize,
}

impl ReplayGuard {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            settled: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Whether the fingerprint was settled within the TTL. Expired entries are dropped.
    pub fn contains(&self, fingerprint: &PayloadFingerprint) -> bool {
        let now = Instant::now();
        let expired = match self.settled.get(fingerprint) {
            None => return false,
            Some(recorded_at) => now.duration_since(*recorded_at) >= self.ttl,
        };
        if expired {
            self.settled.remove(fingerprint);
        }
        !expired
    }

    pub fn record(&self, fingerprint: PayloadFingerprint) {
        if self.settled.len() >= self.max_entries && !self.settled.contains_key(&fingerprint) {
            self.prune();
            while self.settled.len() >= self.max_entries {
                let Some(oldest) = self
                    .settled
                    .iter()
                    .min_by_key(|entry| *entry.value())
                    .map(|entry| *entry.key())
                else {
                    break;
                };
                self.settled.remove(&oldest);
            }
        }
        self.settled.insert(fingerprint, Instant::now());
    }

    /// Drops every expired entry.
    pub fn prune(&self) {
        let now = Instant::now();
        self.settled
            .retain(|_, recorded_at| now.duration_since(*recorded_at) < self.ttl);
    }

    pub fn len(&self) -> usize {
        self.settled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settled.is_empty()
    }
}

/// Per-fingerprint async locks.
#[derive(Debug, Default)]
pub struct DedupLocks {
    locks: DashMap<PayloadFingerprint, Arc<Mutex<()>>>,
}

impl DedupLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other holder of `fingerprint` remains.
    pub async fn acquire(&self, fingerprint: PayloadFingerprint) -> DedupGuard<'_> {
        let lock = self
            .locks
            .entry(fingerprint)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        DedupGuard {
            locks: self,
            fingerprint,
            _guard: guard,
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held while settling; the table entry goes away with the last holder.
pub struct DedupGuard<'a> {
    locks: &'a DedupLocks,
    fingerprint: PayloadFingerprint,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for DedupGuard<'_> {
    fn drop(&mut self) {
        // One reference in the table, one in our guard: nobody else is waiting.
        self.locks
            .locks
            .remove_if(&self.fingerprint, |_, lock| Arc::strong_count(lock) <= 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fingerprint(n: u64) -> PayloadFingerprint {
        PayloadFingerprint::of(&json!({ "n": n })).unwrap()
    }

    #[test]
    fn test_fingerprint_ignores_key_order() {
        let a: serde_json::Value =
            serde_json::from_str(r#"{"payload":{"b":2,"a":1},"t402Version":2}"#).unwrap();
        let b: serde_json::Value =
            serde_json::from_str(r#"{"t402Version":2,"payload":{"a":1,"b":2}}"#).unwrap();
        assert_eq!(PayloadFingerprint::of(&a).unwrap(), PayloadFingerprint::of(&b).unwrap());
        assert_ne!(fingerprint(1), fingerprint(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let guard = ReplayGuard::new(Duration::from_secs(60), 10);
        guard.record(fingerprint(1));
        assert!(guard.contains(&fingerprint(1)));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(guard.contains(&fingerprint(1)));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!guard.contains(&fingerprint(1)));
        assert!(guard.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_oldest() {
        let guard = ReplayGuard::new(Duration::from_secs(3600), 2);
        guard.record(fingerprint(1));
        tokio::time::advance(Duration::from_secs(1)).await;
        guard.record(fingerprint(2));
        tokio::time::advance(Duration::from_secs(1)).await;
        guard.record(fingerprint(3));

        assert_eq!(guard.len(), 2);
        assert!(!guard.contains(&fingerprint(1)));
        assert!(guard.contains(&fingerprint(2)));
        assert!(guard.contains(&fingerprint(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_prefers_expired_over_eviction() {
        let guard = ReplayGuard::new(Duration::from_secs(10), 2);
        guard.record(fingerprint(1));
        tokio::time::advance(Duration::from_secs(5)).await;
        guard.record(fingerprint(2));
        tokio::time::advance(Duration::from_secs(6)).await;
        guard.record(fingerprint(3));
        assert!(guard.contains(&fingerprint(2)));
        assert!(guard.contains(&fingerprint(3)));
    }

    #[tokio::test]
    async fn test_lock_entry_removed_when_uncontended() {
        let locks = DedupLocks::new();
        {
            let _guard = locks.acquire(fingerprint(1)).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_serializes_same_fingerprint() {
        let locks = Arc::new(DedupLocks::new());
        let first = locks.acquire(fingerprint(1)).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(fingerprint(1)).await;
                Instant::now()
            })
        };
        tokio::time::sleep(Duration::from_secs(5)).await;
        let released_at = Instant::now();
        drop(first);

        let acquired_at = waiter.await.unwrap();
        assert!(acquired_at >= released_at);
        assert!(locks.is_empty());

        // A different payload is never blocked.
        let _other = locks.acquire(fingerprint(2)).await;
    }
}
