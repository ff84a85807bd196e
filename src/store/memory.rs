//! Memory Store Module
//!
//! The sharded in-memory TTL engine: routes string keys to one of eight
//! independently locked shards and exposes the get/set/delete contract plus
//! the sweep pass used by the background task.

use std::time::{Duration, Instant};

use super::entry::Ttl;
use super::shard::Shard;
use super::SHARD_COUNT;

// == Memory Store ==
/// Fixed-shard in-memory store with time-based expiration.
///
/// Values are cloned out on `get`; wrap large payloads in cheaply clonable
/// containers (`Bytes`, `Arc`) as the response cache does.
pub struct MemoryStore<V> {
    shards: [Shard<V>; SHARD_COUNT],
    /// TTL substituted for `Ttl::Default`; zero means entries never expire.
    default_ttl: Duration,
}

impl<V: Clone> MemoryStore<V> {
    // == Constructor ==
    /// Creates a store with the given default TTL.
    ///
    /// The store itself never spawns tasks; pair it with
    /// [`spawn_sweep_task`](crate::tasks::spawn_sweep_task) to reclaim
    /// expired entries that are never read again.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            shards: std::array::from_fn(|_| Shard::new()),
            default_ttl,
        }
    }

    fn shard(&self, hash: u32) -> &Shard<V> {
        &self.shards[hash as usize % SHARD_COUNT]
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Expired entries are deleted on observation and reported as absent; a
    /// successful lookup is never returned for an expired entry.
    pub fn get(&self, key: &str) -> Option<V> {
        let hash = hash_key(key);
        self.shard(hash).get(hash, Instant::now())
    }

    // == Set ==
    /// Inserts or overwrites a value.
    ///
    /// Never fails and blocks only on the owning shard's write lock. The
    /// write is also recorded in that shard's ring buffer for the sweep.
    pub fn set(&self, key: &str, value: V, ttl: Ttl) {
        let now = Instant::now();
        let expires_at = match ttl {
            Ttl::Default => checked_deadline(now, self.default_ttl),
            Ttl::Never => None,
            Ttl::After(duration) => checked_deadline(now, duration),
        };

        let hash = hash_key(key);
        self.shard(hash).insert(hash, value, expires_at);
    }

    // == Delete ==
    /// Removes the key if present; a no-op otherwise.
    pub fn delete(&self, key: &str) {
        let hash = hash_key(key);
        self.shard(hash).remove(hash);
    }

    // == Sweep ==
    /// Runs one expiration sweep over every shard's ring buffer and returns
    /// the number of entries reclaimed.
    ///
    /// Correctness never depends on this: `get` lazily expires entries on
    /// read. The sweep only bounds the growth of expired keys nobody reads.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        self.shards.iter().map(|shard| shard.sweep(now)).sum()
    }

    // == Length ==
    /// Returns the current number of entries across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(Shard::len).sum()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// TTL substituted for `Ttl::Default`.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

/// Deadline for a duration, treating zero as "never expires".
fn checked_deadline(now: Instant, ttl: Duration) -> Option<Instant> {
    (!ttl.is_zero()).then(|| now + ttl)
}

// == Key Routing ==
/// 32-bit FNV-1a over the key bytes.
///
/// Fast and uniformly distributed, deliberately not collision resistant.
fn hash_key(key: &str) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for byte in key.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}
