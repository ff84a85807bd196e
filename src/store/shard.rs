//! Keyspace Shard Module
//!
//! One partition of the store: a hash-keyed entry map and a fixed-capacity
//! ring buffer of recent writes, both guarded by a single reader/writer lock.
//! The ring buffer only accelerates the sweep; the map is authoritative.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Instant;

use super::entry::Entry;
use super::lock::{rw_read, rw_write};
use super::RING_CAPACITY;

const SOURCE: &str = "store::shard";

// == Ring Slot ==
/// One ring buffer record: the hashed key and the expiry it was written with.
///
/// Slots can describe entries that were since overwritten or deleted; the
/// sweep re-checks the map before acting on one.
#[derive(Debug, Clone, Copy)]
struct RingSlot {
    hash: u32,
    expires_at: Option<Instant>,
}

impl RingSlot {
    const EMPTY: Self = Self {
        hash: 0,
        expires_at: None,
    };
}

struct ShardInner<V> {
    entries: HashMap<u32, Entry<V>>,
    ring: Vec<RingSlot>,
    /// Next ring write position; wraps at RING_CAPACITY.
    cursor: usize,
}

// == Shard ==
pub(super) struct Shard<V> {
    inner: RwLock<ShardInner<V>>,
}

impl<V: Clone> Shard<V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(ShardInner {
                entries: HashMap::new(),
                ring: vec![RingSlot::EMPTY; RING_CAPACITY],
                cursor: 0,
            }),
        }
    }

    // == Get ==
    /// Looks up a value by hashed key.
    ///
    /// Expired entries are removed on observation and reported as absent;
    /// the read lock covers the fast path and is escalated to the write lock
    /// only to perform that lazy deletion.
    pub fn get(&self, hash: u32, now: Instant) -> Option<V> {
        {
            let inner = rw_read(&self.inner, SOURCE, "get");
            match inner.entries.get(&hash) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        // Lazy expiration: re-check under the write lock, a concurrent set
        // may have replaced the entry since the read lock was released.
        let mut inner = rw_write(&self.inner, SOURCE, "get.expire");
        if let Some(entry) = inner.entries.get(&hash) {
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
        }
        inner.entries.remove(&hash);
        None
    }

    // == Insert ==
    /// Inserts or overwrites the entry and records the write in the ring
    /// buffer, overwriting the oldest record once the buffer wraps.
    pub fn insert(&self, hash: u32, value: V, expires_at: Option<Instant>) {
        let mut inner = rw_write(&self.inner, SOURCE, "insert");
        inner.entries.insert(hash, Entry::new(value, expires_at));

        let cursor = inner.cursor;
        inner.ring[cursor] = RingSlot { hash, expires_at };
        inner.cursor = (cursor + 1) % RING_CAPACITY;
    }

    // == Remove ==
    pub fn remove(&self, hash: u32) {
        rw_write(&self.inner, SOURCE, "remove").entries.remove(&hash);
    }

    // == Sweep ==
    /// Scans the full ring buffer and reclaims expired map entries.
    ///
    /// A ring record is only a hint: the key may have been overwritten with a
    /// later expiry or deleted outright, so the map entry is removed only if
    /// it is expired itself. Acted-on slots have their expiry cleared so the
    /// next pass skips them.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut inner = rw_write(&self.inner, SOURCE, "sweep");
        let mut removed = 0;

        for i in 0..RING_CAPACITY {
            let slot = inner.ring[i];
            let Some(recorded_expiry) = slot.expires_at else {
                continue;
            };
            if now <= recorded_expiry {
                continue;
            }

            let expired_in_map = inner
                .entries
                .get(&slot.hash)
                .is_some_and(|entry| entry.is_expired(now));
            if expired_in_map {
                inner.entries.remove(&slot.hash);
                removed += 1;
            }
            inner.ring[i].expires_at = None;
        }

        removed
    }

    // == Length ==
    pub fn len(&self) -> usize {
        rw_read(&self.inner, SOURCE, "len").entries.len()
    }
}
