//! Store Entry Module
//!
//! Defines the per-key entry wrapper and the TTL request type.

use std::time::{Duration, Instant};

// == Ttl ==
/// Time-to-live requested for a single `set` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Substitute the store's configured default TTL.
    Default,
    /// Store without an expiration.
    Never,
    /// Expire the given duration from now. A zero duration means never.
    After(Duration),
}

// == Entry ==
/// A stored value together with its expiration instant.
#[derive(Debug, Clone)]
pub(super) struct Entry<V> {
    /// The stored value
    pub value: V,
    /// Expiration instant, None = no expiration
    pub expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    pub fn new(value: V, expires_at: Option<Instant>) -> Self {
        Self { value, expires_at }
    }

    /// An entry is expired strictly after its deadline; an entry observed
    /// exactly at `expires_at` is still visible.
    pub fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if now > at)
    }
}
