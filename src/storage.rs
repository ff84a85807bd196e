//! Storage Module
//!
//! The pluggable backend contract consumed by the response cache, the
//! captured-response value it stores, and the default in-memory binding.

use std::time::{Duration, SystemTime};

use axum::http::header::CONTENT_TYPE;
use axum::http::response;
use bytes::Bytes;

use crate::store::{MemoryStore, Ttl};

const FALLBACK_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

// == Cached Response ==
/// A captured HTTP response held as a cache value.
///
/// Immutable once stored; destroyed by expiration or explicit invalidation.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    /// Status code of the original response
    pub status: u16,
    /// Raw body bytes, an owned copy of what was streamed downstream
    pub body: Bytes,
    /// Captured headers, present only when header storage is enabled
    pub headers: Option<Vec<(String, String)>>,
    /// Content type resolved once at capture time
    pub content_type: String,
    /// Absolute expiry, None = never expires
    pub expires_at: Option<SystemTime>,
    /// Capture timestamp
    pub created_at: SystemTime,
    /// Recorded for a future eviction policy; not consulted today
    pub last_accessed: SystemTime,
}

impl CachedResponse {
    // == Capture ==
    /// Snapshots a response at capture time.
    ///
    /// Content type comes from the explicit header when present, falling
    /// back to `text/plain; charset=utf-8`. A zero TTL stores the entry
    /// without an expiry.
    pub fn capture(
        parts: &response::Parts,
        body: Bytes,
        store_headers: bool,
        ttl: Duration,
    ) -> Self {
        let now = SystemTime::now();

        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_string();

        let headers = store_headers.then(|| {
            parts
                .headers
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.to_string(), v.to_string()))
                })
                .collect()
        });

        Self {
            status: parts.status.as_u16(),
            body,
            headers,
            content_type,
            expires_at: (!ttl.is_zero()).then(|| now + ttl),
            created_at: now,
            last_accessed: now,
        }
    }

    /// Whether the snapshot's own deadline has passed.
    ///
    /// Redundant with a lazily expiring backend; authoritative for backends
    /// that hand back stale entries.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        matches!(self.expires_at, Some(at) if now > at)
    }
}

// == Storage ==
/// Backend contract for the response cache.
///
/// The in-memory sharded store is the default implementation; any conforming
/// backend is a drop-in replacement supplied via
/// [`ResponseCache::with_storage`](crate::middleware::ResponseCache::with_storage).
pub trait Storage: Send + Sync + 'static {
    /// Looks up a captured response by key.
    fn get(&self, key: &str) -> Option<CachedResponse>;

    /// Inserts or overwrites a captured response.
    fn set(&self, key: &str, response: CachedResponse, ttl: Ttl);

    /// Removes the key if present; a no-op otherwise.
    fn delete(&self, key: &str);

    /// Backend label reported in the source header on cache hits.
    fn backend(&self) -> &'static str;
}

impl Storage for MemoryStore<CachedResponse> {
    fn get(&self, key: &str) -> Option<CachedResponse> {
        MemoryStore::get(self, key)
    }

    fn set(&self, key: &str, response: CachedResponse, ttl: Ttl) {
        MemoryStore::set(self, key, response, ttl)
    }

    fn delete(&self, key: &str) {
        MemoryStore::delete(self, key)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Response, StatusCode};

    fn parts_with_content_type(content_type: Option<&str>) -> response::Parts {
        let mut builder = Response::builder().status(StatusCode::OK);
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn test_capture_resolves_content_type_from_header() {
        let parts = parts_with_content_type(Some("application/json"));
        let entry = CachedResponse::capture(
            &parts,
            Bytes::from_static(b"{}"),
            true,
            Duration::from_secs(60),
        );

        assert_eq!(entry.content_type, "application/json");
        assert_eq!(entry.status, 200);
        assert_eq!(entry.body, Bytes::from_static(b"{}"));
    }

    #[test]
    fn test_capture_falls_back_to_text_plain() {
        let parts = parts_with_content_type(None);
        let entry =
            CachedResponse::capture(&parts, Bytes::new(), true, Duration::from_secs(60));

        assert_eq!(entry.content_type, FALLBACK_CONTENT_TYPE);
    }

    #[test]
    fn test_capture_header_storage_flag() {
        let parts = parts_with_content_type(Some("text/html"));

        let with = CachedResponse::capture(&parts, Bytes::new(), true, Duration::from_secs(1));
        assert!(with.headers.is_some());

        let without = CachedResponse::capture(&parts, Bytes::new(), false, Duration::from_secs(1));
        assert!(without.headers.is_none());
    }

    #[test]
    fn test_capture_zero_ttl_never_expires() {
        let parts = parts_with_content_type(None);
        let entry = CachedResponse::capture(&parts, Bytes::new(), true, Duration::ZERO);

        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired(SystemTime::now() + Duration::from_secs(3600)));
    }

    #[test]
    fn test_is_expired_after_deadline() {
        let parts = parts_with_content_type(None);
        let entry =
            CachedResponse::capture(&parts, Bytes::new(), true, Duration::from_millis(10));

        assert!(!entry.is_expired(entry.created_at));
        assert!(entry.is_expired(entry.created_at + Duration::from_secs(1)));
    }
}
