//! Cache Configuration Module
//!
//! Per-cache settings supplied once at construction, plus the cache status
//! vocabulary reported to clients.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::http::Method;

// == Header Names ==
/// Default name of the per-response cache status header.
pub const DEFAULT_STATUS_HEADER: &str = "x-cache-status";

/// Header naming the storage backend, set only on hits.
pub const SOURCE_HEADER: &str = "x-cache-source";

/// Header carrying the entry's absolute expiry (RFC3339), set only on hits.
pub const EXPIRES_HEADER: &str = "x-cache-expires-at";

// == Defaults ==
/// Default entry TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Default ceiling on cacheable body size.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024; // 1 MiB

// == Cache Status ==
/// Cache decision reported via the status header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the cache without running downstream logic
    Hit,
    /// Downstream logic ran; the response was considered for storage
    Miss,
    /// A stored entry existed but had passed its deadline
    Expired,
    /// The request explicitly dropped the stored entry
    Invalidated,
    /// The client opted out via `Cache-Control: no-cache`
    Bypass,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Expired => "EXPIRED",
            CacheStatus::Invalidated => "INVALIDATED",
            CacheStatus::Bypass => "BYPASS",
        }
    }
}

// == Hook Types ==
/// Derives the cache key for a request.
pub type KeyFn = Arc<dyn Fn(&Request) -> String + Send + Sync>;

/// Request predicate used by the skip and invalidation hooks.
pub type RequestPredicate = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// Per-request TTL override.
pub type TtlFn = Arc<dyn Fn(&Request) -> Duration + Send + Sync>;

// == Cache Config ==
/// Configuration for [`ResponseCache`](super::ResponseCache).
///
/// All fields have working defaults; construct with struct update syntax:
///
/// ```ignore
/// let config = CacheConfig {
///     default_ttl: Duration::from_secs(30),
///     ..CacheConfig::default()
/// };
/// ```
#[derive(Clone)]
pub struct CacheConfig {
    /// TTL for entries without a per-request override (default: 1 minute)
    pub default_ttl: Duration,
    /// Optional per-request TTL override
    pub ttl_for: Option<TtlFn>,
    /// Key derivation. The default uses only the request path, so distinct
    /// query strings collapse to one entry unless a custom closure
    /// incorporates them.
    pub key_for: KeyFn,
    /// Name of the status header (default: `x-cache-status`)
    pub status_header: String,
    /// Honor client `Cache-Control: no-cache` (default: true)
    pub honor_no_cache: bool,
    /// Persist response headers and replay them on hits (default: true);
    /// when disabled only the content type is restored
    pub store_headers: bool,
    /// Ceiling on cacheable body size (default: 1 MiB); larger responses
    /// are relayed but never stored
    pub max_body_bytes: usize,
    /// Methods eligible for caching (default: GET, HEAD)
    pub methods: Vec<Method>,
    /// Requests matching this predicate drop their entry and are never
    /// served from or stored into the cache
    pub invalidate_when: Option<RequestPredicate>,
    /// Requests matching this predicate pass through untouched
    pub skip_when: Option<RequestPredicate>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            ttl_for: None,
            key_for: Arc::new(path_key),
            status_header: DEFAULT_STATUS_HEADER.to_string(),
            honor_no_cache: true,
            store_headers: true,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            methods: vec![Method::GET, Method::HEAD],
            invalidate_when: None,
            skip_when: None,
        }
    }
}

// == Key Functions ==
/// Default key derivation: the request path only.
pub fn path_key(request: &Request) -> String {
    request.uri().path().to_string()
}

/// Key derivation including the full query string, for integrators whose
/// responses vary by query parameters.
pub fn path_and_query_key(request: &Request) -> String {
    request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string())
}
