//! Response Cache Layer Module
//!
//! The request-path orchestrator: decides hit/miss/bypass/invalidate per
//! request and mediates between the pipeline and the storage backend. On a
//! hit the captured response is replayed without invoking downstream
//! handlers; on a miss the downstream response is captured, stored when it
//! fits, and relayed unchanged.

use std::sync::Arc;
use std::time::SystemTime;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{HeaderName, HeaderValue, CACHE_CONTROL};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use super::config::{CacheConfig, CacheStatus, EXPIRES_HEADER, SOURCE_HEADER};
use crate::error::CacheError;
use crate::storage::{CachedResponse, Storage};
use crate::store::{CacheStats, MemoryStore, StatsSnapshot, Ttl};
use crate::tasks::{spawn_sweep_task, SweepGuard};

// == Response Cache ==
/// Shared middleware state: configuration, storage backend and counters.
///
/// Cheap to clone; attach with
/// `axum::middleware::from_fn_with_state(cache, response_cache_layer)`.
#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    config: CacheConfig,
    status_header: HeaderName,
    storage: Arc<dyn Storage>,
    stats: CacheStats,
    /// Aborts the background sweep when the last clone drops.
    _sweep: Option<SweepGuard>,
}

impl ResponseCache {
    // == Constructor ==
    /// Builds a cache over the default in-memory sharded store.
    ///
    /// When the default TTL is positive this also spawns the background
    /// expiration sweep at half that interval, so it must be called inside a
    /// tokio runtime. The sweep stops when the last clone of the cache is
    /// dropped.
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        let store = Arc::new(MemoryStore::<CachedResponse>::new(config.default_ttl));

        let sweep = if config.default_ttl.is_zero() {
            None
        } else {
            let handle = spawn_sweep_task(Arc::clone(&store), config.default_ttl / 2);
            Some(SweepGuard::new(handle))
        };

        Self::assemble(config, store, sweep)
    }

    /// Builds a cache over a caller-supplied backend.
    ///
    /// No sweep is spawned; the backend owns its own expiry policy.
    pub fn with_storage(
        config: CacheConfig,
        storage: Arc<dyn Storage>,
    ) -> Result<Self, CacheError> {
        Self::assemble(config, storage, None)
    }

    fn assemble(
        config: CacheConfig,
        storage: Arc<dyn Storage>,
        sweep: Option<SweepGuard>,
    ) -> Result<Self, CacheError> {
        let status_header = config
            .status_header
            .parse::<HeaderName>()
            .map_err(|_| CacheError::InvalidStatusHeader(config.status_header.clone()))?;

        Ok(Self {
            inner: Arc::new(CacheInner {
                config,
                status_header,
                storage,
                stats: CacheStats::new(),
                _sweep: sweep,
            }),
        })
    }

    // == Stats ==
    /// Point-in-time outcome counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }
}

// == Middleware ==
/// Axum middleware entry point for the response cache.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn response_cache_layer(
    State(cache): State<ResponseCache>,
    request: Request,
    next: Next,
) -> Response {
    let inner = &cache.inner;
    let config = &inner.config;

    // Integrator skip hook and non-cacheable methods pass through with no
    // status header and no store interaction.
    if let Some(skip_when) = &config.skip_when {
        if skip_when(&request) {
            return next.run(request).await;
        }
    }
    if !config.methods.contains(request.method()) {
        return next.run(request).await;
    }

    let key = (config.key_for)(&request);

    // Explicit invalidation: drop the entry and run downstream. The
    // invalidating request is never served from cache and its own response
    // is not stored.
    if let Some(invalidate_when) = &config.invalidate_when {
        if invalidate_when(&request) {
            inner.storage.delete(&key);
            inner.stats.record_invalidated();
            debug!(cache_key = %key, outcome = "invalidated", "cache entry invalidated");

            let mut response = next.run(request).await;
            set_status_header(&mut response, &inner.status_header, CacheStatus::Invalidated);
            return response;
        }
    }

    // Client opt-out: never consult or populate.
    if config.honor_no_cache && wants_no_cache(&request) {
        inner.stats.record_bypass();
        debug!(cache_key = %key, outcome = "bypass", "client requested no-cache");

        let mut response = next.run(request).await;
        set_status_header(&mut response, &inner.status_header, CacheStatus::Bypass);
        return response;
    }

    if let Some(entry) = inner.storage.get(&key) {
        // Backends without lazy expiry can still hand back stale entries;
        // drop them here and fall through to the handler uncached.
        if entry.is_expired(SystemTime::now()) {
            inner.storage.delete(&key);
            inner.stats.record_expired();
            debug!(cache_key = %key, outcome = "expired", "stale entry dropped");

            let mut response = next.run(request).await;
            set_status_header(&mut response, &inner.status_header, CacheStatus::Expired);
            return response;
        }

        inner.stats.record_hit();
        debug!(cache_key = %key, outcome = "hit", "serving cached response");
        return replay(&entry, inner);
    }

    // Miss: run the handler, capture the full response, store it when it
    // fits, and relay it unchanged.
    inner.stats.record_miss();
    debug!(cache_key = %key, outcome = "miss", "executing handler");

    let ttl_override = config.ttl_for.as_ref().map(|ttl_for| ttl_for(&request));

    let response = next.run(request).await;
    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            // The body failed mid-stream; there is nothing sane to relay or
            // store.
            debug!(cache_key = %key, %error, "response body collection failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if bytes.len() <= config.max_body_bytes {
        let ttl = ttl_override.unwrap_or(config.default_ttl);
        let entry = CachedResponse::capture(&parts, bytes.clone(), config.store_headers, ttl);
        let store_ttl = if ttl.is_zero() {
            Ttl::Never
        } else {
            Ttl::After(ttl)
        };
        inner.storage.set(&key, entry, store_ttl);
    } else {
        debug!(
            cache_key = %key,
            size = bytes.len(),
            max = config.max_body_bytes,
            "response exceeds cache ceiling, not stored"
        );
    }

    parts.headers.insert(
        inner.status_header.clone(),
        HeaderValue::from_static(CacheStatus::Miss.as_str()),
    );
    Response::from_parts(parts, Body::from(bytes))
}

// == Helpers ==
fn wants_no_cache(request: &Request) -> bool {
    request
        .headers()
        .get(CACHE_CONTROL)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().contains("no-cache"))
}

fn set_status_header(response: &mut Response, header: &HeaderName, status: CacheStatus) {
    response
        .headers_mut()
        .insert(header.clone(), HeaderValue::from_static(status.as_str()));
}

/// Rebuilds a response from a captured entry.
///
/// Restores every captured header when header storage was enabled, otherwise
/// only the content type, then reports the hit via the status, source and
/// expiry headers.
fn replay(entry: &CachedResponse, inner: &CacheInner) -> Response {
    let mut builder = Response::builder().status(entry.status);

    if let Some(headers) = &entry.headers {
        for (name, value) in headers {
            if let Ok(header_value) = HeaderValue::from_str(value) {
                builder = builder.header(name.as_str(), header_value);
            }
        }
    } else if let Ok(content_type) = HeaderValue::from_str(&entry.content_type) {
        builder = builder.header(axum::http::header::CONTENT_TYPE, content_type);
    }

    builder = builder
        .header(
            inner.status_header.clone(),
            HeaderValue::from_static(CacheStatus::Hit.as_str()),
        )
        .header(SOURCE_HEADER, inner.storage.backend());

    if let Some(expires_at) = entry.expires_at {
        let stamp = DateTime::<Utc>::from(expires_at).to_rfc3339();
        if let Ok(value) = HeaderValue::from_str(&stamp) {
            builder = builder.header(EXPIRES_HEADER, value);
        }
    }

    builder
        .body(Body::from(entry.body.clone()))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
