//! Integration Tests for the Response Cache Middleware
//!
//! Drives a real axum router through the full request/response cycle and
//! asserts the cache status protocol, replay fidelity, and the interaction
//! between configuration hooks and the store.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::routing::{any, get};
use axum::Router;
use tower::ServiceExt;

use cachet::middleware::path_and_query_key;
use cachet::{response_cache_layer, CacheConfig, CachedResponse, ResponseCache, Storage, Ttl};

// == Helper Functions ==

/// Builds an app whose handler bodies count invocations, so a cache hit is
/// observable as a handler that did not run.
fn counting_app(config: CacheConfig) -> (Router, Arc<AtomicU32>) {
    let cache = ResponseCache::new(config).unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let handler_calls = Arc::clone(&calls);

    let app = Router::new()
        .route(
            "/value",
            any(move || {
                let calls = Arc::clone(&handler_calls);
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    format!("call {n}")
                }
            }),
        )
        .layer(axum::middleware::from_fn_with_state(
            cache,
            response_cache_layer,
        ));

    (app, calls)
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body)
}

fn cache_status(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-cache-status")
        .map(|value| value.to_str().unwrap())
}

// == Hit/Miss Protocol ==

#[tokio::test]
async fn test_miss_then_hit_serves_identical_response() {
    let (app, calls) = counting_app(CacheConfig::default());

    let (status1, headers1, body1) = send(&app, get_request("/value")).await;
    assert_eq!(status1, StatusCode::OK);
    assert_eq!(cache_status(&headers1), Some("MISS"));
    assert_eq!(body1, Bytes::from_static(b"call 1"));

    let (status2, headers2, body2) = send(&app, get_request("/value")).await;
    assert_eq!(status2, StatusCode::OK);
    assert_eq!(cache_status(&headers2), Some("HIT"));
    assert_eq!(body2, body1, "hit replays the captured body verbatim");

    assert_eq!(calls.load(Ordering::SeqCst), 1, "handler ran exactly once");
}

#[tokio::test]
async fn test_hit_reports_source_and_expiry() {
    let (app, _) = counting_app(CacheConfig::default());

    send(&app, get_request("/value")).await;
    let (_, headers, _) = send(&app, get_request("/value")).await;

    assert_eq!(headers["x-cache-source"], "memory");

    let expires_at = headers["x-cache-expires-at"].to_str().unwrap();
    chrono::DateTime::parse_from_rfc3339(expires_at)
        .expect("expiry header should be RFC3339");
}

#[tokio::test]
async fn test_error_status_is_cached_like_any_capture() {
    let cache = ResponseCache::new(CacheConfig::default()).unwrap();
    let app = Router::new()
        .route("/missing", get(|| async { (StatusCode::NOT_FOUND, "nope") }))
        .layer(axum::middleware::from_fn_with_state(
            cache,
            response_cache_layer,
        ));

    let (status1, headers1, _) = send(&app, get_request("/missing")).await;
    assert_eq!(status1, StatusCode::NOT_FOUND);
    assert_eq!(cache_status(&headers1), Some("MISS"));

    let (status2, headers2, body2) = send(&app, get_request("/missing")).await;
    assert_eq!(status2, StatusCode::NOT_FOUND);
    assert_eq!(cache_status(&headers2), Some("HIT"));
    assert_eq!(body2, Bytes::from_static(b"nope"));
}

// == Method Filtering ==

#[tokio::test]
async fn test_non_cacheable_method_passes_through() {
    let (app, calls) = counting_app(CacheConfig::default());

    for _ in 0..2 {
        let request = Request::builder()
            .method("POST")
            .uri("/value")
            .body(Body::empty())
            .unwrap();
        let (status, headers, _) = send(&app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache_status(&headers), None, "no status header on pass-through");
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2, "handler re-executes every time");
}

// == Key Derivation ==

#[tokio::test]
async fn test_default_key_collapses_queries() {
    let (app, _) = counting_app(CacheConfig::default());

    let (_, headers1, _) = send(&app, get_request("/value?a=1")).await;
    assert_eq!(cache_status(&headers1), Some("MISS"));

    let (_, headers2, _) = send(&app, get_request("/value?b=2")).await;
    assert_eq!(cache_status(&headers2), Some("HIT"));
}

#[tokio::test]
async fn test_custom_key_distinguishes_queries() {
    let config = CacheConfig {
        key_for: Arc::new(path_and_query_key),
        ..CacheConfig::default()
    };
    let (app, _) = counting_app(config);

    let (_, headers, _) = send(&app, get_request("/value?lang=en")).await;
    assert_eq!(cache_status(&headers), Some("MISS"));

    let (_, headers, _) = send(&app, get_request("/value?lang=es")).await;
    assert_eq!(cache_status(&headers), Some("MISS"));

    let (_, headers, _) = send(&app, get_request("/value?lang=en")).await;
    assert_eq!(cache_status(&headers), Some("HIT"));
}

// == Invalidation ==

#[tokio::test]
async fn test_invalidator_drops_entry() {
    let config = CacheConfig {
        invalidate_when: Some(Arc::new(|request: &Request<Body>| {
            request
                .uri()
                .query()
                .is_some_and(|query| query.contains("clear=1"))
        })),
        ..CacheConfig::default()
    };
    let (app, calls) = counting_app(config);

    let (_, headers, _) = send(&app, get_request("/value")).await;
    assert_eq!(cache_status(&headers), Some("MISS"));

    let (_, headers, _) = send(&app, get_request("/value")).await;
    assert_eq!(cache_status(&headers), Some("HIT"));

    // The invalidating request runs downstream and is not cached itself.
    let (_, headers, _) = send(&app, get_request("/value?clear=1")).await;
    assert_eq!(cache_status(&headers), Some("INVALIDATED"));

    let (_, headers, _) = send(&app, get_request("/value")).await;
    assert_eq!(cache_status(&headers), Some("MISS"));

    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

// == Client Bypass ==

#[tokio::test]
async fn test_no_cache_request_bypasses() {
    let (app, calls) = counting_app(CacheConfig::default());

    let request = Request::builder()
        .uri("/value")
        .header("cache-control", "no-cache")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = send(&app, request).await;
    assert_eq!(cache_status(&headers), Some("BYPASS"));

    // The bypassed response was not stored.
    let (_, headers, _) = send(&app, get_request("/value")).await;
    assert_eq!(cache_status(&headers), Some("MISS"));

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_no_cache_ignored_when_disabled() {
    let config = CacheConfig {
        honor_no_cache: false,
        ..CacheConfig::default()
    };
    let (app, _) = counting_app(config);

    let request = Request::builder()
        .uri("/value")
        .header("cache-control", "no-cache")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = send(&app, request).await;
    assert_eq!(cache_status(&headers), Some("MISS"));

    let (_, headers, _) = send(&app, get_request("/value")).await;
    assert_eq!(cache_status(&headers), Some("HIT"));
}

// == Skip Hook ==

#[tokio::test]
async fn test_skip_predicate_passes_through() {
    let config = CacheConfig {
        skip_when: Some(Arc::new(|_: &Request<Body>| true)),
        ..CacheConfig::default()
    };
    let (app, calls) = counting_app(config);

    for _ in 0..2 {
        let (_, headers, _) = send(&app, get_request("/value")).await;
        assert_eq!(cache_status(&headers), None);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// == Size Ceiling ==

#[tokio::test]
async fn test_oversized_response_never_cached() {
    let config = CacheConfig {
        max_body_bytes: 4,
        ..CacheConfig::default()
    };
    let (app, calls) = counting_app(config);

    // "call N" is longer than 4 bytes, so every request stays a miss but is
    // still delivered in full.
    let (status, headers, body) = send(&app, get_request("/value")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache_status(&headers), Some("MISS"));
    assert_eq!(body, Bytes::from_static(b"call 1"));

    let (_, headers, body) = send(&app, get_request("/value")).await;
    assert_eq!(cache_status(&headers), Some("MISS"));
    assert_eq!(body, Bytes::from_static(b"call 2"));

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// == TTL Expiry ==

#[tokio::test]
async fn test_expired_entry_misses_again() {
    let config = CacheConfig {
        default_ttl: Duration::from_millis(80),
        ..CacheConfig::default()
    };
    let (app, calls) = counting_app(config);

    let (_, headers, _) = send(&app, get_request("/value")).await;
    assert_eq!(cache_status(&headers), Some("MISS"));

    let (_, headers, _) = send(&app, get_request("/value")).await;
    assert_eq!(cache_status(&headers), Some("HIT"));

    tokio::time::sleep(Duration::from_millis(150)).await;

    // The in-memory store lazily expired the entry, so this is a plain miss.
    let (_, headers, _) = send(&app, get_request("/value")).await;
    assert_eq!(cache_status(&headers), Some("MISS"));

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// == Header Replay ==

#[tokio::test]
async fn test_stored_headers_replayed_on_hit() {
    let cache = ResponseCache::new(CacheConfig::default()).unwrap();
    let app = Router::new()
        .route(
            "/tagged",
            get(|| async { ([("x-custom", "42")], "body") }),
        )
        .layer(axum::middleware::from_fn_with_state(
            cache,
            response_cache_layer,
        ));

    send(&app, get_request("/tagged")).await;
    let (_, headers, _) = send(&app, get_request("/tagged")).await;

    assert_eq!(cache_status(&headers), Some("HIT"));
    assert_eq!(headers["x-custom"], "42");
}

#[tokio::test]
async fn test_header_storage_disabled_keeps_content_type_only() {
    let config = CacheConfig {
        store_headers: false,
        ..CacheConfig::default()
    };
    let cache = ResponseCache::new(config).unwrap();
    let app = Router::new()
        .route(
            "/tagged",
            get(|| async { ([("x-custom", "42")], "body") }),
        )
        .layer(axum::middleware::from_fn_with_state(
            cache,
            response_cache_layer,
        ));

    let (_, headers, _) = send(&app, get_request("/tagged")).await;
    assert_eq!(headers["x-custom"], "42", "live response keeps its headers");

    let (_, headers, _) = send(&app, get_request("/tagged")).await;
    assert_eq!(cache_status(&headers), Some("HIT"));
    assert!(headers.get("x-custom").is_none());
    assert!(headers.get("content-type").is_some());
}

// == Custom Status Header Name ==

#[tokio::test]
async fn test_custom_status_header_name() {
    let config = CacheConfig {
        status_header: "x-proxy-cache".to_string(),
        ..CacheConfig::default()
    };
    let (app, _) = counting_app(config);

    let (_, headers, _) = send(&app, get_request("/value")).await;
    assert!(headers.get("x-cache-status").is_none());
    assert_eq!(headers["x-proxy-cache"], "MISS");
}

// == Non-Lazy Backends ==

/// A storage stub that hands back whatever it holds, including expired
/// entries, the way a remote backend without lazy expiry would.
struct StaleStore {
    entry: Mutex<Option<CachedResponse>>,
}

impl Storage for StaleStore {
    fn get(&self, _key: &str) -> Option<CachedResponse> {
        self.entry.lock().unwrap().clone()
    }

    fn set(&self, _key: &str, response: CachedResponse, _ttl: Ttl) {
        *self.entry.lock().unwrap() = Some(response);
    }

    fn delete(&self, _key: &str) {
        *self.entry.lock().unwrap() = None;
    }

    fn backend(&self) -> &'static str {
        "stale-stub"
    }
}

#[tokio::test]
async fn test_expired_entry_from_non_lazy_backend_reports_expired() {
    let past = SystemTime::now() - Duration::from_secs(60);
    let storage = Arc::new(StaleStore {
        entry: Mutex::new(Some(CachedResponse {
            status: 200,
            body: Bytes::from_static(b"stale"),
            headers: None,
            content_type: "text/plain".to_string(),
            expires_at: Some(past),
            created_at: past,
            last_accessed: past,
        })),
    });

    let cache = ResponseCache::with_storage(CacheConfig::default(), storage.clone()).unwrap();
    let app = Router::new()
        .route("/value", get(|| async { "fresh" }))
        .layer(axum::middleware::from_fn_with_state(
            cache,
            response_cache_layer,
        ));

    let (_, headers, body) = send(&app, get_request("/value")).await;
    assert_eq!(cache_status(&headers), Some("EXPIRED"));
    assert_eq!(body, Bytes::from_static(b"fresh"));

    // The stale entry was deleted; the expired request's own response was
    // not stored, so the store is empty now.
    assert!(storage.entry.lock().unwrap().is_none());
}
