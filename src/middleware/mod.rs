//! Cache Middleware Module
//!
//! The axum-facing surface of the response cache: configuration, the cache
//! status vocabulary, and the orchestrating middleware layer.

pub mod config;
mod layer;

// Re-export public types
pub use config::{
    path_and_query_key, path_key, CacheConfig, CacheStatus, KeyFn, RequestPredicate, TtlFn,
    DEFAULT_MAX_BODY_BYTES, DEFAULT_STATUS_HEADER, DEFAULT_TTL, EXPIRES_HEADER, SOURCE_HEADER,
};
pub use layer::{response_cache_layer, ResponseCache};
