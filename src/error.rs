//! Error types for cache construction
//!
//! The cache has no runtime error surface: failures at request time degrade
//! to "acts as if caching were disabled". Only assembling a cache can fail.

use thiserror::Error;

// == Cache Error Enum ==
/// Errors surfaced once at setup time.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The configured status header is not a valid HTTP header name
    #[error("invalid status header name: {0:?}")]
    InvalidStatusHeader(String),
}
