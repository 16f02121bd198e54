//! Shared error types for the content pipeline.

use thiserror::Error;

/// Error taxonomy for every fallible operation in the crate.
///
/// Variants map to how callers are expected to react:
///
/// * [`NotFound`](CourseError::NotFound) and
///   [`Validation`](CourseError::Validation) surface directly to the caller
///   and are never retried.
/// * [`Fetch`](CourseError::Fetch) is recorded at page granularity during
///   processing and never aborts a whole run.
/// * [`Generation`](CourseError::Generation) triggers the deterministic
///   fallback paths in synthesis instead of propagating.
/// * [`Embedding`](CourseError::Embedding) fails the affected page; a
///   sustained outage aborts the run early.
#[derive(Debug, Error)]
pub enum CourseError {
    /// Config, course, module, or quiz absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Per-page document fetch or child-listing failure.
    #[error("wiki fetch failed: {0}")]
    Fetch(String),

    /// Text-generation capability errored or returned an unusable shape.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Embedding capability errored.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Caller-supplied input rejected (e.g. answer-count mismatch).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Vector index or record store failure.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
