//! Error types for the compression middleware

use thiserror::Error;

/// Boxed error returned by [`CompressionService`](crate::CompressionService).
///
/// Errors from the inner service are boxed as-is and can be downcast to
/// their original type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures originating in the compression middleware itself.
#[derive(Error, Debug)]
pub enum CompressionError {
    /// The inner response body failed while it was being buffered.
    #[error("failed to buffer response body: {0}")]
    Body(#[source] BoxError),

    /// The encoder failed.
    #[error("failed to compress response body: {0}")]
    Encode(#[from] std::io::Error),
}
