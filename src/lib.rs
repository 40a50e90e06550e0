//! Buffering HTTP response compression middleware for Tower.
//!
//! This crate provides a Tower layer that compresses HTTP response bodies
//! using Gzip or Deflate based on the client's `Accept-Encoding` header.
//! Compressed bodies are buffered in full, so the response carries an exact
//! `Content-Length` for the encoded payload.
//!
//! # Example
//!
//! ```ignore
//! use http_buffered_compression::CompressionLayer;
//! use tower::ServiceBuilder;
//!
//! let service = ServiceBuilder::new()
//!     .layer(CompressionLayer::new())
//!     .service(my_service);
//! ```
//!
//! # Negotiation
//!
//! The first token of `Accept-Encoding` that names a supported algorithm
//! wins. Quality values are not compared, although a token refused with
//! `q=0` is skipped. Without a supported token the response is passed
//! through untouched and never buffered.
//!
//! # Content Types
//!
//! Whether a response may be compressed is decided by an ordered list of
//! content-type patterns where the first match wins. The default list is:
//!
//! - `text/*` (compressed)
//! - `message/*` (compressed)
//! - `application/javascript` (compressed)
//! - `application/json` (compressed)
//! - `*/*` (not compressed)
//!
//! A `*` in a pattern matches any run of characters, including `/`.
//! Responses without a `Content-Type`, or whose type matches no pattern,
//! are not compressed.
//!
//! The middleware also leaves a response alone when it already carries
//! `Content-Encoding`, and, if a minimum size is configured, when its
//! buffered body is smaller than that.
//!
//! # Response Modifications
//!
//! When compression is applied:
//! - `Content-Encoding` header is set to the algorithm used
//! - `Content-Length` header is set to the exact compressed size
//! - `Transfer-Encoding` and `Accept-Ranges` headers are removed
//! - `Vary` header includes `Accept-Encoding`

#![deny(missing_docs)]

mod body;
mod codec;
mod eligibility;
mod error;
mod future;
mod layer;
mod negotiate;
mod service;

pub use body::CompressionBody;
pub use codec::{Algorithm, AlgorithmTable};
pub use eligibility::{EligibilityList, EligibilityRule};
pub use error::{BoxError, CompressionError};
pub use future::ResponseFuture;
pub use layer::{AdvertiseEncoding, CompressionLayer};
pub use negotiate::Negotiator;
pub use service::CompressionService;
