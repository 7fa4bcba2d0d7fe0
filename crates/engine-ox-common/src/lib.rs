#![cfg_attr(not(test), deny(unsafe_code))]
#![warn(clippy::pedantic, clippy::unwrap_used)]

//! Shared HTTP plumbing for the engine-ox client
//!
//! This crate owns everything that talks to the wire: the error taxonomy,
//! request construction for both the async and the blocking `reqwest`
//! clients, and decoding of server-sent event streams.

pub mod error;
pub mod request_builder;
pub mod streaming;

pub use error::{ApiErrorInfo, ErrorKind, RequestError};
pub use request_builder::{
    AuthMethod, BlockingRequestBuilder, Endpoint, HttpMethod, MultipartForm, RawResponse,
    RequestBody, RequestBuilder, RequestConfig, ResponseHead,
};
pub use streaming::{SseLines, SseParser};

/// Re-export common types for convenience
pub use futures_util::stream::BoxStream;
