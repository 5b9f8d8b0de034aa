//! Streaming HTTP request-body decoding.
//!
//! This crate turns a raw request body stream plus its headers into a parsed
//! value: a JSON document, a urlencoded key/value map, a plain-text string
//! or the raw bytes. The byte limit is enforced while chunks are still
//! arriving, compressed payloads are inflated transparently, text is
//! reassembled with the declared charset, and an optional caller-supplied
//! verification hook runs over the raw bytes before any parsing. Every
//! failure is a typed [`BodyError`] carrying a response status and a stable
//! kind tag.
//!
//! # Features
//!
//! - Incremental byte-limit enforcement, never buffer-then-check
//! - Transparent gzip/deflate inflation
//! - Charset normalization behind a pluggable provider
//! - Four content decoders plus an aggregate dispatcher
//! - Typed failures with stable kind tags for caller branching
//!
//! # Example
//!
//! ```no_run
//! use http::HeaderMap;
//! use micro_body::{BodyStream, Json};
//!
//! async fn handle(headers: HeaderMap, stream: BodyStream) {
//!     let decoder = Json::new().limit("100kb");
//!     if decoder.should_parse(&headers) {
//!         match decoder.parse(stream, &headers).await {
//!             Ok(value) => println!("parsed body: {value}"),
//!             Err(e) => eprintln!("{} {}: {}", e.status(), e.kind(), e),
//!         }
//!     }
//! }
//! ```
//!
//! This crate only consumes an already-demultiplexed body stream and its
//! header map; HTTP framing, routing and keep-alive belong to the server in
//! front of it.

mod decoder;
mod error;
mod inflate;
mod limit;
mod read;
mod stream;
mod verify;

pub mod charset;
pub mod media_type;

pub use decoder::{AnyDecoder, Json, Parsed, Raw, Text, Urlencoded};
pub use error::BodyError;
pub use inflate::{Inflater, resolve_encoding};
pub use limit::SizeLimit;
pub use media_type::TypeMatcher;
pub use read::{RawBody, ReadOptions, read_body};
pub use stream::{BodyStream, BoxError};
pub use verify::{VerifyError, VerifyHook, verify_hook};

#[cfg(test)]
mod test_util;
