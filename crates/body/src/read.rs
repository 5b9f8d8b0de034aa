//! The bounded stream reader.
//!
//! [`read_body`] is the single suspension point of this crate: it subscribes
//! to the body stream, accumulates chunks against the byte limit while data
//! is still arriving, runs decompression and the verification hook, and
//! settles exactly once with either the assembled payload or a typed
//! failure. Every failure path tears the stream down: the decompression
//! transform (when one was chained) is dropped first, then the original
//! stream is drained so the connection behind it is not left half-consumed.
//!
//! Checks run in a fixed order: pre-attached text decoding, readability,
//! declared length against the limit, charset supportedness, then the
//! chunk-by-chunk limit check. The first terminal condition wins; because
//! the whole read is one sequential async fn, later stream events cannot
//! race an already-settled outcome.

use std::fmt;
use std::io;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::HeaderMap;
use tracing::{debug, trace};

use crate::charset::{CharsetProvider, default_provider};
use crate::error::BodyError;
use crate::inflate::Inflater;
use crate::stream::{BodyStream, BoxError};
use crate::verify::{VerifyHook, apply_verify};

/// Options of one read operation. Constructed per call and never shared.
pub struct ReadOptions {
    /// Hard byte ceiling, enforced incrementally as chunks arrive.
    pub limit: u64,
    /// Expected total byte count, when the declared content-length applies.
    pub length: Option<u64>,
    /// Charset to decode the accumulated bytes with, `None` keeps raw bytes.
    pub encoding: Option<String>,
    /// Caller-supplied verification over the raw bytes.
    pub verify: Option<VerifyHook>,
    /// Charset capability collaborator.
    pub charsets: Arc<dyn CharsetProvider>,
}

impl ReadOptions {
    pub fn new(limit: u64) -> Self {
        Self { limit, length: None, encoding: None, verify: None, charsets: default_provider() }
    }

    pub fn length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    pub fn encoding(mut self, name: impl Into<String>) -> Self {
        self.encoding = Some(name.into());
        self
    }

    pub fn verify(mut self, hook: VerifyHook) -> Self {
        self.verify = Some(hook);
        self
    }

    pub fn charsets(mut self, provider: Arc<dyn CharsetProvider>) -> Self {
        self.charsets = provider;
        self
    }
}

impl fmt::Debug for ReadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOptions")
            .field("limit", &self.limit)
            .field("length", &self.length)
            .field("encoding", &self.encoding)
            .field("verify", &self.verify.is_some())
            .finish()
    }
}

/// A fully assembled payload: raw bytes, or text when a charset was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawBody {
    Bytes(Bytes),
    Text(String),
}

impl RawBody {
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Bytes(bytes) => bytes,
            Self::Text(text) => Bytes::from(text),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Bytes(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}

/// Drains a slow-failing stream at most this far past the limit.
fn drain_cap(limit: u64) -> u64 {
    limit.saturating_mul(2).max(1 << 20)
}

/// Reads the stream to completion under the given constraints.
///
/// `inflater` is the decompression transform resolved from the request's
/// content-encoding, chained between the stream and the accumulator. The
/// byte limit applies to the bytes coming out of that chain, which is what
/// the accumulator would otherwise grow to.
pub async fn read_body(
    mut stream: BodyStream,
    headers: &HeaderMap,
    mut inflater: Option<Inflater>,
    options: ReadOptions,
) -> Result<RawBody, BodyError> {
    trace!(limit = options.limit, length = options.length, encoding = options.encoding.as_deref(), "reading body");

    // pre-read failures consume nothing
    if stream.charset().is_some() {
        return Err(BodyError::StreamEncodingAlreadySet);
    }
    if !stream.is_readable() {
        return Err(BodyError::StreamNotReadable);
    }
    if let Some(length) = options.length
        && length > options.limit
    {
        debug!(length, limit = options.limit, "declared length exceeds limit");
        return Err(BodyError::EntityTooLarge { limit: options.limit, expected: Some(length), received: None });
    }
    if let Some(name) = options.encoding.as_deref()
        && !options.charsets.is_supported(name)
    {
        debug!(charset = name, "unsupported charset");
        return Err(BodyError::charset_unsupported(name));
    }

    let mut received: u64 = 0;
    let mut buf = BytesMut::new();

    loop {
        match stream.next_chunk().await {
            Some(Ok(chunk)) => {
                let pushed = inflater.as_mut().map(|inflater| inflater.push(&chunk));
                let data = match pushed {
                    Some(Ok(data)) => data,
                    Some(Err(e)) => {
                        drop(inflater.take());
                        stream.drain(drain_cap(options.limit)).await;
                        return Err(BodyError::Io { source: e });
                    }
                    None => chunk,
                };
                received += data.len() as u64;
                if received > options.limit {
                    // halt the source without waiting for more data
                    drop(inflater.take());
                    stream.drain(drain_cap(options.limit)).await;
                    debug!(received, limit = options.limit, "body exceeded byte limit");
                    return Err(BodyError::EntityTooLarge {
                        limit: options.limit,
                        expected: options.length,
                        received: Some(received),
                    });
                }
                buf.extend_from_slice(&data);
            }
            Some(Err(e)) => {
                drop(inflater.take());
                return Err(classify_stream_error(e, options.length, received));
            }
            None => break,
        }
    }

    if let Some(inflater) = inflater.take() {
        match inflater.finish() {
            Ok(tail) => {
                received += tail.len() as u64;
                if received > options.limit {
                    debug!(received, limit = options.limit, "body exceeded byte limit");
                    return Err(BodyError::EntityTooLarge {
                        limit: options.limit,
                        expected: options.length,
                        received: Some(received),
                    });
                }
                buf.extend_from_slice(&tail);
            }
            Err(e) => return Err(BodyError::Io { source: e }),
        }
    }

    if let Some(expected) = options.length
        && received != expected
    {
        debug!(expected, received, "body size did not match content length");
        return Err(BodyError::RequestSizeInvalid { expected, received });
    }

    let body = buf.freeze();

    // verification always sees the raw bytes, never a decoded string
    if let Some(hook) = options.verify.as_ref() {
        apply_verify(hook, headers, &body, options.encoding.as_deref())?;
    }

    match options.encoding.as_deref() {
        Some(name) => match options.charsets.decode(&body, name) {
            Some(text) => Ok(RawBody::Text(text)),
            None => Err(BodyError::charset_unsupported(name)),
        },
        None => Ok(RawBody::Bytes(body)),
    }
}

/// An io-flavored disconnect is a client abort; everything else wraps as the
/// generic 400 stream failure.
fn classify_stream_error(e: BoxError, expected: Option<u64>, received: u64) -> BodyError {
    if let Some(io_err) = e.downcast_ref::<io::Error>() {
        match io_err.kind() {
            io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => {
                debug!(expected, received, "request aborted");
                return BodyError::RequestAborted { expected, received };
            }
            _ => {}
        }
    }
    BodyError::Io { source: io::Error::other(e) }
}
