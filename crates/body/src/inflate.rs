//! Content-Encoding resolution and streaming decompression.
//!
//! [`resolve_encoding`] inspects the `content-encoding` header and decides
//! whether the body stream passes through unchanged, gets chained into an
//! [`Inflater`], or is rejected outright. The inflater feeds compressed
//! chunks into a write-side flate2 decoder backed by an internal buffer and
//! hands the decompressed bytes back incrementally, so the byte limit can be
//! enforced while data is still arriving.

use std::io;
use std::io::Write;

use bytes::{Bytes, BytesMut};
use flate2::write::{GzDecoder, ZlibDecoder};
use http::{HeaderMap, header};
use tracing::trace;

use crate::error::BodyError;
use crate::media_type::content_length;

/// Write-side sink collecting inflated output between chunk pushes. The
/// buffer starts empty since the inflated size of a chunk is unpredictable.
#[derive(Default)]
struct InflateBuf {
    bytes: BytesMut,
}

impl InflateBuf {
    /// Hands out everything written since the last drain.
    fn drain(&mut self) -> Bytes {
        self.bytes.split().freeze()
    }
}

impl io::Write for InflateBuf {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.bytes.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A streaming decompression transform chained after the source stream.
pub struct Inflater {
    /// The specific decoding strategy to use
    kind: Kind,
}

enum Kind {
    /// Gzip decoding.
    Gzip(GzDecoder<InflateBuf>),
    /// Deflate (zlib) decoding.
    Deflate(ZlibDecoder<InflateBuf>),
}

impl Inflater {
    fn gzip() -> Self {
        Self { kind: Kind::Gzip(GzDecoder::new(InflateBuf::default())) }
    }

    fn deflate() -> Self {
        Self { kind: Kind::Deflate(ZlibDecoder::new(InflateBuf::default())) }
    }

    /// Returns the name of the encoding.
    pub fn name(&self) -> &'static str {
        match &self.kind {
            Kind::Gzip(_) => "gzip",
            Kind::Deflate(_) => "deflate",
        }
    }

    /// Feeds one compressed chunk in and returns whatever decompressed bytes
    /// became available. Corrupt input surfaces as an io error.
    pub fn push(&mut self, chunk: &[u8]) -> io::Result<Bytes> {
        match &mut self.kind {
            Kind::Gzip(decoder) => {
                decoder.write_all(chunk)?;
                decoder.flush()?;
                Ok(decoder.get_mut().drain())
            }
            Kind::Deflate(decoder) => {
                decoder.write_all(chunk)?;
                decoder.flush()?;
                Ok(decoder.get_mut().drain())
            }
        }
    }

    /// Finishes the transform and returns any trailing decompressed bytes.
    /// A truncated compressed stream fails here.
    pub fn finish(self) -> io::Result<Bytes> {
        match self.kind {
            Kind::Gzip(decoder) => {
                let mut sink = decoder.finish()?;
                Ok(sink.drain())
            }
            Kind::Deflate(decoder) => {
                let mut sink = decoder.finish()?;
                Ok(sink.drain())
            }
        }
    }
}

impl std::fmt::Debug for Inflater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Inflater").field(&self.name()).finish()
    }
}

/// Resolves the `content-encoding` header into an optional decompression
/// transform plus the expected body length.
///
/// - `identity` (the default) passes the stream through and propagates the
///   declared `content-length` as the expected length.
/// - `gzip` / `deflate` chain an [`Inflater`] when `inflate` is enabled; the
///   expected length is then unknown, since the decompressed size differs
///   from the declared one. With `inflate` disabled they fail with
///   [`BodyError::EncodingUnsupported`] before any byte is read.
/// - every other name fails with [`BodyError::EncodingUnsupported`].
///
/// Matching is case-insensitive.
pub fn resolve_encoding(headers: &HeaderMap, inflate: bool) -> Result<(Option<Inflater>, Option<u64>), BodyError> {
    let encoding = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("identity")
        .trim()
        .to_ascii_lowercase();

    match encoding.as_str() {
        "identity" => Ok((None, content_length(headers))),
        "gzip" | "deflate" if !inflate => {
            trace!(encoding, "content encoding support is disabled");
            Err(BodyError::encoding_unsupported(encoding))
        }
        "gzip" => Ok((Some(Inflater::gzip()), None)),
        "deflate" => Ok((Some(Inflater::deflate()), None)),
        _ => {
            trace!(encoding, "unsupported content encoding");
            Err(BodyError::encoding_unsupported(encoding))
        }
    }
}
