//! Shared helpers for the in-module tests.

use std::io;
use std::io::Write;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use http::{HeaderMap, HeaderValue, header};
use http_body::{Body, Frame};
use http_body_util::StreamBody;

use crate::stream::BodyStream;

pub(crate) fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.append(name.parse::<header::HeaderName>().unwrap(), HeaderValue::from_str(value).unwrap());
    }
    map
}

/// A stream delivering the body in the given chunks.
pub(crate) fn chunked_stream(chunks: Vec<Vec<u8>>) -> BodyStream {
    let frames: Vec<Result<_, io::Error>> =
        chunks.into_iter().map(|chunk| Ok(Frame::data(Bytes::from(chunk)))).collect();
    BodyStream::new(StreamBody::new(futures::stream::iter(frames)))
}

/// A stream delivering the given chunks and then failing with an io error of
/// the given kind.
pub(crate) fn aborting_stream(chunks: Vec<Vec<u8>>, kind: io::ErrorKind) -> BodyStream {
    let mut frames: Vec<Result<_, io::Error>> =
        chunks.into_iter().map(|chunk| Ok(Frame::data(Bytes::from(chunk)))).collect();
    frames.push(Err(io::Error::new(kind, "connection interrupted")));
    BodyStream::new(StreamBody::new(futures::stream::iter(frames)))
}

/// A body that never yields: tests use it to prove a code path settles
/// before reading any byte, since touching it would hang the test.
#[derive(Debug)]
struct PendingBody;

impl Body for PendingBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Poll::Pending
    }
}

pub(crate) fn pending_stream() -> BodyStream {
    BodyStream::new(PendingBody)
}

pub(crate) fn gzip_bytes(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}
