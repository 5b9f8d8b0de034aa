//! Owned wrapper over the request body stream.
//!
//! [`BodyStream`] erases the concrete [`http_body::Body`] behind a boxed
//! body and owns it for the duration of one read: reading consumes the
//! stream, so exactly one read can ever observe its bytes. The wrapper also
//! tracks the two conditions the bounded reader must reject up front: a
//! stream that is no longer readable, and a stream that already had a text
//! decoding attached.

use std::fmt;

use bytes::{Buf, Bytes};
use http_body::Body;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use tracing::trace;

/// Boxed error produced by an underlying body implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The byte-producing source handed to the bounded reader: either the
/// original request body or nothing, when the body was already consumed.
pub struct BodyStream {
    inner: Option<UnsyncBoxBody<Bytes, BoxError>>,
    charset: Option<String>,
}

impl BodyStream {
    /// Wraps any body whose data frames can be viewed as bytes.
    pub fn new<B>(body: B) -> Self
    where
        B: Body + Send + 'static,
        B::Data: Buf,
        B::Error: Into<BoxError>,
    {
        let boxed = body
            .map_frame(|frame| frame.map_data(|mut data| data.copy_to_bytes(data.remaining())))
            .map_err(Into::into)
            .boxed_unsync();
        Self { inner: Some(boxed), charset: None }
    }

    /// A readable stream with no bytes.
    pub fn empty() -> Self {
        Self::new(Empty::<Bytes>::new())
    }

    /// Marks a stream whose body was already consumed elsewhere; the bounded
    /// reader rejects it with a 500-class failure.
    pub fn consumed() -> Self {
        Self { inner: None, charset: None }
    }

    /// True until the stream is read to completion, errors, or was
    /// constructed as [`consumed`](BodyStream::consumed).
    pub fn is_readable(&self) -> bool {
        self.inner.is_some()
    }

    /// Pre-attaches a text decoding marker. The bounded reader must own raw
    /// byte access and rejects streams carrying one.
    pub fn set_charset(&mut self, name: impl Into<String>) {
        self.charset = Some(name.into());
    }

    pub(crate) fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// Next data frame, skipping trailers. The stream latches non-readable
    /// on end and on error, so every later call returns `None`.
    pub(crate) async fn next_chunk(&mut self) -> Option<Result<Bytes, BoxError>> {
        let inner = self.inner.as_mut()?;
        loop {
            match inner.frame().await {
                Some(Ok(frame)) => {
                    if let Ok(data) = frame.into_data() {
                        return Some(Ok(data));
                    }
                    // trailer frame, nothing to accumulate
                }
                Some(Err(e)) => {
                    self.inner = None;
                    return Some(Err(e));
                }
                None => {
                    self.inner = None;
                    return None;
                }
            }
        }
    }

    /// Reads the rest of the stream and discards it, so the connection
    /// behind it is not left half-consumed. `cap` bounds how many bytes a
    /// hostile endless stream can make us discard.
    pub(crate) async fn drain(&mut self, cap: u64) {
        let mut drained: u64 = 0;
        while let Some(result) = self.next_chunk().await {
            match result {
                Ok(chunk) => {
                    drained += chunk.len() as u64;
                    if drained > cap {
                        trace!(drained, cap, "drain cap reached, dropping stream");
                        break;
                    }
                }
                Err(_) => break,
            }
        }
        self.inner = None;
    }
}

impl From<Bytes> for BodyStream {
    fn from(bytes: Bytes) -> Self {
        Self::new(Full::new(bytes))
    }
}

impl From<Vec<u8>> for BodyStream {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from(Bytes::from(bytes))
    }
}

impl From<String> for BodyStream {
    fn from(text: String) -> Self {
        Self::from(Bytes::from(text))
    }
}

impl From<&'static str> for BodyStream {
    fn from(text: &'static str) -> Self {
        Self::from(Bytes::from_static(text.as_bytes()))
    }
}

impl fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyStream")
            .field("readable", &self.is_readable())
            .field("charset", &self.charset)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn reads_chunks_then_ends() {
        let mut stream = BodyStream::from("hello");
        assert!(stream.is_readable());

        let chunk = stream.next_chunk().await.unwrap().unwrap();
        assert_eq!(chunk, Bytes::from_static(b"hello"));

        assert!(stream.next_chunk().await.is_none());
        assert!(!stream.is_readable());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn consumed_stream_is_not_readable() {
        let mut stream = BodyStream::consumed();
        assert!(!stream.is_readable());
        assert!(stream.next_chunk().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn empty_stream_is_readable_and_yields_nothing() {
        let mut stream = BodyStream::empty();
        assert!(stream.is_readable());
        assert!(stream.next_chunk().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn drain_discards_everything() {
        let mut stream = BodyStream::from(vec![0u8; 4096]);
        stream.drain(1 << 20).await;
        assert!(!stream.is_readable());
        assert!(stream.next_chunk().await.is_none());
    }

    #[test]
    fn charset_marker() {
        let mut stream = BodyStream::empty();
        assert!(stream.charset().is_none());
        stream.set_charset("utf-8");
        assert_eq!(stream.charset(), Some("utf-8"));
    }
}
