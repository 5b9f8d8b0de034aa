//! Raw-bytes body decoder.
//!
//! Buffers the body without any text decoding: the result is always the
//! accumulated bytes, whatever charset the content-type declares.

use std::fmt;

use bytes::Bytes;
use http::HeaderMap;

use crate::decoder::DEFAULT_LIMIT;
use crate::error::BodyError;
use crate::inflate::resolve_encoding;
use crate::limit::SizeLimit;
use crate::media_type::{TypeMatcher, has_body};
use crate::read::{ReadOptions, read_body};
use crate::stream::BodyStream;
use crate::verify::VerifyHook;

/// Decoder factory for opaque binary request bodies.
#[derive(Clone)]
pub struct Raw {
    inflate: bool,
    limit: u64,
    matcher: TypeMatcher,
    verify: Option<VerifyHook>,
}

impl Default for Raw {
    fn default() -> Self {
        Self::new()
    }
}

impl Raw {
    pub fn new() -> Self {
        Self {
            inflate: true,
            limit: DEFAULT_LIMIT,
            matcher: TypeMatcher::of("application/octet-stream"),
            verify: None,
        }
    }

    pub fn inflate(mut self, inflate: bool) -> Self {
        self.inflate = inflate;
        self
    }

    pub fn limit(mut self, limit: impl Into<SizeLimit>) -> Self {
        self.limit = limit.into().bytes();
        self
    }

    pub fn matcher(mut self, matcher: TypeMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn verify(mut self, hook: VerifyHook) -> Self {
        self.verify = Some(hook);
        self
    }

    /// True iff the request has a body and its content-type matches. Never
    /// touches the stream.
    pub fn should_parse(&self, headers: &HeaderMap) -> bool {
        has_body(headers) && self.matcher.matches(headers)
    }

    /// Buffers the body, or returns empty bytes when the request does not
    /// select this decoder.
    pub async fn parse(&self, stream: BodyStream, headers: &HeaderMap) -> Result<Bytes, BodyError> {
        if !self.should_parse(headers) {
            return Ok(Bytes::new());
        }

        let (inflater, length) = resolve_encoding(headers, self.inflate)?;
        let options = ReadOptions {
            limit: self.limit,
            length,
            encoding: None,
            verify: self.verify.clone(),
            charsets: crate::charset::default_provider(),
        };

        Ok(read_body(stream, headers, inflater, options).await?.into_bytes())
    }
}

impl fmt::Debug for Raw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Raw")
            .field("inflate", &self.inflate)
            .field("limit", &self.limit)
            .field("matcher", &self.matcher)
            .field("verify", &self.verify.is_some())
            .finish()
    }
}
