//! Plain-text body decoder.
//!
//! Reads the body into a `String` using the charset named by the
//! content-type, falling back to a configurable default. Unlike the JSON and
//! urlencoded decoders there is no charset restriction: any charset the
//! provider supports is accepted.

use std::fmt;
use std::sync::Arc;

use http::HeaderMap;

use crate::charset::{CharsetProvider, default_provider};
use crate::decoder::DEFAULT_LIMIT;
use crate::error::BodyError;
use crate::inflate::resolve_encoding;
use crate::limit::SizeLimit;
use crate::media_type::{TypeMatcher, charset_of, has_body};
use crate::read::{ReadOptions, read_body};
use crate::stream::BodyStream;
use crate::verify::VerifyHook;

/// Decoder factory for plain-text request bodies.
#[derive(Clone)]
pub struct Text {
    inflate: bool,
    limit: u64,
    matcher: TypeMatcher,
    verify: Option<VerifyHook>,
    charsets: Arc<dyn CharsetProvider>,
    default_charset: String,
}

impl Default for Text {
    fn default() -> Self {
        Self::new()
    }
}

impl Text {
    pub fn new() -> Self {
        Self {
            inflate: true,
            limit: DEFAULT_LIMIT,
            matcher: TypeMatcher::of("text/plain"),
            verify: None,
            charsets: default_provider(),
            default_charset: "utf-8".to_string(),
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

    pub fn charsets(mut self, provider: Arc<dyn CharsetProvider>) -> Self {
        self.charsets = provider;
        self
    }

    /// Charset used when the content-type carries none. Defaults to utf-8.
    pub fn default_charset(mut self, name: impl Into<String>) -> Self {
        self.default_charset = name.into();
        self
    }

    /// True iff the request has a body and its content-type matches. Never
    /// touches the stream.
    pub fn should_parse(&self, headers: &HeaderMap) -> bool {
        has_body(headers) && self.matcher.matches(headers)
    }

    /// Reads the body into a `String`, or an empty string when the request
    /// does not select this decoder.
    pub async fn parse(&self, stream: BodyStream, headers: &HeaderMap) -> Result<String, BodyError> {
        if !self.should_parse(headers) {
            return Ok(String::new());
        }

        let charset = charset_of(headers).unwrap_or_else(|| self.default_charset.clone());
        let (inflater, length) = resolve_encoding(headers, self.inflate)?;
        let options = ReadOptions {
            limit: self.limit,
            length,
            encoding: Some(charset),
            verify: self.verify.clone(),
            charsets: Arc::clone(&self.charsets),
        };

        Ok(read_body(stream, headers, inflater, options).await?.into_text())
    }
}

impl fmt::Debug for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Text")
            .field("inflate", &self.inflate)
            .field("limit", &self.limit)
            .field("matcher", &self.matcher)
            .field("verify", &self.verify.is_some())
            .field("default_charset", &self.default_charset)
            .finish()
    }
}
