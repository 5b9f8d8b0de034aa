//! Aggregate dispatcher over the four decoders.
//!
//! Tries each decoder's `should_parse` in a fixed priority order (JSON,
//! text, urlencoded, raw) and runs the first match. Pure dispatch over the
//! decoders' public contract: no retries, no fallback parsing.

use bytes::Bytes;
use http::HeaderMap;
use serde_json::Value;
use tracing::trace;

use crate::decoder::{Json, Raw, Text, Urlencoded};
use crate::error::BodyError;
use crate::media_type::has_body;
use crate::stream::BodyStream;

/// Outcome of aggregate parsing. [`Parsed::Unmatched`] is the sentinel for
/// "no body, or no decoder claimed it".
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    Json(Value),
    Text(String),
    Form(Value),
    Raw(Bytes),
    Unmatched,
}

impl Parsed {
    pub fn is_unmatched(&self) -> bool {
        matches!(self, Self::Unmatched)
    }

    /// Replaces the unmatched sentinel with a caller-chosen default.
    pub fn unmatched_or(self, default: Self) -> Self {
        if self.is_unmatched() { default } else { self }
    }
}

/// Dispatcher holding one configured instance of each decoder.
#[derive(Debug, Clone, Default)]
pub struct AnyDecoder {
    json: Json,
    text: Text,
    urlencoded: Urlencoded,
    raw: Raw,
}

impl AnyDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json(mut self, json: Json) -> Self {
        self.json = json;
        self
    }

    pub fn with_text(mut self, text: Text) -> Self {
        self.text = text;
        self
    }

    pub fn with_urlencoded(mut self, urlencoded: Urlencoded) -> Self {
        self.urlencoded = urlencoded;
        self
    }

    pub fn with_raw(mut self, raw: Raw) -> Self {
        self.raw = raw;
        self
    }

    /// Runs the first decoder whose `should_parse` accepts the request.
    pub async fn parse(&self, stream: BodyStream, headers: &HeaderMap) -> Result<Parsed, BodyError> {
        if !has_body(headers) {
            return Ok(Parsed::Unmatched);
        }

        if self.json.should_parse(headers) {
            trace!("dispatching body to the json decoder");
            return Ok(Parsed::Json(self.json.parse(stream, headers).await?));
        }
        if self.text.should_parse(headers) {
            trace!("dispatching body to the text decoder");
            return Ok(Parsed::Text(self.text.parse(stream, headers).await?));
        }
        if self.urlencoded.should_parse(headers) {
            trace!("dispatching body to the urlencoded decoder");
            return Ok(Parsed::Form(self.urlencoded.parse(stream, headers).await?));
        }
        if self.raw.should_parse(headers) {
            trace!("dispatching body to the raw decoder");
            return Ok(Parsed::Raw(self.raw.parse(stream, headers).await?));
        }

        Ok(Parsed::Unmatched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media_type::TypeMatcher;
    use crate::test_util::{headers, pending_stream};
    use serde_json::json;

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn dispatches_by_content_type() {
        let any = AnyDecoder::new();

        let h = headers(&[("content-type", "application/json"), ("content-length", "15")]);
        let parsed = any.parse(BodyStream::from(r#"{"user":"tobi"}"#), &h).await.unwrap();
        assert_eq!(parsed, Parsed::Json(json!({"user": "tobi"})));

        let h = headers(&[("content-type", "text/plain"), ("content-length", "5")]);
        let parsed = any.parse(BodyStream::from("hello"), &h).await.unwrap();
        assert_eq!(parsed, Parsed::Text("hello".to_string()));

        let h = headers(&[("content-type", "application/x-www-form-urlencoded"), ("content-length", "9")]);
        let parsed = any.parse(BodyStream::from("user=tobi"), &h).await.unwrap();
        assert_eq!(parsed, Parsed::Form(json!({"user": "tobi"})));

        let h = headers(&[("content-type", "application/octet-stream"), ("content-length", "3")]);
        let parsed = any.parse(BodyStream::from("abc"), &h).await.unwrap();
        assert_eq!(parsed, Parsed::Raw(Bytes::from_static(b"abc")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn no_body_is_unmatched_without_touching_the_stream() {
        let parsed = AnyDecoder::new().parse(pending_stream(), &HeaderMap::new()).await.unwrap();
        assert!(parsed.is_unmatched());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn unknown_content_type_is_unmatched() {
        let h = headers(&[("content-type", "application/xml"), ("content-length", "5")]);
        let parsed = AnyDecoder::new().parse(pending_stream(), &h).await.unwrap();
        assert!(parsed.is_unmatched());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn unmatched_or_substitutes_the_default() {
        let parsed = AnyDecoder::new().parse(BodyStream::empty(), &HeaderMap::new()).await.unwrap();
        let value = parsed.unmatched_or(Parsed::Json(json!({})));
        assert_eq!(value, Parsed::Json(json!({})));

        let kept = Parsed::Text("body".to_string()).unmatched_or(Parsed::Json(json!({})));
        assert_eq!(kept, Parsed::Text("body".to_string()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn json_wins_over_a_widened_raw_matcher() {
        // raw configured to claim everything still loses to json by priority
        let any = AnyDecoder::new().with_raw(Raw::new().matcher(TypeMatcher::of("*/*")));
        let h = headers(&[("content-type", "application/json"), ("content-length", "2")]);
        let parsed = any.parse(BodyStream::from("{}"), &h).await.unwrap();
        assert_eq!(parsed, Parsed::Json(json!({})));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn decoder_failures_surface_unchanged() {
        let h = headers(&[("content-type", "application/json"), ("content-length", "4")]);
        let err = AnyDecoder::new().parse(BodyStream::from("true"), &h).await.unwrap_err();
        assert_eq!(err.kind(), "entity.parse.failed");
    }
}
