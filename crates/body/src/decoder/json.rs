//! JSON body decoder.
//!
//! Parses `application/json` (and `*+json`) bodies into [`serde_json::Value`].
//! In strict mode (the default) only objects and arrays are accepted at the
//! top level; scalar bodies fail with a syntax-error shaped failure pointing
//! at the offending character. An optional reviver callback transforms the
//! parsed tree bottom-up, mirroring `JSON.parse` reviver semantics.

use std::fmt;
use std::sync::Arc;

use http::HeaderMap;
use serde_json::{Map, Value};
use tracing::trace;

use crate::charset::{CharsetProvider, default_provider};
use crate::decoder::{DEFAULT_LIMIT, empty_object};
use crate::error::BodyError;
use crate::inflate::resolve_encoding;
use crate::limit::SizeLimit;
use crate::media_type::{TypeMatcher, charset_of, content_length, has_body};
use crate::read::{ReadOptions, read_body};
use crate::stream::BodyStream;
use crate::verify::VerifyHook;

/// Bottom-up value transform: `(key, value)` pairs, `None` removes the entry
/// (array slots removed this way become `null`).
pub type Reviver = Arc<dyn Fn(&str, Value) -> Option<Value> + Send + Sync>;

/// Decoder factory for JSON request bodies.
#[derive(Clone)]
pub struct Json {
    inflate: bool,
    limit: u64,
    matcher: TypeMatcher,
    verify: Option<VerifyHook>,
    strict: bool,
    reviver: Option<Reviver>,
    charsets: Arc<dyn CharsetProvider>,
}

impl Default for Json {
    fn default() -> Self {
        Self::new()
    }
}

impl Json {
    pub fn new() -> Self {
        Self {
            inflate: true,
            limit: DEFAULT_LIMIT,
            matcher: TypeMatcher::any(["application/json", "*+json"]),
            verify: None,
            strict: true,
            reviver: None,
            charsets: default_provider(),
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

    /// Restricts accepted top-level values to objects and arrays. On by
    /// default.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn reviver<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Value) -> Option<Value> + Send + Sync + 'static,
    {
        self.reviver = Some(Arc::new(f));
        self
    }

    pub fn charsets(mut self, provider: Arc<dyn CharsetProvider>) -> Self {
        self.charsets = provider;
        self
    }

    /// True iff the request has a body and its content-type matches. Never
    /// touches the stream.
    pub fn should_parse(&self, headers: &HeaderMap) -> bool {
        has_body(headers) && self.matcher.matches(headers)
    }

    /// Parses the body into a [`Value`], or the empty-object sentinel when
    /// the request does not select this decoder.
    pub async fn parse(&self, stream: BodyStream, headers: &HeaderMap) -> Result<Value, BodyError> {
        if !self.should_parse(headers) {
            return Ok(empty_object());
        }

        // an unacceptable content-encoding fails even on a declared-empty body
        let (inflater, length) = resolve_encoding(headers, self.inflate)?;
        // a declared-empty body has nothing to decode, so the charset policy
        // does not apply to it
        if content_length(headers) == Some(0) {
            return Ok(empty_object());
        }

        let charset = charset_of(headers).unwrap_or_else(|| "utf-8".to_string());
        if !charset.starts_with("utf-") {
            trace!(charset, "json body must be utf-family encoded");
            return Err(BodyError::charset_unsupported(charset));
        }

        let options = ReadOptions {
            limit: self.limit,
            length,
            encoding: Some(charset),
            verify: self.verify.clone(),
            charsets: Arc::clone(&self.charsets),
        };

        let text = read_body(stream, headers, inflater, options).await?.into_text();
        if text.is_empty() {
            return Ok(empty_object());
        }

        if self.strict
            && let Some((offset, first)) = first_token(&text)
            && first != '{'
            && first != '['
        {
            return Err(strict_violation(&text, offset));
        }

        let value = match serde_json::from_str::<Value>(&text) {
            Ok(value) => value,
            Err(e) => return Err(BodyError::parse_failed(e, text)),
        };

        Ok(match self.reviver.as_ref() {
            Some(reviver) => apply_reviver(reviver, value),
            None => value,
        })
    }
}

impl fmt::Debug for Json {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Json")
            .field("inflate", &self.inflate)
            .field("limit", &self.limit)
            .field("matcher", &self.matcher)
            .field("verify", &self.verify.is_some())
            .field("strict", &self.strict)
            .field("reviver", &self.reviver.is_some())
            .finish()
    }
}

/// First non-whitespace character and its byte offset. JSON whitespace only.
fn first_token(text: &str) -> Option<(usize, char)> {
    text.char_indices().find(|(_, c)| !matches!(c, ' ' | '\t' | '\n' | '\r'))
}

/// A failure shaped like a native syntax error pointing at the violating
/// character.
fn strict_violation(text: &str, offset: usize) -> BodyError {
    let line = 1 + text[..offset].matches('\n').count();
    let column = 1 + text[..offset].rsplit('\n').next().unwrap_or("").chars().count();
    BodyError::parse_failed(format!("expected object or array at line {line} column {column}"), text.to_string())
}

fn apply_reviver(reviver: &Reviver, value: Value) -> Value {
    walk(reviver, "", value).unwrap_or(Value::Null)
}

fn walk(reviver: &Reviver, key: &str, value: Value) -> Option<Value> {
    let value = match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                if let Some(v) = walk(reviver, &k, v) {
                    out.insert(k, v);
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            let out = items
                .into_iter()
                .enumerate()
                .map(|(i, v)| walk(reviver, &i.to_string(), v).unwrap_or(Value::Null))
                .collect();
            Value::Array(out)
        }
        other => other,
    };
    reviver(key, value)
}
