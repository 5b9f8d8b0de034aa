//! Form-urlencoded body decoder.
//!
//! Parses `application/x-www-form-urlencoded` bodies into a
//! [`serde_json::Value`] object. Two parser variants are selected once at
//! construction time: the simple variant produces a flat map (repeated keys
//! collect into arrays), the extended variant additionally interprets
//! bracket notation (`foo[0]`, `a[b][c]`, `a[]`) into nested arrays and
//! objects up to a configurable depth. Percent decoding and `+`-as-space
//! handling come from `serde_urlencoded` in both variants.

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

/// Numeric bracket segments above this become object keys instead of array
/// indices, so `a[999999999]=x` cannot allocate a huge array.
const ARRAY_INDEX_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Simple,
    Extended,
}

/// Decoder factory for urlencoded form bodies.
#[derive(Clone)]
pub struct Urlencoded {
    inflate: bool,
    limit: u64,
    matcher: TypeMatcher,
    verify: Option<VerifyHook>,
    charsets: Arc<dyn CharsetProvider>,
    mode: Mode,
    parameter_limit: usize,
    depth: usize,
}

impl Default for Urlencoded {
    fn default() -> Self {
        Self::new()
    }
}

impl Urlencoded {
    pub fn new() -> Self {
        Self {
            inflate: true,
            limit: DEFAULT_LIMIT,
            matcher: TypeMatcher::of("application/x-www-form-urlencoded"),
            verify: None,
            charsets: default_provider(),
            mode: Mode::Simple,
            parameter_limit: 1000,
            depth: 32,
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

    /// Selects the extended (bracket notation) parser variant. Off by
    /// default.
    pub fn extended(mut self, extended: bool) -> Self {
        self.mode = if extended { Mode::Extended } else { Mode::Simple };
        self
    }

    /// Maximum number of `&`-separated parameters accepted per body.
    /// `usize::MAX` means unbounded.
    ///
    /// # Panics
    ///
    /// Panics when `limit` is zero, since that is a programmer error that
    /// must fail before any traffic is served.
    pub fn parameter_limit(mut self, limit: usize) -> Self {
        assert!(limit > 0, "parameter limit must be a positive number");
        self.parameter_limit = limit;
        self
    }

    /// Nesting ceiling for the extended variant; bracket groups past it stay
    /// part of the literal key.
    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// True iff the request has a body and its content-type matches. Never
    /// touches the stream.
    pub fn should_parse(&self, headers: &HeaderMap) -> bool {
        has_body(headers) && self.matcher.matches(headers)
    }

    /// Parses the body into a [`Value`] object, or the empty-object sentinel
    /// when the request does not select this decoder.
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
        if charset != "utf-8" {
            trace!(charset, "urlencoded body must be utf-8 encoded");
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

        // scan the separator count before committing to a full parse
        let parameters = text.bytes().filter(|&b| b == b'&').count() + 1;
        if parameters > self.parameter_limit {
            trace!(parameters, limit = self.parameter_limit, "too many parameters");
            return Err(BodyError::ParametersTooMany { limit: self.parameter_limit });
        }

        let pairs = match serde_urlencoded::from_str::<Vec<(String, String)>>(&text) {
            Ok(pairs) => pairs,
            Err(e) => return Err(BodyError::parse_failed(e, text)),
        };

        Ok(match self.mode {
            Mode::Simple => simple_object(pairs),
            Mode::Extended => extended_object(pairs, self.depth),
        })
    }
}

impl fmt::Debug for Urlencoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Urlencoded")
            .field("inflate", &self.inflate)
            .field("limit", &self.limit)
            .field("matcher", &self.matcher)
            .field("verify", &self.verify.is_some())
            .field("mode", &self.mode)
            .field("parameter_limit", &self.parameter_limit)
            .field("depth", &self.depth)
            .finish()
    }
}

/// Flat map; repeated keys collect into arrays.
fn simple_object(pairs: Vec<(String, String)>) -> Value {
    let mut map = Map::new();
    for (key, value) in pairs {
        match map.get_mut(&key) {
            None => {
                map.insert(key, Value::String(value));
            }
            Some(Value::Array(items)) => items.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
        }
    }
    Value::Object(map)
}

/// Bracket-notation segments of one key.
#[derive(Debug, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
    Append,
}

fn extended_object(pairs: Vec<(String, String)>, depth: usize) -> Value {
    let mut root = Value::Object(Map::new());
    for (key, value) in pairs {
        let segments = parse_key(&key, depth);
        insert(&mut root, &segments, value);
    }
    root
}

/// Splits `a[b][0][]` into its segments. An unterminated bracket or a group
/// past the nesting ceiling keeps the remainder as one literal key segment.
fn parse_key(key: &str, depth: usize) -> Vec<Segment> {
    let Some(open) = key.find('[') else {
        return vec![Segment::Key(key.to_string())];
    };

    let mut segments = vec![Segment::Key(key[..open].to_string())];
    let mut rest = &key[open..];
    let mut groups = 0;

    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            segments.push(Segment::Key(rest.to_string()));
            return segments;
        };
        if groups == depth {
            segments.push(Segment::Key(rest.to_string()));
            return segments;
        }
        segments.push(segment_of(&stripped[..close]));
        groups += 1;
        rest = &stripped[close + 1..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Key(rest.to_string()));
    }
    segments
}

fn segment_of(inner: &str) -> Segment {
    if inner.is_empty() {
        return Segment::Append;
    }
    // "01" stays a key so decoding cannot alias distinct keys
    if inner.len() > 1 && inner.starts_with('0') {
        return Segment::Key(inner.to_string());
    }
    match inner.parse::<usize>() {
        Ok(index) if index <= ARRAY_INDEX_LIMIT => Segment::Index(index),
        _ => Segment::Key(inner.to_string()),
    }
}

fn insert(root: &mut Value, segments: &[Segment], value: String) {
    let mut node = root;
    for segment in segments {
        node = descend(node, segment);
    }
    assign(node, value);
}

/// Walks one segment deeper, creating or reshaping containers on the way. A
/// string key over an existing array re-keys its elements by index; a
/// numeric index over an existing object stays a string key; a scalar in
/// the path is superseded by a fresh container.
fn descend<'a>(node: &'a mut Value, segment: &Segment) -> &'a mut Value {
    match segment {
        Segment::Key(key) => {
            if let Value::Array(items) = node {
                let map: Map<String, Value> = items
                    .drain(..)
                    .enumerate()
                    .filter(|(_, item)| !item.is_null())
                    .map(|(i, item)| (i.to_string(), item))
                    .collect();
                *node = Value::Object(map);
            } else if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            match node {
                Value::Object(map) => map.entry(key.as_str()).or_insert(Value::Null),
                _ => unreachable!("node was just made an object"),
            }
        }
        Segment::Index(index) => {
            if node.is_object() {
                match node {
                    Value::Object(map) => map.entry(index.to_string()).or_insert(Value::Null),
                    _ => unreachable!("node is an object"),
                }
            } else {
                if !node.is_array() {
                    *node = Value::Array(Vec::new());
                }
                match node {
                    Value::Array(items) => {
                        if items.len() <= *index {
                            items.resize(index + 1, Value::Null);
                        }
                        &mut items[*index]
                    }
                    _ => unreachable!("node was just made an array"),
                }
            }
        }
        Segment::Append => {
            if !node.is_array() {
                *node = Value::Array(Vec::new());
            }
            match node {
                Value::Array(items) => {
                    items.push(Value::Null);
                    let last = items.len() - 1;
                    &mut items[last]
                }
                _ => unreachable!("node was just made an array"),
            }
        }
    }
}

/// Leaves a string at the slot; an occupied slot collects into an array.
fn assign(slot: &mut Value, value: String) {
    match slot {
        Value::Null => *slot = Value::String(value),
        Value::Array(items) => items.push(Value::String(value)),
        occupied => {
            let first = occupied.take();
            *occupied = Value::Array(vec![first, Value::String(value)]);
        }
    }
}
