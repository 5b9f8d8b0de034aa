//! Content-type matching and body-presence detection.
//!
//! This module is the content negotiation collaborator of the decoders: it
//! answers "does this request carry a body" and "does its content-type match
//! a configured pattern" without ever touching the body stream.
//!
//! Patterns understood by [`TypeMatcher`]:
//! - exact media types: `application/json` (parameters ignored)
//! - wildcard subtype: `text/*`, full wildcard: `*/*`
//! - suffix wildcards: `*+json`, `application/*+json`
//! - extension shorthands: `json`, `urlencoded`, `text`, `bin`
//! - custom predicates over the whole header map

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use http::{HeaderMap, header};
use mime::Mime;

/// Returns true iff the request carries a body: either `transfer-encoding`
/// is present or `content-length` parses as a valid non-negative integer.
///
/// A malformed `content-length` counts as "no body".
pub fn has_body(headers: &HeaderMap) -> bool {
    headers.contains_key(header::TRANSFER_ENCODING) || content_length(headers).is_some()
}

/// The declared `content-length`, if present and well formed.
pub(crate) fn content_length(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(header::CONTENT_LENGTH)?.to_str().ok()?;
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// The parsed `content-type`, if present and well formed.
pub fn content_type(headers: &HeaderMap) -> Option<Mime> {
    headers.get(header::CONTENT_TYPE)?.to_str().ok()?.parse().ok()
}

/// The charset parameter of the `content-type`, lowercased with surrounding
/// quotes stripped. `None` when absent or unparseable.
pub fn charset_of(headers: &HeaderMap) -> Option<String> {
    let mime = content_type(headers)?;
    let value = mime.get_param(mime::CHARSET)?;
    Some(value.as_str().trim_matches('"').to_ascii_lowercase())
}

/// Decides whether a request's content-type selects a decoder.
#[derive(Clone)]
pub enum TypeMatcher {
    /// A single pattern.
    One(Cow<'static, str>),
    /// Any of a list of patterns.
    Any(Vec<Cow<'static, str>>),
    /// A caller-supplied predicate over the header map.
    Predicate(Arc<dyn Fn(&HeaderMap) -> bool + Send + Sync>),
}

impl TypeMatcher {
    pub fn of(pattern: impl Into<Cow<'static, str>>) -> Self {
        Self::One(pattern.into())
    }

    pub fn any<I, P>(patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Cow<'static, str>>,
    {
        Self::Any(patterns.into_iter().map(Into::into).collect())
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&HeaderMap) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    /// True iff the request's content-type matches. Never reads a body and
    /// is idempotent over the same headers.
    pub fn matches(&self, headers: &HeaderMap) -> bool {
        match self {
            Self::One(pattern) => {
                let Some(mime) = content_type(headers) else { return false };
                mime_match(pattern, &mime)
            }
            Self::Any(patterns) => {
                let Some(mime) = content_type(headers) else { return false };
                patterns.iter().any(|pattern| mime_match(pattern, &mime))
            }
            Self::Predicate(check) => check(headers),
        }
    }
}

impl fmt::Debug for TypeMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One(pattern) => f.debug_tuple("One").field(pattern).finish(),
            Self::Any(patterns) => f.debug_tuple("Any").field(patterns).finish(),
            Self::Predicate(_) => f.debug_tuple("Predicate").field(&"..").finish(),
        }
    }
}

/// Expands extension shorthands to full patterns.
fn normalize(pattern: &str) -> Cow<'_, str> {
    match pattern {
        "json" => Cow::Borrowed("application/json"),
        "urlencoded" => Cow::Borrowed("application/x-www-form-urlencoded"),
        "text" => Cow::Borrowed("text/plain"),
        "bin" => Cow::Borrowed("application/octet-stream"),
        "html" => Cow::Borrowed("text/html"),
        _ if pattern.starts_with('+') => Cow::Owned(format!("*/*{pattern}")),
        _ if pattern.starts_with("*+") => Cow::Owned(format!("*/{pattern}")),
        _ => Cow::Borrowed(pattern),
    }
}

fn mime_match(pattern: &str, mime: &Mime) -> bool {
    let pattern = normalize(pattern);
    let Some((ptype, psub)) = pattern.split_once('/') else { return false };

    if ptype != "*" && !ptype.eq_ignore_ascii_case(mime.type_().as_str()) {
        return false;
    }

    if psub == "*" {
        return true;
    }

    if let Some(suffix) = psub.strip_prefix("*+") {
        return mime.suffix().is_some_and(|s| s.as_str().eq_ignore_ascii_case(suffix))
            || mime.subtype().as_str().eq_ignore_ascii_case(suffix);
    }

    // exact subtype, suffix included, parameters ignored
    let essence = mime.essence_str();
    let full_subtype = essence.split_once('/').map_or(essence, |(_, s)| s);
    psub.eq_ignore_ascii_case(full_subtype)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.parse::<header::HeaderName>().unwrap(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn body_presence() {
        assert!(has_body(&headers(&[("content-length", "0")])));
        assert!(has_body(&headers(&[("content-length", "42")])));
        assert!(has_body(&headers(&[("transfer-encoding", "chunked")])));
        assert!(!has_body(&headers(&[])));
        assert!(!has_body(&headers(&[("content-length", "abc")])));
        assert!(!has_body(&headers(&[("content-length", "-1")])));
    }

    #[test]
    fn exact_match() {
        let matcher = TypeMatcher::of("application/json");
        assert!(matcher.matches(&headers(&[("content-type", "application/json")])));
        assert!(matcher.matches(&headers(&[("content-type", "application/json; charset=utf-8")])));
        assert!(matcher.matches(&headers(&[("content-type", "APPLICATION/JSON")])));
        assert!(!matcher.matches(&headers(&[("content-type", "text/plain")])));
        assert!(!matcher.matches(&headers(&[])));
    }

    #[test]
    fn wildcard_match() {
        assert!(TypeMatcher::of("*/*").matches(&headers(&[("content-type", "application/xml")])));
        assert!(TypeMatcher::of("text/*").matches(&headers(&[("content-type", "text/html")])));
        assert!(!TypeMatcher::of("text/*").matches(&headers(&[("content-type", "application/json")])));
    }

    #[test]
    fn suffix_match() {
        let matcher = TypeMatcher::of("*+json");
        assert!(matcher.matches(&headers(&[("content-type", "application/vnd.api+json")])));
        assert!(matcher.matches(&headers(&[("content-type", "application/json")])));
        assert!(!matcher.matches(&headers(&[("content-type", "application/xml")])));

        let scoped = TypeMatcher::of("application/*+json");
        assert!(scoped.matches(&headers(&[("content-type", "application/hal+json")])));
        assert!(!scoped.matches(&headers(&[("content-type", "text/hal+json")])));
    }

    #[test]
    fn shorthand_match() {
        assert!(TypeMatcher::of("json").matches(&headers(&[("content-type", "application/json")])));
        assert!(
            TypeMatcher::of("urlencoded")
                .matches(&headers(&[("content-type", "application/x-www-form-urlencoded")]))
        );
        assert!(TypeMatcher::of("text").matches(&headers(&[("content-type", "text/plain")])));
        assert!(TypeMatcher::of("bin").matches(&headers(&[("content-type", "application/octet-stream")])));
    }

    #[test]
    fn list_and_predicate() {
        let list = TypeMatcher::any(["application/json", "text/plain"]);
        assert!(list.matches(&headers(&[("content-type", "text/plain")])));
        assert!(!list.matches(&headers(&[("content-type", "application/xml")])));

        let check = TypeMatcher::predicate(|h| h.contains_key("x-parse-me"));
        assert!(check.matches(&headers(&[("x-parse-me", "1")])));
        assert!(!check.matches(&headers(&[])));
    }

    #[test]
    fn charset_extraction() {
        assert_eq!(
            charset_of(&headers(&[("content-type", "text/plain; charset=UTF-8")])),
            Some("utf-8".to_string())
        );
        assert_eq!(
            charset_of(&headers(&[("content-type", "text/plain; charset=\"iso-8859-1\"")])),
            Some("iso-8859-1".to_string())
        );
        assert_eq!(charset_of(&headers(&[("content-type", "text/plain")])), None);
        assert_eq!(charset_of(&headers(&[])), None);
    }
}
