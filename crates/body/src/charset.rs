//! Charset capability collaborator.
//!
//! The read pipeline treats charsets as a black box behind the
//! [`CharsetProvider`] trait: "is this name decodable" plus "decode these
//! bytes with this name". The built-in [`StandardCharsets`] provider covers
//! the encodings web clients actually send for the decoders in this crate;
//! callers with exotic needs can plug their own provider into any decoder
//! builder.

use std::char;
use std::fmt::Debug;
use std::sync::Arc;

use once_cell::sync::Lazy;

/// Decodes raw body bytes into text by charset name.
///
/// `decode` is expected to be tolerant: undecodable sequences become
/// replacement characters rather than errors. `None` is reserved for names
/// the provider does not support at all.
pub trait CharsetProvider: Send + Sync + Debug {
    /// True iff `name` (any case) is a charset this provider can decode.
    fn is_supported(&self, name: &str) -> bool;

    /// Decodes `bytes` with the named charset. An empty buffer decodes to an
    /// empty string. Returns `None` only for unsupported names.
    fn decode(&self, bytes: &[u8], name: &str) -> Option<String>;
}

/// Built-in provider: UTF-8, US-ASCII, ISO-8859-1 and UTF-16.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCharsets;

/// Process-wide default provider, shared by every decoder that is not given
/// an explicit one. Read-only after first use.
static DEFAULT_PROVIDER: Lazy<Arc<dyn CharsetProvider>> = Lazy::new(|| Arc::new(StandardCharsets));

pub(crate) fn default_provider() -> Arc<dyn CharsetProvider> {
    Arc::clone(&DEFAULT_PROVIDER)
}

/// Canonical spelling for the aliases [`StandardCharsets`] accepts.
fn canonical(name: &str) -> Option<&'static str> {
    let lower = name.to_ascii_lowercase();
    match lower.as_str() {
        "utf-8" | "utf8" => Some("utf-8"),
        "us-ascii" | "ascii" => Some("us-ascii"),
        "iso-8859-1" | "latin1" | "latin-1" => Some("iso-8859-1"),
        "utf-16le" | "utf-16" => Some("utf-16le"),
        _ => None,
    }
}

impl CharsetProvider for StandardCharsets {
    fn is_supported(&self, name: &str) -> bool {
        canonical(name).is_some()
    }

    fn decode(&self, bytes: &[u8], name: &str) -> Option<String> {
        let decoded = match canonical(name)? {
            "utf-8" => String::from_utf8_lossy(bytes).into_owned(),
            "us-ascii" => {
                bytes.iter().map(|&b| if b.is_ascii() { b as char } else { char::REPLACEMENT_CHARACTER }).collect()
            }
            "iso-8859-1" => bytes.iter().map(|&b| b as char).collect(),
            "utf-16le" => {
                let units = bytes.chunks(2).map(|pair| {
                    if pair.len() == 2 { u16::from_le_bytes([pair[0], pair[1]]) } else { u16::from(pair[0]) }
                });
                char::decode_utf16(units).map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER)).collect()
            }
            _ => unreachable!("canonical() only returns names handled above"),
        };
        Some(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_names() {
        let charsets = StandardCharsets;
        assert!(charsets.is_supported("utf-8"));
        assert!(charsets.is_supported("UTF-8"));
        assert!(charsets.is_supported("utf8"));
        assert!(charsets.is_supported("latin1"));
        assert!(charsets.is_supported("ISO-8859-1"));
        assert!(charsets.is_supported("us-ascii"));
        assert!(charsets.is_supported("utf-16le"));
        assert!(!charsets.is_supported("koi8-r"));
        assert!(!charsets.is_supported(""));
    }

    #[test]
    fn decode_utf8() {
        let charsets = StandardCharsets;
        assert_eq!(charsets.decode("héllo".as_bytes(), "utf-8").unwrap(), "héllo");
        assert_eq!(charsets.decode(b"", "utf-8").unwrap(), "");
    }

    #[test]
    fn decode_is_lossy_not_failing() {
        let charsets = StandardCharsets;
        let decoded = charsets.decode(&[0xff, 0xfe, b'a'], "utf-8").unwrap();
        assert!(decoded.contains('\u{fffd}'));
        assert!(decoded.ends_with('a'));
    }

    #[test]
    fn decode_latin1() {
        let charsets = StandardCharsets;
        assert_eq!(charsets.decode(&[0x63, 0x61, 0x66, 0xe9], "iso-8859-1").unwrap(), "café");
    }

    #[test]
    fn decode_utf16le() {
        let charsets = StandardCharsets;
        let bytes: Vec<u8> = "hi✓".encode_utf16().flat_map(u16::to_le_bytes).collect();
        assert_eq!(charsets.decode(&bytes, "utf-16le").unwrap(), "hi✓");
    }

    #[test]
    fn unknown_name_is_none() {
        assert!(StandardCharsets.decode(b"abc", "koi8-r").is_none());
    }
}
