//! The four content decoders and the aggregate dispatcher.
//!
//! Every decoder follows the same shape: a builder-style factory holding the
//! resolved options (primitives copied out at construction time, so later
//! changes to a caller's configuration cannot affect an existing decoder), a
//! side-effect free `should_parse(&HeaderMap)` predicate, and an async
//! `parse(stream, headers)` that delegates to the bounded reader with
//! decoder-specific pre-checks and a final transform.

mod any;
mod json;
mod raw;
mod text;
mod urlencoded;

pub use any::{AnyDecoder, Parsed};
pub use json::Json;
pub use raw::Raw;
pub use text::Text;
pub use urlencoded::Urlencoded;

use serde_json::{Map, Value};

/// Default byte limit shared by all decoders: 100kb.
pub(crate) const DEFAULT_LIMIT: u64 = 100 * 1024;

/// The empty-object sentinel returned when a decoder is skipped or the body
/// has no bytes.
pub(crate) fn empty_object() -> Value {
    Value::Object(Map::new())
}
