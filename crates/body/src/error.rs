use std::borrow::Cow;
use std::io;

use bytes::Bytes;
use http::StatusCode;
use thiserror::Error;

/// Error type for every way a body read or decode can fail.
///
/// Each variant carries the context a server needs to answer the request:
/// [`status`](BodyError::status) maps to the response status code and
/// [`kind`](BodyError::kind) is a stable tag callers may branch on. The
/// `Display` message is for logs only and is not part of the contract.
#[derive(Debug, Error)]
pub enum BodyError {
    /// The content-encoding header names a compression this read does not
    /// support, or inflation was disabled by the decoder options.
    #[error("unsupported content encoding \"{encoding}\"")]
    EncodingUnsupported { encoding: String },

    /// The charset is unknown to the charset provider, or violates the
    /// decoder's charset policy.
    #[error("unsupported charset \"{}\"", .charset.to_uppercase())]
    CharsetUnsupported { charset: String },

    /// The stream already had a text decoding attached, so this read
    /// cannot own raw byte access.
    #[error("stream encoding should not be set")]
    StreamEncodingAlreadySet,

    /// The stream was consumed or closed before this read began.
    #[error("stream is not readable")]
    StreamNotReadable,

    /// The byte limit was exceeded, either by the declared length or by
    /// live accumulation.
    #[error("request entity too large")]
    EntityTooLarge { limit: u64, expected: Option<u64>, received: Option<u64> },

    /// The client disconnected before the body was complete.
    #[error("request aborted")]
    RequestAborted { expected: Option<u64>, received: u64 },

    /// The stream ended with a byte count different from the declared
    /// content-length.
    #[error("request size did not match content length")]
    RequestSizeInvalid { expected: u64, received: u64 },

    /// The caller-supplied verification hook rejected the body. Status and
    /// kind default to 403 / `entity.verify.failed` but the hook's error may
    /// override both; the raw body bytes are attached as context.
    #[error("{message}")]
    VerifyFailed { status: StatusCode, verify_kind: Cow<'static, str>, message: String, body: Bytes },

    /// Content-specific decoding (JSON syntax, urlencoded pairs) failed.
    /// The offending body text is attached as context.
    #[error("{message}")]
    ParseFailed { message: String, body: String },

    /// The urlencoded parameter count exceeds the configured limit.
    #[error("too many parameters")]
    ParametersTooMany { limit: usize },

    /// A lower-level stream error that is not an abort.
    #[error("io error reading body: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl BodyError {
    pub fn encoding_unsupported<S: ToString>(encoding: S) -> Self {
        Self::EncodingUnsupported { encoding: encoding.to_string() }
    }

    pub fn charset_unsupported<S: ToString>(charset: S) -> Self {
        Self::CharsetUnsupported { charset: charset.to_string() }
    }

    pub fn parse_failed<S: ToString>(message: S, body: String) -> Self {
        Self::ParseFailed { message: message.to_string(), body }
    }

    /// The response status this failure maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::EncodingUnsupported { .. } | Self::CharsetUnsupported { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::StreamEncodingAlreadySet | Self::StreamNotReadable => StatusCode::INTERNAL_SERVER_ERROR,
            Self::EntityTooLarge { .. } | Self::ParametersTooMany { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RequestAborted { .. } | Self::RequestSizeInvalid { .. } => StatusCode::BAD_REQUEST,
            Self::VerifyFailed { status, .. } => *status,
            Self::ParseFailed { .. } | Self::Io { .. } => StatusCode::BAD_REQUEST,
        }
    }

    /// Stable tag identifying the failure class. Callers branch on this,
    /// never on the `Display` message.
    pub fn kind(&self) -> &str {
        match self {
            Self::EncodingUnsupported { .. } => "encoding.unsupported",
            Self::CharsetUnsupported { .. } => "charset.unsupported",
            Self::StreamEncodingAlreadySet => "stream.encoding.set",
            Self::StreamNotReadable => "stream.not.readable",
            Self::EntityTooLarge { .. } => "entity.too.large",
            Self::RequestAborted { .. } => "request.aborted",
            Self::RequestSizeInvalid { .. } => "request.size.invalid",
            Self::VerifyFailed { verify_kind, .. } => verify_kind,
            Self::ParseFailed { .. } => "entity.parse.failed",
            Self::ParametersTooMany { .. } => "parameters.too.many",
            Self::Io { .. } => "io.error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(BodyError::encoding_unsupported("br").status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(BodyError::charset_unsupported("koi8-r").status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(BodyError::StreamEncodingAlreadySet.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(BodyError::StreamNotReadable.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            BodyError::EntityTooLarge { limit: 1024, expected: None, received: Some(2048) }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(BodyError::RequestAborted { expected: Some(10), received: 3 }.status(), StatusCode::BAD_REQUEST);
        assert_eq!(BodyError::RequestSizeInvalid { expected: 10, received: 3 }.status(), StatusCode::BAD_REQUEST);
        assert_eq!(BodyError::ParametersTooMany { limit: 1000 }.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn stable_kinds() {
        assert_eq!(BodyError::encoding_unsupported("br").kind(), "encoding.unsupported");
        assert_eq!(BodyError::StreamNotReadable.kind(), "stream.not.readable");
        assert_eq!(BodyError::parse_failed("bad json", "x".to_string()).kind(), "entity.parse.failed");
    }

    #[test]
    fn charset_message_is_uppercased() {
        let err = BodyError::charset_unsupported("koi8-r");
        assert_eq!(err.to_string(), "unsupported charset \"KOI8-R\"");
    }

    #[test]
    fn verify_failed_keeps_custom_status_and_kind() {
        let err = BodyError::VerifyFailed {
            status: StatusCode::IM_A_TEAPOT,
            verify_kind: "signature.mismatch".into(),
            message: "bad signature".to_string(),
            body: Bytes::from_static(b"payload"),
        };
        assert_eq!(err.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(err.kind(), "signature.mismatch");
        assert_eq!(err.to_string(), "bad signature");
    }
}
