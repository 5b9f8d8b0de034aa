//! Caller-supplied body verification.
//!
//! A verification hook runs over the raw accumulated bytes after the stream
//! has been drained but before any charset decoding or content parsing, so
//! it always sees the original bytes. A rejecting hook turns into
//! [`BodyError::VerifyFailed`] with status 403 and kind
//! `entity.verify.failed` unless the hook's error overrides them.

use std::borrow::Cow;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

use crate::error::BodyError;

/// Signature of a verification hook: request headers, the raw body bytes and
/// the resolved charset name (when one applies).
pub type VerifyHook = Arc<dyn Fn(&HeaderMap, &Bytes, Option<&str>) -> Result<(), VerifyError> + Send + Sync>;

/// Wraps a closure into a [`VerifyHook`].
pub fn verify_hook<F>(f: F) -> VerifyHook
where
    F: Fn(&HeaderMap, &Bytes, Option<&str>) -> Result<(), VerifyError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Rejection produced by a verification hook. Status and kind are optional
/// overrides of the defaults (403 / `entity.verify.failed`).
#[derive(Debug, Clone)]
pub struct VerifyError {
    pub status: Option<StatusCode>,
    pub kind: Option<Cow<'static, str>>,
    pub message: String,
}

impl VerifyError {
    pub fn new<S: ToString>(message: S) -> Self {
        Self { status: None, kind: None, message: message.to_string() }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_kind(mut self, kind: impl Into<Cow<'static, str>>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

/// Runs the hook and converts a rejection into the typed failure, attaching
/// the raw bytes as context.
pub(crate) fn apply_verify(
    hook: &VerifyHook,
    headers: &HeaderMap,
    body: &Bytes,
    encoding: Option<&str>,
) -> Result<(), BodyError> {
    match hook(headers, body, encoding) {
        Ok(()) => Ok(()),
        Err(rejection) => Err(BodyError::VerifyFailed {
            status: rejection.status.unwrap_or(StatusCode::FORBIDDEN),
            verify_kind: rejection.kind.unwrap_or(Cow::Borrowed("entity.verify.failed")),
            message: rejection.message,
            body: body.clone(),
        }),
    }
}
