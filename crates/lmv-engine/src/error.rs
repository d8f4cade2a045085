//! # Engine Errors
//!
//! [`EngineError`] reproduces the boundary taxonomy of the request surface:
//! each variant maps to exactly one HTTP status in `apps/lmv-server`, via
//! `lmv-kernel`'s `ApiError`.

use std::borrow::Cow;

#[lmv_derive::lmv_error]
pub enum EngineError {
    /// Malformed JSON-Patch, disallowed patch path, missing/malformed
    /// `If-Match`, or bad query arguments. Boundary status 400.
    #[error("Bad request{}: {message}", format_context(.context))]
    BadRequest { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Write gate configured and the bearer token is absent or invalid.
    /// Boundary status 401.
    #[error("Unauthorized{}: {message}", format_context(.context))]
    Unauthorized { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// `If-Match` version does not equal the current memory version.
    /// Boundary status 409; callers should also surface `current_version`
    /// as the response's `ETag` header.
    #[error("Version conflict{}: current version is v{current_version}", format_context(.context))]
    Conflict { current_version: u64, context: Option<Cow<'static, str>> },

    /// Well-formed patch that cannot be applied, or that violates the
    /// reserved-block shape. Boundary status 422.
    #[error("Patch could not be applied{}: {message}", format_context(.context))]
    PatchApply { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Envelope parse/AEAD-verify failure, AAD mismatch, hash-chain break,
    /// cursor discontinuity, or base-version replay mismatch. Fatal to the
    /// operation; boundary status 500 with a generic message.
    #[error("Corruption detected{}: {message}", format_context(.context))]
    Corruption { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Failure from the persistence layer unrelated to content validity
    /// (missing file outside the documented torn-write case, disk I/O
    /// error). Boundary status 500 with a generic message.
    #[error("Storage failure{}: {source}", format_context(.context))]
    Storage { source: lmv_storage::StorageError, context: Option<Cow<'static, str>> },

    /// Any other unexpected failure. Boundary status 500 with a generic
    /// message.
    #[error("Internal engine error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl EngineError {
    pub(crate) fn corruption(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Corruption { message: message.into(), context: None }
    }

    pub(crate) fn patch_apply(message: impl Into<Cow<'static, str>>) -> Self {
        Self::PatchApply { message: message.into(), context: None }
    }

    pub(crate) fn bad_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self::BadRequest { message: message.into(), context: None }
    }
}
