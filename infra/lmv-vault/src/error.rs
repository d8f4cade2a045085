//! # Vault Errors
//!
//! This module defines the [`VaultError`] enum and [`Result`] type used throughout
//! the vault crate for reporting cryptographic, serialization, and configuration failures.

use std::borrow::Cow;

/// A specialized [`VaultError`] enum for vault-related failures.
#[lmv_derive::lmv_error]
pub enum VaultError {
    /// Failure during the encryption process.
    #[error("Encryption error{}: {message}", format_context(.context))]
    Encryption { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Failure during the decryption process, or AAD/tag verification failure.
    ///
    /// This usually indicates an incorrect passphrase, a mismatched cryptographic
    /// context (AAD), or tampered data. Per the envelope contract this is always
    /// surfaced as corruption to the caller, never distinguished from a wrong key.
    #[error("Decryption error{}: {message}", format_context(.context))]
    Decryption { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Failure parsing or emitting the JSON envelope.
    #[error("Envelope error{}: {source}", format_context(.context))]
    Envelope { source: serde_json::Error, context: Option<Cow<'static, str>> },

    /// The envelope's `hkdf.info` domain tag did not match what the caller expected
    /// (e.g. a ledger envelope presented where a vault envelope was required).
    #[error("Domain mismatch{}: expected '{expected}', found '{found}'", format_context(.context))]
    DomainMismatch {
        expected: Cow<'static, str>,
        found: Cow<'static, str>,
        context: Option<Cow<'static, str>>,
    },

    /// Failure when the vault or builder is incorrectly configured.
    #[error("Invalid configuration{}: {message}", format_context(.context))]
    InvalidConfiguration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Internal fallback for unexpected issues or logic errors.
    #[error("Internal vault error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
