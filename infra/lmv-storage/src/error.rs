use std::borrow::Cow;

/// A specialized [`StorageError`] enum of this crate.
#[lmv_derive::lmv_error]
pub enum StorageError {
    #[error("Directory not found{}: {message}", format_context(.context))]
    DirectoryNotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("File not found{}: {message}", format_context(.context))]
    FileNotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Hardware I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },
}
