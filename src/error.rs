//! Errors produced by the label-extraction pipeline.
//!
//! Configuration problems (an empty or ambiguous vocabulary) and broken caller
//! contracts are the only failures the core reports. Unrecognized glyphs and
//! incomplete records are not errors; they are counted and skipped.

use std::fmt;

/// Errors produced by the registry, the extraction core and the batch I/O layer.
///
/// # Variants
///
/// - **EmptyVocabulary** / **DuplicateClass**: the class list cannot give every
///   symbol a unique id. Raised while building a [`ClassRegistry`](crate::ClassRegistry);
///   the process must not continue.
/// - **UnknownClass**: a symbol is not part of the vocabulary. Returned by
///   [`ClassRegistry::id_of`](crate::ClassRegistry::id_of), and at construction when an
///   alias or function name points outside the vocabulary.
/// - **InvariantViolation**: an internal contract was broken (e.g. aggregating an
///   empty glyph range). Never expected with a correct tokenizer.
/// - **Io** / **Json**: reading inputs or writing outputs failed.
#[derive(Debug)]
pub enum Error {
    /// The vocabulary has no entries.
    EmptyVocabulary,

    /// The vocabulary lists the same symbol more than once.
    DuplicateClass(String),

    /// A symbol that is not in the vocabulary.
    UnknownClass(String),

    /// A caller broke a contract of the core.
    InvariantViolation(&'static str),

    /// Underlying filesystem error.
    Io(std::io::Error),

    /// Underlying JSON error.
    Json(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyVocabulary => write!(f, "class vocabulary is empty"),
            Error::DuplicateClass(s) => write!(f, "duplicate class in vocabulary: {s:?}"),
            Error::UnknownClass(s) => write!(f, "unknown class: {s:?}"),
            Error::InvariantViolation(msg) => write!(f, "invariant violation: {msg}"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
