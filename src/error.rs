//! Crate-wide error type.
//!
//! Plain enum + hand-written `Display`/`Error` impls, matching the rest of
//! this codebase's convention of not pulling in `thiserror`/`anyhow` for a
//! handful of variants.

use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum Error {
    /// Parse failure; `line` is 1-indexed into the offending file.
    MalformedInput { line: usize, detail: String },
    /// Feature count in a record didn't match the configured `F`.
    DimensionMismatch { expected: usize, found: usize },
    /// A fixed-size buffer (max samples, max sequences) was exceeded.
    CapacityExceeded { what: &'static str, limit: usize },
    /// Caller-supplied output buffer too small for an alignment result.
    InsufficientBuffer { needed: usize, got: usize },
    /// File could not be opened/read.
    IoFailure { path: PathBuf, source: std::io::Error },
    /// A numeric degenerate case (e.g. T=0 in CTC) that callers must treat
    /// as a sentinel rather than a hard failure.
    NumericDegenerate { detail: &'static str },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedInput { line, detail } => {
                write!(f, "malformed input at line {}: {}", line, detail)
            }
            Error::DimensionMismatch { expected, found } => write!(
                f,
                "dimension mismatch: expected {} features, found {}",
                expected, found
            ),
            Error::CapacityExceeded { what, limit } => {
                write!(f, "capacity exceeded: {} (limit {})", what, limit)
            }
            Error::InsufficientBuffer { needed, got } => write!(
                f,
                "insufficient buffer: needed at least {}, got {}",
                needed, got
            ),
            Error::IoFailure { path, source } => {
                write!(f, "I/O failure on {}: {}", path.display(), source)
            }
            Error::NumericDegenerate { detail } => write!(f, "numeric degenerate case: {}", detail),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoFailure { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
