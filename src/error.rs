//! Error types for the cmt crate.

use thiserror::Error;

/// Errors produced when decoding a [`Proof`](crate::Proof) from its wire
/// encoding.
///
/// These are the crate's only recoverable failures. Queries that merely
/// find nothing (`search`, `remove`, `verify`) report through their return
/// value, and in-core caller bugs are assertion failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CmtError {
    /// Input ended before the fixed header or the declared siblings.
    #[error("proof truncated: need {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// The existence flag byte was neither 0 nor 1.
    #[error("invalid existence tag: {0:#04x}")]
    InvalidExistenceTag(u8),

    /// The declared sibling count is odd; siblings always come in pairs.
    #[error("odd sibling count: {0}")]
    OddSiblingCount(u32),

    /// Bytes remained after the declared siblings.
    #[error("{0} trailing bytes after proof")]
    TrailingBytes(usize),
}

/// Result type alias for cmt operations.
pub type Result<T> = std::result::Result<T, CmtError>;
