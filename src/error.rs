//! Error type shared by the tree, the binary format and file I/O

use thiserror::Error;

/// Errors returned by mutating tree operations and persistence.
///
/// Read-only queries never fail: an out-of-range line or byte range is reported
/// as `None` by the query itself.
#[derive(Error, Debug)]
pub enum RopeError {
    #[error("position {pos} (+{len} bytes) is out of bounds for a tree of {total} bytes")]
    OutOfBounds { pos: usize, len: usize, total: usize },

    #[error("corrupt tree file: {0}")]
    Corrupt(String),

    #[error("{0} does not fit its on-disk field")]
    Overflow(&'static str),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RopeError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        RopeError::Corrupt(msg.into())
    }
}

/// Result alias for rope operations.
pub type Result<T> = std::result::Result<T, RopeError>;
