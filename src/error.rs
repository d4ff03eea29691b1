//! Error types for appliance client operations.

use crate::protocol::Status;
use thiserror::Error;

/// Errors that can occur while talking to the appliance or handling local
/// artifacts (vector files, cached graphs, title tables).
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (socket or file operations)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed frame or file (bad magic, unexpected shape, short body)
    #[error("format error: {0}")]
    Format(String),

    /// Checksum mismatch (corruption in transit or on disk)
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// The appliance answered with a non-success status
    #[error("appliance error: {0}")]
    Server(Status),

    /// Invalid parameter value
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dimension mismatch between vectors that must agree
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Lookup failed (title, row id, dataset)
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation not supported (e.g. file format without the matching feature)
    #[error("not supported: {0}")]
    Unsupported(String),

    /// JSON (de)serialization error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// HDF5 read error
    #[cfg(feature = "hdf5")]
    #[error("hdf5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// The connection was closed (explicitly or after a server error)
    #[error("connection closed")]
    Closed,
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
