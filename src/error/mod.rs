//! Error types for poolstream.

use std::fmt;
use std::io;

/// Errors surfaced during stream construction or event delivery.
///
/// Each variant maps to one phase of the stream lifecycle. [`StreamError::InvalidRange`]
/// is returned before a stream exists; the other variants are yielded by the
/// stream in place of a normal event and are reported exactly once.
#[derive(Debug)]
pub enum StreamError {
    /// The configured byte range is invalid: `start` is greater than `end`.
    InvalidRange {
        /// The requested inclusive lower bound.
        start: u64,
        /// The requested inclusive upper bound.
        end: u64,
    },

    /// The open primitive failed. No data was emitted.
    Open(io::Error),

    /// The read primitive failed mid-stream. Chunks already emitted stand.
    Read(io::Error),

    /// The close primitive failed. The stream is still marked closed, and
    /// this error is yielded in place of the close event.
    Close(io::Error),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::InvalidRange { start, end } => {
                write!(f, "invalid range: start {} is greater than end {}", start, end)
            }
            StreamError::Open(e) => write!(f, "open failed: {}", e),
            StreamError::Read(e) => write!(f, "read failed: {}", e),
            StreamError::Close(e) => write!(f, "close failed: {}", e),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StreamError::Open(e) | StreamError::Read(e) | StreamError::Close(e) => Some(e),
            StreamError::InvalidRange { .. } => None,
        }
    }
}
