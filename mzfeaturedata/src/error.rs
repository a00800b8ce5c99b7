//! Errors raised when a trace operation's preconditions are violated.
use std::io;

use thiserror::Error;

/// An error that might occur while building, deriving or reading a trace.
///
/// Every variant except [`TraceError::Storage`] signals a broken caller-side
/// contract. None of them are recoverable by retrying the same call.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("Index {index} is out of bounds for a trace of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("Mismatched lengths: {what} has {actual} values, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Spectra must be in strictly ascending acquisition order, found {previous} followed by {next}")]
    UnorderedSpectra { previous: usize, next: usize },
    #[error("Spectrum {0} is not contained in the parent trace, or is out of order")]
    NotASubset(usize),
    #[error("Remapping left {unmatched} points of the original trace unmatched, the new axis is not a superset")]
    IncompleteRemap { unmatched: usize },
    #[error("Output buffer {what} has {actual} slots, the new axis needs exactly {expected}")]
    OutputBufferSize {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Mobility scan {mobility_scan} of frame {found} was supplied for frame {expected}")]
    FrameMismatch {
        expected: usize,
        found: usize,
        mobility_scan: usize,
    },
    #[error("Illegal mobility bin width ({0})")]
    InvalidBinWidth(usize),
    #[error("No frame with more than one mobility scan was supplied")]
    NoMobilityData,
    #[error("Failed to allocate trace storage: {0}")]
    Storage(
        #[source]
        #[from]
        io::Error,
    ),
}

impl TraceError {
    pub(crate) fn length_mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::LengthMismatch {
            what,
            expected,
            actual,
        }
    }
}
