use std::fmt;
use thiserror::Error;

/// Unified error type for all strata operations.
///
/// This enum covers every failure mode of the columnar builders, the row value
/// writer and the join probe. Each variant carries enough context to identify
/// the offending call.
///
/// # Error Handling Strategy
///
/// Errors propagate upward through the call stack using Rust's `?` operator.
/// None of the variants describe transient faults: they are either bad inputs
/// detected at construction time or contract violations by the caller, and the
/// enclosing operator is expected to fail the query rather than retry.
///
/// # Thread Safety
///
/// `Error` implements `Send` and `Sync`, so a failure raised inside a probe
/// running on a worker thread can be handed back to the driving thread.
#[derive(Error, Debug)]
pub enum Error {
    /// Arrow library error while materializing an immutable column.
    ///
    /// This error occurs when:
    /// - A variable-width `Utf8` builder holds bytes that are not valid UTF-8
    /// - Child arrays of a row column disagree with the row field definitions
    /// - Buffer lengths handed to Arrow constructors are inconsistent
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Invalid construction input or API parameter.
    ///
    /// This error indicates a problem with arguments passed to strata APIs:
    /// - A join, output or hash channel outside the bound page
    /// - A hash channel that is not a fixed-width 64-bit column
    /// - Page columns with differing lengths
    /// - Zero-sized page builder or join options
    ///
    /// # Recovery
    ///
    /// Fix the input and construct the component again.
    #[error("Invalid argument: {0}")]
    InvalidArgumentError(String),

    /// Caller broke the write discipline of a column builder.
    ///
    /// Raised when:
    /// - Random access to field builders is requested after a sequential write
    /// - A sequential write is issued after random access was granted
    /// - A row writer is asked to write past its last field
    /// - The position count of a row writer is read after random access
    /// - A fixed-width entry is closed with the wrong number of bytes
    /// - A row is closed while some field holds zero or several values
    ///
    /// This is always a programming error in the caller and is never retried.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Operation intentionally unimplemented for this builder or type.
    ///
    /// The transient row value writer cannot build, describe its encoding or
    /// derive a sibling builder; those belong to the enclosing row builder.
    /// Scalar builders do not accept nested entries, and only a fixed set of
    /// Arrow data types has a builder.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Probe cursor used while it does not reference a row.
    ///
    /// `position` is `None` when no row was advanced to yet.
    #[error("probe cursor {position:?} is outside 0..{position_count}")]
    CursorOutOfRange {
        position: Option<usize>,
        position_count: usize,
    },

    /// Internal error indicating a bug or unexpected state.
    ///
    /// This error should never occur during normal operation. If you encounter
    /// it, the message names the invariant that failed.
    #[error("An internal operation failed: {0}")]
    Internal(String),
}

impl Error {
    /// Create a protocol violation from any displayable message.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_result::Error;
    ///
    /// let err = Error::protocol_violation("field builder already returned");
    /// assert!(matches!(err, Error::ProtocolViolation(msg) if msg.contains("already")));
    /// ```
    #[inline]
    pub fn protocol_violation<M: fmt::Display>(msg: M) -> Self {
        Error::ProtocolViolation(msg.to_string())
    }

    /// Create a not-supported error from any displayable message.
    #[inline]
    pub fn not_supported<M: fmt::Display>(msg: M) -> Self {
        Error::NotSupported(msg.to_string())
    }
}
