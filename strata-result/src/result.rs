use crate::error::Error;

/// Result type alias used throughout strata.
///
/// This is a type alias for `std::result::Result<T, Error>`, providing a
/// convenient shorthand for every fallible builder, writer and probe operation.
pub type Result<T> = std::result::Result<T, Error>;
