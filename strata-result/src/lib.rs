//! Error types and result definitions for the strata columnar join core.
//!
//! This crate provides the single error enum ([`Error`]) and result alias
//! ([`Result<T>`]) used by every strata crate. All operations that could fail
//! return `Result<T>`, and the variant says which contract was broken.
//!
//! # Error Categories
//!
//! - **Data format errors** ([`Error::Arrow`]): Arrow refused to assemble a column
//! - **Bad inputs** ([`Error::InvalidArgumentError`]): channels, types or options rejected at construction
//! - **Write discipline** ([`Error::ProtocolViolation`]): builder or row writer misuse
//! - **Wrong abstraction** ([`Error::NotSupported`]): operation not offered by this builder
//! - **Cursor misuse** ([`Error::CursorOutOfRange`]): probe read outside the bound page
//! - **Internal errors** ([`Error::Internal`]): bugs or unexpected states

pub mod error;
pub mod result;

pub use error::Error;
pub use result::Result;
