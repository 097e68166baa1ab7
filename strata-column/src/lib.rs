//! Columnar pages and builders for the strata execution core.
//!
//! Immutable columns are Arrow arrays grouped into [`Page`]s. Mutable
//! counterparts implement [`ColumnBuilder`], an entry-at-a-time append
//! discipline: raw writes build up one entry, `close_entry` seals it and
//! `append_null` adds a null. Row-typed columns are assembled by a
//! [`RowColumnBuilder`] whose rows are written through a transient
//! [`RowValueWriter`], either field by field in order or through direct
//! handles to the field builders.
//!
//! [`PageBuilder`] collects output rows across channels, [`value`] copies
//! single typed values between columns and builders, and [`hash`] computes the
//! join-key hashes that can travel with a page as a precomputed hash channel.
#![forbid(unsafe_code)]

pub mod builder;
pub mod hash;
pub mod page;
pub mod page_builder;
pub mod value;

pub use builder::{
    ColumnBuilder, ColumnEncoding, FixedWidthColumnBuilder, RowColumnBuilder, RowValueWriter,
    VariableWidthColumnBuilder, new_column_builder,
};
pub use page::Page;
pub use page_builder::{PageBuilder, PageBuilderOptions};
pub use value::{append_value, read_u64};
