//! Append-only column builders.
//!
//! A [`ColumnBuilder`] is the mutable counterpart of an immutable Arrow column.
//! Values are appended entry by entry: raw writes (`write_byte`, `write_long`,
//! `write_bytes`, ...) accumulate the bytes of one entry and `close_entry`
//! seals it, while `append_null` adds a null entry in one call. Composite
//! values open a nested entry with `begin_entry`, fill it through the returned
//! builder, drop that builder, and then `close_entry` on the outer builder.
//!
//! Three concrete layouts cover the supported Arrow types:
//! - [`FixedWidthColumnBuilder`] for booleans, integers, floats and dates,
//! - [`VariableWidthColumnBuilder`] for `Utf8` and `Binary`,
//! - [`RowColumnBuilder`] for `Struct` (row-typed) columns, whose rows are
//!   populated through a transient [`RowValueWriter`].

mod fixed_width;
mod row;
mod row_writer;
mod variable_width;

pub use fixed_width::FixedWidthColumnBuilder;
pub use row::RowColumnBuilder;
pub use row_writer::RowValueWriter;
pub use variable_width::VariableWidthColumnBuilder;

use std::fmt;

use arrow::array::{Array, ArrayRef, BooleanBufferBuilder};
use arrow::buffer::NullBuffer;
use arrow::datatypes::{DataType, Fields};
use strata_result::{Error, Result as StrataResult};

/// Describes the physical layout a builder produces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnEncoding {
    /// Every entry occupies exactly `width` bytes.
    FixedWidth { data_type: DataType, width: usize },
    /// Entries are byte ranges addressed by 32-bit offsets.
    VariableWidth { data_type: DataType },
    /// One child column per field, aligned by position.
    Row { fields: Fields },
}

impl ColumnEncoding {
    /// Arrow data type of the column this encoding builds.
    pub fn data_type(&self) -> DataType {
        match self {
            ColumnEncoding::FixedWidth { data_type, .. }
            | ColumnEncoding::VariableWidth { data_type } => data_type.clone(),
            ColumnEncoding::Row { fields } => DataType::Struct(fields.clone()),
        }
    }
}

/// Mutable, append-only builder of one column.
///
/// Methods that a layout does not offer return [`Error::NotSupported`]; the
/// default implementations do exactly that, so each builder only overrides
/// the writes that make sense for it.
pub trait ColumnBuilder: fmt::Debug + Send {
    fn write_byte(&mut self, _value: i8) -> StrataResult<()> {
        Err(unsupported(self, "write_byte"))
    }

    fn write_short(&mut self, _value: i16) -> StrataResult<()> {
        Err(unsupported(self, "write_short"))
    }

    fn write_int(&mut self, _value: i32) -> StrataResult<()> {
        Err(unsupported(self, "write_int"))
    }

    fn write_long(&mut self, _value: i64) -> StrataResult<()> {
        Err(unsupported(self, "write_long"))
    }

    fn write_bytes(&mut self, _source: &[u8]) -> StrataResult<()> {
        Err(unsupported(self, "write_bytes"))
    }

    /// Append a whole composite value taken from a one-row array.
    fn write_object(&mut self, _value: &dyn Array) -> StrataResult<()> {
        Err(unsupported(self, "write_object"))
    }

    /// Open a nested entry and return the builder that populates it.
    ///
    /// The returned builder borrows `self`; drop it and call
    /// [`ColumnBuilder::close_entry`] to seal the entry.
    fn begin_entry(&mut self) -> StrataResult<Box<dyn ColumnBuilder + '_>> {
        Err(unsupported(self, "begin_entry"))
    }

    /// Seal the entry built up by the preceding writes.
    fn close_entry(&mut self) -> StrataResult<()>;

    fn append_null(&mut self) -> StrataResult<()>;

    /// Number of sealed entries.
    fn position_count(&self) -> StrataResult<usize>;

    /// Estimated logical size of the sealed entries.
    fn size_in_bytes(&self) -> usize;

    /// Memory held by the builder, including unused capacity.
    fn retained_size_in_bytes(&self) -> usize;

    /// Report the retained size of every part of this builder.
    fn retained_bytes_for_each_part(&self, consumer: &mut dyn FnMut(&str, usize));

    fn encoding(&self) -> StrataResult<ColumnEncoding>;

    /// Produce the immutable column and reset the builder to empty.
    fn build(&mut self) -> StrataResult<ArrayRef>;

    /// Create an empty builder producing the same column type.
    fn new_builder_like(&self, expected_entries: usize) -> StrataResult<Box<dyn ColumnBuilder>>;
}

fn unsupported<B: ColumnBuilder + ?Sized>(builder: &B, operation: &str) -> Error {
    match builder.encoding() {
        Ok(encoding) => Error::not_supported(format!(
            "{operation} on a {} column builder",
            encoding.data_type()
        )),
        Err(_) => Error::not_supported(format!("{operation} on {builder:?}")),
    }
}

/// Create an empty builder for `data_type`.
///
/// Struct types produce a [`RowColumnBuilder`] with one child builder per
/// field, created recursively.
pub fn new_column_builder(
    data_type: &DataType,
    expected_entries: usize,
) -> StrataResult<Box<dyn ColumnBuilder>> {
    if FixedWidthColumnBuilder::supports(data_type) {
        return Ok(Box::new(FixedWidthColumnBuilder::try_new(
            data_type.clone(),
            expected_entries,
        )?));
    }
    match data_type {
        DataType::Utf8 | DataType::Binary => Ok(Box::new(VariableWidthColumnBuilder::try_new(
            data_type.clone(),
            expected_entries,
        )?)),
        DataType::Struct(fields) => Ok(Box::new(RowColumnBuilder::try_new(
            fields.clone(),
            expected_entries,
        )?)),
        other => Err(Error::not_supported(format!(
            "no column builder for data type {other}"
        ))),
    }
}

/// Per-position validity shared by all builder layouts.
#[derive(Debug)]
pub(crate) struct Validity {
    bits: BooleanBufferBuilder,
    null_count: usize,
}

impl Validity {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            bits: BooleanBufferBuilder::new(capacity),
            null_count: 0,
        }
    }

    pub(crate) fn append(&mut self, is_valid: bool) {
        self.bits.append(is_valid);
        if !is_valid {
            self.null_count += 1;
        }
    }

    pub(crate) fn retained_size_in_bytes(&self) -> usize {
        self.bits.capacity().div_ceil(8)
    }

    /// Finish the bitmap; `None` when every entry is valid.
    pub(crate) fn finish(&mut self) -> Option<NullBuffer> {
        let bits = self.bits.finish();
        let null_count = std::mem::take(&mut self.null_count);
        (null_count > 0).then(|| NullBuffer::new(bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::Field;
    use std::sync::Arc;

    #[test]
    fn factory_picks_layout_by_type() -> StrataResult<()> {
        let fixed = new_column_builder(&DataType::Int64, 4)?;
        assert_eq!(
            fixed.encoding()?,
            ColumnEncoding::FixedWidth {
                data_type: DataType::Int64,
                width: 8
            }
        );

        let variable = new_column_builder(&DataType::Utf8, 4)?;
        assert_eq!(
            variable.encoding()?,
            ColumnEncoding::VariableWidth {
                data_type: DataType::Utf8
            }
        );

        let fields = Fields::from(vec![Arc::new(Field::new("a", DataType::Int32, true))]);
        let row = new_column_builder(&DataType::Struct(fields.clone()), 4)?;
        assert_eq!(row.encoding()?, ColumnEncoding::Row { fields });
        Ok(())
    }

    #[test]
    fn factory_rejects_unknown_types() {
        let err = new_column_builder(&DataType::LargeUtf8, 4).unwrap_err();
        assert!(matches!(err, Error::NotSupported(_)));
    }

    #[test]
    fn default_writes_report_not_supported() -> StrataResult<()> {
        let mut builder = new_column_builder(&DataType::Int32, 1)?;
        let err = builder.write_bytes(b"abc").unwrap_err();
        assert!(matches!(err, Error::NotSupported(msg) if msg.contains("write_bytes")));
        Ok(())
    }
}
