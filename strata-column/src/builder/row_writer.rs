//! Transient writer that populates one row of a row-typed column.
//!
//! A [`RowValueWriter`] borrows the field builders of its enclosing
//! [`RowColumnBuilder`](super::RowColumnBuilder) for exactly one row. Each field
//! must receive exactly one entry (a value or a null) through one of two
//! mutually exclusive modes:
//!
//! - **sequential**: the writer itself behaves like a column builder. Raw
//!   writes target the current field, and every completing call
//!   (`close_entry`, `append_null`) moves on to the next field.
//! - **random access**: [`RowValueWriter::field_builder`] hands out the field
//!   builders directly and the caller writes each of them once.
//!
//! Random access is only granted before any sequential call has been accepted
//! by a field builder; once granted,
//! sequential calls and `position_count` fail. The writer owns no storage and
//! cannot build a column: it is dropped when the row is complete, after which
//! the enclosing builder's `close_entry` records the row.

use std::fmt;
use std::mem;

use arrow::array::{Array, ArrayRef};
use strata_result::{Error, Result as StrataResult};

use super::{ColumnBuilder, ColumnEncoding};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WriteMode {
    /// Nothing written yet; either mode may be chosen.
    Fresh,
    /// Sequential writes target `next_field`.
    Sequential { next_field: usize },
    /// Field builders were handed out; the caller writes them directly.
    RandomAccess,
}

pub struct RowValueWriter<'a> {
    start_offset: usize,
    field_builders: &'a mut [Box<dyn ColumnBuilder>],
    initial_size_in_bytes: usize,
    positions_written: usize,
    mode: WriteMode,
}

impl<'a> RowValueWriter<'a> {
    pub(crate) fn new(start_offset: usize, field_builders: &'a mut [Box<dyn ColumnBuilder>]) -> Self {
        let initial_size_in_bytes = field_builders
            .iter()
            .map(|builder| builder.size_in_bytes())
            .sum();
        Self {
            start_offset,
            field_builders,
            initial_size_in_bytes,
            positions_written: 0,
            mode: WriteMode::Fresh,
        }
    }

    /// Position of the row being written within the enclosing row column.
    pub fn start_offset(&self) -> usize {
        self.start_offset
    }

    pub fn num_fields(&self) -> usize {
        self.field_builders.len()
    }

    /// Obtain the builder of field `field_index` for random-access writing.
    ///
    /// Each field builder must be written exactly once. Field builders can
    /// only be obtained before any sequential write; once one is obtained,
    /// sequential writes are rejected for the rest of the writer's life.
    pub fn field_builder(&mut self, field_index: usize) -> StrataResult<&mut dyn ColumnBuilder> {
        if let WriteMode::Sequential { .. } = self.mode {
            return Err(Error::protocol_violation(
                "field builder can only be obtained before any sequential write",
            ));
        }
        if field_index >= self.field_builders.len() {
            return Err(Error::InvalidArgumentError(format!(
                "field index {field_index} is out of range for a row of {} fields",
                self.field_builders.len()
            )));
        }
        self.mode = WriteMode::RandomAccess;
        Ok(self.field_builders[field_index].as_mut())
    }

    /// Validate a sequential call and return the field it targets. The mode
    /// only changes once the field builder accepted the call.
    fn sequential_field(&self) -> StrataResult<usize> {
        let next_field = match self.mode {
            WriteMode::RandomAccess => {
                return Err(Error::protocol_violation(
                    "cannot do sequential write after field_builder was called",
                ));
            }
            WriteMode::Fresh => 0,
            WriteMode::Sequential { next_field } => next_field,
        };
        if next_field >= self.field_builders.len() {
            return Err(Error::protocol_violation(format!(
                "all {} fields of row {} are already written",
                self.field_builders.len(),
                self.start_offset
            )));
        }
        Ok(next_field)
    }

    fn write_field(
        &mut self,
        write: impl FnOnce(&mut dyn ColumnBuilder) -> StrataResult<()>,
    ) -> StrataResult<()> {
        let field = self.sequential_field()?;
        write(self.field_builders[field].as_mut())?;
        self.mode = WriteMode::Sequential { next_field: field };
        Ok(())
    }

    fn complete_field(
        &mut self,
        complete: impl FnOnce(&mut dyn ColumnBuilder) -> StrataResult<()>,
    ) -> StrataResult<()> {
        let field = self.sequential_field()?;
        complete(self.field_builders[field].as_mut())?;
        self.mode = WriteMode::Sequential {
            next_field: field + 1,
        };
        self.positions_written += 1;
        Ok(())
    }
}

impl ColumnBuilder for RowValueWriter<'_> {
    fn write_byte(&mut self, value: i8) -> StrataResult<()> {
        self.write_field(|builder| builder.write_byte(value))
    }

    fn write_short(&mut self, value: i16) -> StrataResult<()> {
        self.write_field(|builder| builder.write_short(value))
    }

    fn write_int(&mut self, value: i32) -> StrataResult<()> {
        self.write_field(|builder| builder.write_int(value))
    }

    fn write_long(&mut self, value: i64) -> StrataResult<()> {
        self.write_field(|builder| builder.write_long(value))
    }

    fn write_bytes(&mut self, source: &[u8]) -> StrataResult<()> {
        self.write_field(|builder| builder.write_bytes(source))
    }

    fn write_object(&mut self, value: &dyn Array) -> StrataResult<()> {
        self.write_field(|builder| builder.write_object(value))
    }

    fn begin_entry(&mut self) -> StrataResult<Box<dyn ColumnBuilder + '_>> {
        let field = self.sequential_field()?;
        let entry = self.field_builders[field].begin_entry()?;
        self.mode = WriteMode::Sequential { next_field: field };
        Ok(entry)
    }

    fn close_entry(&mut self) -> StrataResult<()> {
        self.complete_field(|builder| builder.close_entry())
    }

    fn append_null(&mut self) -> StrataResult<()> {
        self.complete_field(|builder| builder.append_null())
    }

    fn position_count(&self) -> StrataResult<usize> {
        if self.mode == WriteMode::RandomAccess {
            return Err(Error::protocol_violation(
                "position count is undefined once field builders were returned",
            ));
        }
        Ok(self.positions_written)
    }

    fn size_in_bytes(&self) -> usize {
        let current: usize = self
            .field_builders
            .iter()
            .map(|builder| builder.size_in_bytes())
            .sum();
        current.saturating_sub(self.initial_size_in_bytes)
    }

    fn retained_size_in_bytes(&self) -> usize {
        mem::size_of::<Self>()
            + self
                .field_builders
                .iter()
                .map(|builder| builder.retained_size_in_bytes())
                .sum::<usize>()
    }

    fn retained_bytes_for_each_part(&self, consumer: &mut dyn FnMut(&str, usize)) {
        for builder in self.field_builders.iter() {
            consumer("field", builder.retained_size_in_bytes());
        }
        consumer("row_value_writer", mem::size_of::<Self>());
    }

    fn encoding(&self) -> StrataResult<ColumnEncoding> {
        Err(Error::not_supported(
            "a row value writer has no encoding; ask the enclosing row builder",
        ))
    }

    fn build(&mut self) -> StrataResult<ArrayRef> {
        Err(Error::not_supported(
            "a row value writer cannot build a column; build the enclosing row builder",
        ))
    }

    fn new_builder_like(&self, _expected_entries: usize) -> StrataResult<Box<dyn ColumnBuilder>> {
        Err(Error::not_supported(
            "a row value writer cannot create sibling builders",
        ))
    }
}

impl fmt::Debug for RowValueWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            WriteMode::RandomAccess => write!(
                f,
                "RowValueWriter{{fields={}, start_offset={}, field_builder_returned=true}}",
                self.field_builders.len(),
                self.start_offset
            ),
            _ => write!(
                f,
                "RowValueWriter{{fields={}, start_offset={}, field_builder_returned=false, position_count={}}}",
                self.field_builders.len(),
                self.start_offset,
                self.positions_written
            ),
        }
    }
}
