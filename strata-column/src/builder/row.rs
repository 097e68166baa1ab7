use std::mem;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, StructArray};
use arrow::datatypes::Fields;
use strata_result::{Error, Result as StrataResult};

use super::{ColumnBuilder, ColumnEncoding, RowValueWriter, Validity, new_column_builder};
use crate::value::append_value;

/// Builder for row-typed (`Struct`) columns.
///
/// Rows are stored as one child builder per field, aligned by position: a
/// null row still appends a null to every child. A row is written by opening
/// a [`RowValueWriter`] with [`RowColumnBuilder::begin_row`], filling every
/// field through it, dropping it, and calling `close_entry`, which checks that
/// every field received exactly one entry.
#[derive(Debug)]
pub struct RowColumnBuilder {
    fields: Fields,
    field_builders: Vec<Box<dyn ColumnBuilder>>,
    validity: Validity,
    position_count: usize,
    entry_open: bool,
}

impl RowColumnBuilder {
    pub fn try_new(fields: Fields, expected_entries: usize) -> StrataResult<Self> {
        if fields.is_empty() {
            return Err(Error::InvalidArgumentError(
                "row column requires at least one field".into(),
            ));
        }
        let field_builders = fields
            .iter()
            .map(|field| new_column_builder(field.data_type(), expected_entries))
            .collect::<StrataResult<Vec<_>>>()?;
        Ok(Self {
            fields,
            field_builders,
            validity: Validity::with_capacity(expected_entries),
            position_count: 0,
            entry_open: false,
        })
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Open the next row and return the writer that populates its fields.
    pub fn begin_row(&mut self) -> StrataResult<RowValueWriter<'_>> {
        if self.entry_open {
            return Err(Error::protocol_violation(format!(
                "row {} is still open; close it before beginning another",
                self.position_count
            )));
        }
        self.entry_open = true;
        Ok(RowValueWriter::new(
            self.position_count,
            &mut self.field_builders,
        ))
    }

    fn ensure_closed(&self, operation: &str) -> StrataResult<()> {
        if self.entry_open {
            return Err(Error::protocol_violation(format!(
                "{operation} while row {} is open",
                self.position_count
            )));
        }
        Ok(())
    }
}

impl ColumnBuilder for RowColumnBuilder {
    /// Append the single row of a one-row `StructArray` whose field types
    /// match this builder's.
    fn write_object(&mut self, value: &dyn Array) -> StrataResult<()> {
        self.ensure_closed("write_object")?;
        let row = value
            .as_any()
            .downcast_ref::<StructArray>()
            .ok_or_else(|| {
                Error::InvalidArgumentError(format!(
                    "row value must be a struct array, got {}",
                    value.data_type()
                ))
            })?;
        if row.len() != 1 || row.num_columns() != self.field_builders.len() {
            return Err(Error::InvalidArgumentError(format!(
                "row value must hold one row of {} fields, got {} rows of {} fields",
                self.field_builders.len(),
                row.len(),
                row.num_columns()
            )));
        }
        // every child is checked before any is written so a rejected value
        // leaves the children aligned
        for (field, column) in self.fields.iter().zip(row.columns()) {
            if column.data_type() != field.data_type() {
                return Err(Error::InvalidArgumentError(format!(
                    "row field '{}' is {}, got a {} value",
                    field.name(),
                    field.data_type(),
                    column.data_type()
                )));
            }
        }
        if row.is_null(0) {
            return self.append_null();
        }
        for (column, builder) in row.columns().iter().zip(self.field_builders.iter_mut()) {
            append_value(column.as_ref(), 0, builder.as_mut())?;
        }
        self.validity.append(true);
        self.position_count += 1;
        Ok(())
    }

    fn begin_entry(&mut self) -> StrataResult<Box<dyn ColumnBuilder + '_>> {
        Ok(Box::new(self.begin_row()?))
    }

    fn close_entry(&mut self) -> StrataResult<()> {
        if !self.entry_open {
            return Err(Error::protocol_violation(
                "close_entry without an open row",
            ));
        }
        let expected = self.position_count + 1;
        for (field, builder) in self.fields.iter().zip(self.field_builders.iter()) {
            let actual = builder.position_count()?;
            if actual != expected {
                tracing::debug!(
                    field = field.name().as_str(),
                    expected,
                    actual,
                    "row closed with a field written zero or several times"
                );
                return Err(Error::protocol_violation(format!(
                    "field '{}' of row {} holds {} entries, expected {}",
                    field.name(),
                    self.position_count,
                    actual,
                    expected
                )));
            }
        }
        self.validity.append(true);
        self.position_count += 1;
        self.entry_open = false;
        Ok(())
    }

    fn append_null(&mut self) -> StrataResult<()> {
        self.ensure_closed("append_null")?;
        for builder in self.field_builders.iter_mut() {
            builder.append_null()?;
        }
        self.validity.append(false);
        self.position_count += 1;
        Ok(())
    }

    fn position_count(&self) -> StrataResult<usize> {
        Ok(self.position_count)
    }

    fn size_in_bytes(&self) -> usize {
        // one null flag per row on top of the fields
        self.position_count
            + self
                .field_builders
                .iter()
                .map(|builder| builder.size_in_bytes())
                .sum::<usize>()
    }

    fn retained_size_in_bytes(&self) -> usize {
        mem::size_of::<Self>()
            + self.validity.retained_size_in_bytes()
            + self
                .field_builders
                .iter()
                .map(|builder| builder.retained_size_in_bytes())
                .sum::<usize>()
    }

    fn retained_bytes_for_each_part(&self, consumer: &mut dyn FnMut(&str, usize)) {
        for (field, builder) in self.fields.iter().zip(self.field_builders.iter()) {
            consumer(field.name(), builder.retained_size_in_bytes());
        }
        consumer("validity", self.validity.retained_size_in_bytes());
        consumer("builder", mem::size_of::<Self>());
    }

    fn encoding(&self) -> StrataResult<ColumnEncoding> {
        Ok(ColumnEncoding::Row {
            fields: self.fields.clone(),
        })
    }

    fn build(&mut self) -> StrataResult<ArrayRef> {
        self.ensure_closed("build")?;
        let children = self
            .field_builders
            .iter_mut()
            .map(|builder| builder.build())
            .collect::<StrataResult<Vec<_>>>()?;
        let nulls = self.validity.finish();
        self.position_count = 0;
        Ok(Arc::new(StructArray::try_new(
            self.fields.clone(),
            children,
            nulls,
        )?))
    }

    fn new_builder_like(&self, expected_entries: usize) -> StrataResult<Box<dyn ColumnBuilder>> {
        Ok(Box::new(Self::try_new(self.fields.clone(), expected_entries)?))
    }
}
