//! Output buffer assembling pages row by row.

use std::mem;

use arrow::datatypes::DataType;
use strata_result::{Error, Result as StrataResult};

use crate::builder::{ColumnBuilder, new_column_builder};
use crate::page::Page;

/// Sizing knobs for a [`PageBuilder`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageBuilderOptions {
    /// Flush threshold on the summed builder sizes.
    pub max_page_size_in_bytes: usize,
    /// Flush threshold on declared rows.
    pub max_row_count: usize,
    /// Initial capacity, in entries, of every column builder.
    pub expected_entries: usize,
}

impl Default for PageBuilderOptions {
    fn default() -> Self {
        Self {
            max_page_size_in_bytes: 1024 * 1024,
            max_row_count: 8192,
            expected_entries: 1024,
        }
    }
}

impl PageBuilderOptions {
    pub fn with_max_page_size_in_bytes(mut self, bytes: usize) -> Self {
        self.max_page_size_in_bytes = bytes;
        self
    }

    pub fn with_max_row_count(mut self, rows: usize) -> Self {
        self.max_row_count = rows;
        self
    }

    pub fn with_expected_entries(mut self, entries: usize) -> Self {
        self.expected_entries = entries;
        self
    }

    pub fn validate(&self) -> StrataResult<()> {
        if self.max_page_size_in_bytes == 0 {
            return Err(Error::InvalidArgumentError(
                "max_page_size_in_bytes must be > 0".to_string(),
            ));
        }
        if self.max_row_count == 0 {
            return Err(Error::InvalidArgumentError(
                "max_row_count must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builds pages by appending one value per channel and then declaring the row.
///
/// Writers append to [`PageBuilder::column_builder`] for every channel and
/// call [`PageBuilder::declare_position`] once the row is complete. `build`
/// checks that every channel received exactly the declared number of values.
#[derive(Debug)]
pub struct PageBuilder {
    types: Vec<DataType>,
    builders: Vec<Box<dyn ColumnBuilder>>,
    declared_positions: usize,
    options: PageBuilderOptions,
}

impl PageBuilder {
    pub fn try_new(types: Vec<DataType>, options: PageBuilderOptions) -> StrataResult<Self> {
        options.validate()?;
        let builders = types
            .iter()
            .map(|data_type| new_column_builder(data_type, options.expected_entries))
            .collect::<StrataResult<Vec<_>>>()?;
        Ok(Self {
            types,
            builders,
            declared_positions: 0,
            options,
        })
    }

    pub fn types(&self) -> &[DataType] {
        &self.types
    }

    pub fn channel_count(&self) -> usize {
        self.builders.len()
    }

    pub fn column_builder(&mut self, channel: usize) -> StrataResult<&mut dyn ColumnBuilder> {
        let channel_count = self.builders.len();
        let builder = self.builders.get_mut(channel).ok_or_else(|| {
            Error::InvalidArgumentError(format!(
                "output channel {channel} is out of range for a page of {channel_count} channels"
            ))
        })?;
        Ok(builder.as_mut())
    }

    pub fn declare_position(&mut self) {
        self.declared_positions += 1;
    }

    pub fn declare_positions(&mut self, positions: usize) {
        self.declared_positions += positions;
    }

    pub fn position_count(&self) -> usize {
        self.declared_positions
    }

    pub fn is_empty(&self) -> bool {
        self.declared_positions == 0
    }

    pub fn is_full(&self) -> bool {
        self.declared_positions >= self.options.max_row_count
            || self.size_in_bytes() >= self.options.max_page_size_in_bytes
    }

    pub fn size_in_bytes(&self) -> usize {
        self.builders.iter().map(|b| b.size_in_bytes()).sum()
    }

    pub fn retained_size_in_bytes(&self) -> usize {
        mem::size_of::<Self>()
            + self
                .builders
                .iter()
                .map(|b| b.retained_size_in_bytes())
                .sum::<usize>()
    }

    /// Build the declared rows into a page and leave the builder empty.
    pub fn build(&mut self) -> StrataResult<Page> {
        for (channel, builder) in self.builders.iter().enumerate() {
            let written = builder.position_count()?;
            if written != self.declared_positions {
                return Err(Error::protocol_violation(format!(
                    "output channel {channel} holds {written} values but {} rows were declared",
                    self.declared_positions
                )));
            }
        }
        let columns = self
            .builders
            .iter_mut()
            .map(|builder| builder.build())
            .collect::<StrataResult<Vec<_>>>()?;
        let position_count = mem::take(&mut self.declared_positions);
        tracing::trace!(
            position_count,
            channels = columns.len(),
            "built output page"
        );
        Page::try_new_with_position_count(position_count, columns)
    }

    /// Drop everything written since the last build.
    pub fn reset(&mut self) -> StrataResult<()> {
        for builder in self.builders.iter_mut() {
            *builder = builder.new_builder_like(self.options.expected_entries)?;
        }
        self.declared_positions = 0;
        Ok(())
    }
}
