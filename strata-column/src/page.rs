//! Immutable columnar batches.

use std::sync::Arc;

use arrow::array::{ArrayRef, RecordBatch};
use arrow::datatypes::SchemaRef;
use strata_result::{Error, Result as StrataResult};

/// An ordered set of columns sharing one position count.
///
/// Columns are shared Arrow arrays; cloning a page or selecting a subset of
/// its channels copies references, never values. A page may carry a position
/// count without any column (for example the probe page of a join that
/// projects nothing).
#[derive(Clone, Debug)]
pub struct Page {
    columns: Arc<[ArrayRef]>,
    position_count: usize,
}

impl Page {
    /// Create a page whose position count is the shared length of `columns`.
    ///
    /// An empty column list produces an empty page.
    pub fn try_new(columns: Vec<ArrayRef>) -> StrataResult<Self> {
        let position_count = columns.first().map_or(0, |column| column.len());
        Self::try_new_with_position_count(position_count, columns)
    }

    pub fn try_new_with_position_count(
        position_count: usize,
        columns: Vec<ArrayRef>,
    ) -> StrataResult<Self> {
        if let Some((channel, column)) = columns
            .iter()
            .enumerate()
            .find(|(_, column)| column.len() != position_count)
        {
            return Err(Error::InvalidArgumentError(format!(
                "page column {channel} has {} positions, expected {position_count}",
                column.len()
            )));
        }
        Ok(Self {
            columns: columns.into(),
            position_count,
        })
    }

    pub fn position_count(&self) -> usize {
        self.position_count
    }

    pub fn channel_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.position_count == 0
    }

    pub fn columns(&self) -> &[ArrayRef] {
        &self.columns
    }

    pub fn column(&self, channel: usize) -> StrataResult<&ArrayRef> {
        self.columns.get(channel).ok_or_else(|| {
            Error::InvalidArgumentError(format!(
                "channel {channel} is out of range for a page of {} channels",
                self.columns.len()
            ))
        })
    }

    /// Page view over `channels`, in the given order, sharing the columns.
    pub fn select_channels(&self, channels: &[usize]) -> StrataResult<Page> {
        let columns = channels
            .iter()
            .map(|&channel| self.column(channel).map(Arc::clone))
            .collect::<StrataResult<Vec<_>>>()?;
        Ok(Page {
            columns: columns.into(),
            position_count: self.position_count,
        })
    }

    /// Memory held by the column buffers.
    pub fn size_in_bytes(&self) -> usize {
        self.columns
            .iter()
            .map(|column| column.get_array_memory_size())
            .sum()
    }

    pub fn into_record_batch(self, schema: SchemaRef) -> StrataResult<RecordBatch> {
        Ok(RecordBatch::try_new(schema, self.columns.to_vec())?)
    }
}

impl From<&RecordBatch> for Page {
    fn from(batch: &RecordBatch) -> Self {
        Self {
            columns: batch.columns().into(),
            position_count: batch.num_rows(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};

    fn sample() -> StrataResult<Page> {
        Page::try_new(vec![
            Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef,
            Arc::new(StringArray::from(vec!["a", "b", "c"])) as ArrayRef,
        ])
    }

    #[test]
    fn rejects_columns_of_different_lengths() {
        let err = Page::try_new(vec![
            Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef,
            Arc::new(Int64Array::from(vec![1])) as ArrayRef,
        ])
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgumentError(msg) if msg.contains("column 1")));
    }

    #[test]
    fn select_channels_shares_columns() -> StrataResult<()> {
        let page = sample()?;
        let selected = page.select_channels(&[1, 0, 1])?;
        assert_eq!(selected.channel_count(), 3);
        assert_eq!(selected.position_count(), 3);
        assert!(Arc::ptr_eq(selected.column(0)?, page.column(1)?));
        assert!(Arc::ptr_eq(selected.column(1)?, page.column(0)?));
        assert!(page.select_channels(&[2]).is_err());
        Ok(())
    }

    #[test]
    fn zero_channel_page_keeps_its_position_count() -> StrataResult<()> {
        let page = Page::try_new_with_position_count(5, Vec::new())?;
        assert_eq!(page.position_count(), 5);
        assert_eq!(page.channel_count(), 0);
        assert_eq!(page.select_channels(&[])?.position_count(), 5);
        Ok(())
    }

    #[test]
    fn converts_to_and_from_record_batches() -> StrataResult<()> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, false),
        ]));
        let batch = sample()?.into_record_batch(Arc::clone(&schema))?;
        assert_eq!(batch.num_rows(), 3);
        let page = Page::from(&batch);
        assert_eq!(page.column(1)?.len(), 3);
        Ok(())
    }
}
