use std::fmt;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef};
use arrow::datatypes::DataType;
use strata_column::value::is_fixed_width_u64;
use strata_column::{Page, PageBuilder, append_value, read_u64};
use strata_result::{Error, Result as StrataResult};

use crate::lookup::{JoinPosition, LookupSource};

/// Probe configuration shared by every page of one probe input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinProbeFactory {
    probe_output_channels: Arc<[usize]>,
    probe_join_channels: Arc<[usize]>,
    probe_hash_channel: Option<usize>,
}

impl JoinProbeFactory {
    /// `probe_output_channels` are projected into output channels `0..k` in
    /// the order given. `probe_join_channels` form the join key in order.
    pub fn new(
        probe_output_channels: Vec<usize>,
        probe_join_channels: Vec<usize>,
        probe_hash_channel: Option<usize>,
    ) -> Self {
        Self {
            probe_output_channels: probe_output_channels.into(),
            probe_join_channels: probe_join_channels.into(),
            probe_hash_channel,
        }
    }

    pub fn probe_output_channels(&self) -> &[usize] {
        &self.probe_output_channels
    }

    pub fn probe_join_channels(&self) -> &[usize] {
        &self.probe_join_channels
    }

    pub fn probe_hash_channel(&self) -> Option<usize> {
        self.probe_hash_channel
    }

    /// Bind a probe to `page`, positioned before its first row.
    pub fn create_join_probe(&self, page: Page) -> StrataResult<EqualityJoinProbe> {
        let channel_count = page.channel_count();
        for &channel in self.probe_output_channels.iter() {
            if channel >= channel_count {
                return Err(Error::InvalidArgumentError(format!(
                    "probe output channel {channel} out of range for a page of {channel_count} channels"
                )));
            }
        }
        for &channel in self.probe_join_channels.iter() {
            if channel >= channel_count {
                return Err(Error::InvalidArgumentError(format!(
                    "probe join channel {channel} out of range for a page of {channel_count} channels"
                )));
            }
        }

        let hash_column = match self.probe_hash_channel {
            Some(channel) => {
                let column = page.column(channel)?;
                if !is_fixed_width_u64(column.data_type()) {
                    return Err(Error::InvalidArgumentError(format!(
                        "probe hash channel {channel} must hold 64-bit hashes, got {}",
                        column.data_type()
                    )));
                }
                Some(Arc::clone(column))
            }
            None => None,
        };

        let key_page = page.select_channels(&self.probe_join_channels)?;
        tracing::trace!(
            position_count = page.position_count(),
            join_channels = ?self.probe_join_channels,
            hash_channel = ?self.probe_hash_channel,
            "created join probe"
        );

        Ok(EqualityJoinProbe {
            probe_output_channels: Arc::clone(&self.probe_output_channels),
            position_count: page.position_count(),
            page,
            key_page,
            hash_column,
            position: None,
        })
    }
}

/// Forward-only cursor over one probe page.
///
/// The cursor starts before the first row. Each successful
/// [`advance_next_position`](Self::advance_next_position) exposes the next row
/// to [`current_join_position`](Self::current_join_position) and
/// [`append_to`](Self::append_to).
pub struct EqualityJoinProbe {
    probe_output_channels: Arc<[usize]>,
    position_count: usize,
    page: Page,
    key_page: Page,
    hash_column: Option<ArrayRef>,
    position: Option<usize>,
}

impl EqualityJoinProbe {
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Join channels of the probe page, in key order.
    pub fn key_page(&self) -> &Page {
        &self.key_page
    }

    pub fn position_count(&self) -> usize {
        self.position_count
    }

    pub fn output_channel_count(&self) -> usize {
        self.probe_output_channels.len()
    }

    /// Types of the columns [`append_to`](Self::append_to) writes.
    pub fn output_types(&self) -> StrataResult<Vec<DataType>> {
        self.probe_output_channels
            .iter()
            .map(|&channel| Ok(self.page.column(channel)?.data_type().clone()))
            .collect()
    }

    /// Cursor position, `None` before the first advance. Stays at
    /// `position_count` once the page is exhausted.
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// Move to the next row; `false` once the page is exhausted.
    pub fn advance_next_position(&mut self) -> bool {
        let next = match self.position {
            None => 0,
            Some(position) => position.saturating_add(1).min(self.position_count),
        };
        self.position = Some(next);
        next < self.position_count
    }

    /// Resolve the current row against `lookup_source`.
    ///
    /// Returns `None` without consulting the lookup when any key column of the
    /// current row is NULL.
    pub fn current_join_position<L>(&self, lookup_source: &L) -> StrataResult<Option<JoinPosition>>
    where
        L: LookupSource + ?Sized,
    {
        let position = self.current_position()?;
        if self.current_row_contains_null(position) {
            return Ok(None);
        }
        match &self.hash_column {
            Some(hashes) => {
                let raw_hash = read_u64(hashes.as_ref(), position)?;
                lookup_source.join_position_with_hash(
                    position,
                    &self.key_page,
                    &self.page,
                    raw_hash,
                )
            }
            None => lookup_source.join_position(position, &self.key_page, &self.page),
        }
    }

    /// Copy the current row's output channels into `page_builder` channels
    /// `0..k`. Does not declare the output position.
    pub fn append_to(&self, page_builder: &mut PageBuilder) -> StrataResult<()> {
        let position = self.current_position()?;
        for (output_channel, &channel) in self.probe_output_channels.iter().enumerate() {
            let column = self.page.column(channel)?;
            append_value(
                column.as_ref(),
                position,
                page_builder.column_builder(output_channel)?,
            )?;
        }
        Ok(())
    }

    pub(crate) fn current_position(&self) -> StrataResult<usize> {
        match self.position {
            Some(position) if position < self.position_count => Ok(position),
            position => Err(Error::CursorOutOfRange {
                position,
                position_count: self.position_count,
            }),
        }
    }

    fn current_row_contains_null(&self, position: usize) -> bool {
        self.key_page
            .columns()
            .iter()
            .any(|column| column.is_null(position))
    }
}

impl fmt::Debug for EqualityJoinProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EqualityJoinProbe")
            .field("position", &self.position)
            .field("position_count", &self.position_count)
            .field("output_channels", &self.probe_output_channels)
            .field("key_channels", &self.key_page.channel_count())
            .field("has_hash_channel", &self.hash_column.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int32Array, Int64Array};

    fn two_column_page() -> StrataResult<Page> {
        Page::try_new(vec![
            Arc::new(Int64Array::from(vec![Some(1), None, Some(3)])) as ArrayRef,
            Arc::new(Int32Array::from(vec![10, 20, 30])) as ArrayRef,
        ])
    }

    #[test]
    fn cursor_advances_then_sticks_at_the_end() -> StrataResult<()> {
        let factory = JoinProbeFactory::new(vec![1], vec![0], None);
        let mut probe = factory.create_join_probe(two_column_page()?)?;
        assert_eq!(probe.position(), None);
        assert!(matches!(
            probe.current_position(),
            Err(Error::CursorOutOfRange { position: None, .. })
        ));

        assert!(probe.advance_next_position());
        assert!(probe.advance_next_position());
        assert!(probe.advance_next_position());
        assert_eq!(probe.position(), Some(2));
        assert!(!probe.advance_next_position());
        assert!(!probe.advance_next_position());
        assert_eq!(probe.position(), Some(3));
        assert!(probe.current_position().is_err());
        Ok(())
    }

    #[test]
    fn empty_pages_never_yield_a_row() -> StrataResult<()> {
        let page = Page::try_new(vec![Arc::new(Int64Array::from(Vec::<i64>::new())) as ArrayRef])?;
        let mut probe = JoinProbeFactory::new(vec![0], vec![0], None).create_join_probe(page)?;
        assert!(!probe.advance_next_position());
        assert_eq!(probe.position(), Some(0));
        Ok(())
    }

    #[test]
    fn invalid_channels_are_rejected() -> StrataResult<()> {
        let output = JoinProbeFactory::new(vec![2], vec![0], None);
        assert!(matches!(
            output.create_join_probe(two_column_page()?),
            Err(Error::InvalidArgumentError(_))
        ));

        let join = JoinProbeFactory::new(vec![0], vec![5], None);
        assert!(join.create_join_probe(two_column_page()?).is_err());

        // Int32 cannot carry a 64-bit hash
        let hash = JoinProbeFactory::new(vec![0], vec![0], Some(1));
        assert!(hash.create_join_probe(two_column_page()?).is_err());
        Ok(())
    }

    #[test]
    fn key_page_holds_join_channels_in_key_order() -> StrataResult<()> {
        let factory = JoinProbeFactory::new(vec![0], vec![1, 0], None);
        let probe = factory.create_join_probe(two_column_page()?)?;
        assert_eq!(probe.key_page().channel_count(), 2);
        assert_eq!(probe.key_page().columns()[0].data_type(), &DataType::Int32);
        assert_eq!(probe.output_types()?, vec![DataType::Int64]);
        Ok(())
    }
}
