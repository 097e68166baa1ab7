//! Inner-join driver over a probe factory and a lookup source.

use strata_column::{Page, PageBuilder};
use strata_result::Result as StrataResult;

use crate::lookup::LookupSource;
use crate::probe::JoinProbeFactory;
use crate::{JoinOptions, validate_join_options};

/// Joins probe pages against a [`LookupSource`].
///
/// Output rows carry the probe output channels first, followed by every build
/// channel. Probe rows are emitted in page order and, for one probe row,
/// matches follow the lookup's chain order.
pub struct LookupJoiner<'a, L: LookupSource + ?Sized> {
    lookup_source: &'a L,
    probe_factory: JoinProbeFactory,
    options: JoinOptions,
}

impl<'a, L: LookupSource + ?Sized> LookupJoiner<'a, L> {
    pub fn try_new(
        lookup_source: &'a L,
        probe_factory: JoinProbeFactory,
        options: JoinOptions,
    ) -> StrataResult<Self> {
        validate_join_options(&options)?;
        Ok(Self {
            lookup_source,
            probe_factory,
            options,
        })
    }

    pub fn options(&self) -> &JoinOptions {
        &self.options
    }

    /// Join one probe page, returning the output pages in order.
    pub fn join_page(&self, page: Page) -> StrataResult<Vec<Page>> {
        let mut output = Vec::new();
        self.join_page_with(page, |joined| {
            output.push(joined);
            Ok(())
        })?;
        Ok(output)
    }

    /// Join every page of `pages` in order.
    pub fn join_pages<I>(&self, pages: I) -> StrataResult<Vec<Page>>
    where
        I: IntoIterator<Item = Page>,
    {
        let mut output = Vec::new();
        for page in pages {
            self.join_page_with(page, |joined| {
                output.push(joined);
                Ok(())
            })?;
        }
        Ok(output)
    }

    /// Join one probe page, handing each full output page to `on_page`.
    pub fn join_page_with<F>(&self, page: Page, mut on_page: F) -> StrataResult<()>
    where
        F: FnMut(Page) -> StrataResult<()>,
    {
        let mut probe = self.probe_factory.create_join_probe(page)?;
        let build_offset = probe.output_channel_count();
        let mut types = probe.output_types()?;
        types.extend_from_slice(self.lookup_source.output_types());
        let mut builder = PageBuilder::try_new(types, self.options.page_builder_options())?;

        let mut matched_rows = 0usize;
        while probe.advance_next_position() {
            let probe_position = probe.current_position()?;
            let mut join_position = probe.current_join_position(self.lookup_source)?;
            while let Some(build_position) = join_position {
                probe.append_to(&mut builder)?;
                self.lookup_source
                    .append_to(build_position, &mut builder, build_offset)?;
                builder.declare_position();
                matched_rows += 1;
                if builder.is_full() {
                    on_page(builder.build()?)?;
                }
                join_position = self.lookup_source.next_join_position(
                    build_position,
                    probe_position,
                    probe.page(),
                )?;
            }
        }
        if !builder.is_empty() {
            on_page(builder.build()?)?;
        }

        tracing::trace!(
            probe_rows = probe.position_count(),
            matched_rows,
            "joined probe page"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PagesHashLookupSource;
    use arrow::array::{Array, ArrayRef, Int64Array};
    use arrow::datatypes::DataType;
    use std::sync::Arc;

    fn int_page(values: Vec<Option<i64>>) -> StrataResult<Page> {
        Page::try_new(vec![Arc::new(Int64Array::from(values)) as ArrayRef])
    }

    #[test]
    fn output_pages_respect_batch_size() -> StrataResult<()> {
        let lookup = PagesHashLookupSource::try_new(
            vec![DataType::Int64],
            vec![0],
            vec![int_page(vec![Some(1), Some(1), Some(1)])?],
        )?;
        let joiner = LookupJoiner::try_new(
            &lookup,
            JoinProbeFactory::new(vec![0], vec![0], None),
            JoinOptions::default().with_batch_size(2),
        )?;
        let pages = joiner.join_page(int_page(vec![Some(1), None, Some(1)])?)?;
        let counts: Vec<usize> = pages.iter().map(Page::position_count).collect();
        assert_eq!(counts, vec![2, 2, 2]);
        for page in &pages {
            assert_eq!(page.channel_count(), 2);
            assert_eq!(page.column(0)?.null_count(), 0);
        }
        Ok(())
    }

    #[test]
    fn invalid_options_are_rejected() -> StrataResult<()> {
        let lookup = PagesHashLookupSource::try_new(vec![DataType::Int64], vec![0], Vec::new())?;
        let result = LookupJoiner::try_new(
            &lookup,
            JoinProbeFactory::new(vec![0], vec![0], None),
            JoinOptions::default().with_batch_size(0),
        );
        assert!(result.is_err());
        Ok(())
    }
}
