//! In-memory build side backed by a list of pages.
//!
//! Build rows are grouped by key: a bucket map keyed by the key hash points at
//! distinct keys, and each key chains its rows in build order through a
//! position link table. Keys are compared in Arrow's row format so that
//! multi-column keys of any supported type compare by value. Build rows with
//! a NULL key are never reachable.

use std::fmt;

use arrow::array::{Array, ArrayRef};
use arrow::datatypes::DataType;
use arrow::row::{OwnedRow, RowConverter, SortField};
use rustc_hash::FxHashMap;
use strata_column::hash::hash_position;
use strata_column::{Page, PageBuilder, append_value};
use strata_result::{Error, Result as StrataResult};

use crate::lookup::{JoinPosition, LookupSource};

struct KeyEntry {
    key: OwnedRow,
    first: JoinPosition,
    last: JoinPosition,
}

pub struct PagesHashLookupSource {
    types: Vec<DataType>,
    key_channels: Vec<usize>,
    pages: Vec<Page>,
    converter: RowConverter,
    entries: Vec<KeyEntry>,
    buckets: FxHashMap<u64, Vec<usize>>,
    position_links: FxHashMap<JoinPosition, JoinPosition>,
}

impl PagesHashLookupSource {
    /// Index `pages`, whose columns must have `types`, on `key_channels`.
    pub fn try_new(
        types: Vec<DataType>,
        key_channels: Vec<usize>,
        pages: Vec<Page>,
    ) -> StrataResult<Self> {
        let sort_fields = key_channels
            .iter()
            .map(|&channel| {
                types.get(channel).cloned().map(SortField::new).ok_or_else(|| {
                    Error::InvalidArgumentError(format!(
                        "build key channel {channel} out of range for {} build channels",
                        types.len()
                    ))
                })
            })
            .collect::<StrataResult<Vec<_>>>()?;
        let converter = RowConverter::new(sort_fields)?;

        let mut entries: Vec<KeyEntry> = Vec::new();
        let mut buckets: FxHashMap<u64, Vec<usize>> = FxHashMap::default();
        let mut position_links = FxHashMap::default();
        let mut indexed_rows = 0usize;
        let mut null_key_rows = 0usize;

        for (page_index, page) in pages.iter().enumerate() {
            check_page_types(page_index, page, &types)?;
            let key_page = page.select_channels(&key_channels)?;
            let rows = converter.convert_columns(key_page.columns())?;

            for position in 0..page.position_count() {
                if key_page
                    .columns()
                    .iter()
                    .any(|column| column.is_null(position))
                {
                    null_key_rows += 1;
                    continue;
                }
                let join_position = JoinPosition::try_from_parts(page_index, position)?;
                let hash = hash_position(key_page.columns(), position)?;
                let key = rows.row(position);
                let bucket = buckets.entry(hash).or_default();
                let existing = bucket
                    .iter()
                    .copied()
                    .find(|&entry| entries[entry].key.row() == key);
                match existing {
                    Some(entry) => {
                        let entry = &mut entries[entry];
                        position_links.insert(entry.last, join_position);
                        entry.last = join_position;
                    }
                    None => {
                        bucket.push(entries.len());
                        entries.push(KeyEntry {
                            key: key.owned(),
                            first: join_position,
                            last: join_position,
                        });
                    }
                }
                indexed_rows += 1;
            }
        }

        tracing::debug!(
            pages = pages.len(),
            indexed_rows,
            null_key_rows,
            distinct_keys = entries.len(),
            "built pages hash lookup source"
        );

        Ok(Self {
            types,
            key_channels,
            pages,
            converter,
            entries,
            buckets,
            position_links,
        })
    }

    pub fn key_channels(&self) -> &[usize] {
        &self.key_channels
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Total build rows, including those with a NULL key.
    pub fn position_count(&self) -> usize {
        self.pages.iter().map(Page::position_count).sum()
    }

    pub fn distinct_key_count(&self) -> usize {
        self.entries.len()
    }

    fn find(
        &self,
        position: usize,
        key_page: &Page,
        raw_hash: u64,
    ) -> StrataResult<Option<JoinPosition>> {
        let Some(bucket) = self.buckets.get(&raw_hash) else {
            return Ok(None);
        };
        if key_page.channel_count() != self.key_channels.len() {
            return Err(Error::InvalidArgumentError(format!(
                "probe key has {} columns, build key has {}",
                key_page.channel_count(),
                self.key_channels.len()
            )));
        }
        let probe_key: Vec<ArrayRef> = key_page
            .columns()
            .iter()
            .map(|column| column.slice(position, 1))
            .collect();
        let rows = self.converter.convert_columns(&probe_key)?;
        let probe_row = rows.row(0);
        Ok(bucket
            .iter()
            .map(|&entry| &self.entries[entry])
            .find(|entry| entry.key.row() == probe_row)
            .map(|entry| entry.first))
    }
}

fn check_page_types(page_index: usize, page: &Page, types: &[DataType]) -> StrataResult<()> {
    if page.channel_count() != types.len() {
        return Err(Error::InvalidArgumentError(format!(
            "build page {page_index} has {} channels, expected {}",
            page.channel_count(),
            types.len()
        )));
    }
    for (channel, (column, expected)) in page.columns().iter().zip(types).enumerate() {
        if column.data_type() != expected {
            return Err(Error::InvalidArgumentError(format!(
                "build page {page_index} channel {channel} is {}, expected {expected}",
                column.data_type()
            )));
        }
    }
    Ok(())
}

impl LookupSource for PagesHashLookupSource {
    fn channel_count(&self) -> usize {
        self.types.len()
    }

    fn output_types(&self) -> &[DataType] {
        &self.types
    }

    fn join_position(
        &self,
        position: usize,
        key_page: &Page,
        _all_page: &Page,
    ) -> StrataResult<Option<JoinPosition>> {
        let raw_hash = hash_position(key_page.columns(), position)?;
        self.find(position, key_page, raw_hash)
    }

    fn join_position_with_hash(
        &self,
        position: usize,
        key_page: &Page,
        _all_page: &Page,
        raw_hash: u64,
    ) -> StrataResult<Option<JoinPosition>> {
        self.find(position, key_page, raw_hash)
    }

    fn next_join_position(
        &self,
        current: JoinPosition,
        _probe_position: usize,
        _all_probe_page: &Page,
    ) -> StrataResult<Option<JoinPosition>> {
        Ok(self.position_links.get(&current).copied())
    }

    fn append_to(
        &self,
        position: JoinPosition,
        page_builder: &mut PageBuilder,
        output_channel_offset: usize,
    ) -> StrataResult<()> {
        let page = self.pages.get(position.page_index()).ok_or_else(|| {
            Error::InvalidArgumentError(format!("no build page for {position:?}"))
        })?;
        if position.position() >= page.position_count() {
            return Err(Error::InvalidArgumentError(format!(
                "{position:?} is past the end of a build page of {} rows",
                page.position_count()
            )));
        }
        for (channel, column) in page.columns().iter().enumerate() {
            append_value(
                column.as_ref(),
                position.position(),
                page_builder.column_builder(output_channel_offset + channel)?,
            )?;
        }
        Ok(())
    }
}

impl fmt::Debug for PagesHashLookupSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagesHashLookupSource")
            .field("types", &self.types)
            .field("key_channels", &self.key_channels)
            .field("pages", &self.pages.len())
            .field("distinct_keys", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use std::sync::Arc;
    use strata_column::hash::hash_columns;

    fn build_pages() -> StrataResult<Vec<Page>> {
        Ok(vec![
            Page::try_new(vec![
                Arc::new(Int64Array::from(vec![Some(1), Some(2), None])) as ArrayRef,
                Arc::new(StringArray::from(vec!["a", "b", "null-key"])) as ArrayRef,
            ])?,
            Page::try_new(vec![
                Arc::new(Int64Array::from(vec![Some(1)])) as ArrayRef,
                Arc::new(StringArray::from(vec!["c"])) as ArrayRef,
            ])?,
        ])
    }

    fn lookup() -> StrataResult<PagesHashLookupSource> {
        PagesHashLookupSource::try_new(vec![DataType::Int64, DataType::Utf8], vec![0], build_pages()?)
    }

    #[test]
    fn duplicate_keys_chain_in_build_order() -> StrataResult<()> {
        let lookup = lookup()?;
        assert_eq!(lookup.distinct_key_count(), 2);
        assert_eq!(lookup.position_count(), 4);

        let probe = Page::try_new(vec![Arc::new(Int64Array::from(vec![1])) as ArrayRef])?;
        let first = lookup.join_position(0, &probe, &probe)?;
        assert_eq!(first, Some(JoinPosition::new(0, 0)));
        let second = lookup.next_join_position(JoinPosition::new(0, 0), 0, &probe)?;
        assert_eq!(second, Some(JoinPosition::new(1, 0)));
        assert_eq!(lookup.next_join_position(JoinPosition::new(1, 0), 0, &probe)?, None);
        Ok(())
    }

    #[test]
    fn precomputed_hash_finds_the_same_rows() -> StrataResult<()> {
        let lookup = lookup()?;
        let probe = Page::try_new(vec![Arc::new(Int64Array::from(vec![2, 9])) as ArrayRef])?;
        let hashes = hash_columns(&probe, &[0])?;
        let hashes = hashes
            .as_any()
            .downcast_ref::<Int64Array>()
            .expect("hash column is Int64");
        for position in 0..2 {
            let raw_hash = hashes.value(position) as u64;
            assert_eq!(
                lookup.join_position_with_hash(position, &probe, &probe, raw_hash)?,
                lookup.join_position(position, &probe, &probe)?
            );
        }
        assert_eq!(lookup.join_position(1, &probe, &probe)?, None);
        Ok(())
    }

    #[test]
    fn build_columns_land_at_the_offset() -> StrataResult<()> {
        let lookup = lookup()?;
        let mut builder = PageBuilder::try_new(
            vec![DataType::Int32, DataType::Int64, DataType::Utf8],
            Default::default(),
        )?;
        builder.column_builder(0)?.write_int(7)?;
        builder.column_builder(0)?.close_entry()?;
        lookup.append_to(JoinPosition::new(1, 0), &mut builder, 1)?;
        builder.declare_position();
        let page = builder.build()?;
        let names = page.column(2)?.as_any().downcast_ref::<StringArray>();
        assert_eq!(names.map(|names| names.value(0)), Some("c"));
        Ok(())
    }

    #[test]
    fn mismatched_build_pages_are_rejected() -> StrataResult<()> {
        let result = PagesHashLookupSource::try_new(vec![DataType::Utf8], vec![0], build_pages()?);
        assert!(matches!(result, Err(Error::InvalidArgumentError(_))));
        assert!(PagesHashLookupSource::try_new(vec![DataType::Int64], vec![3], Vec::new()).is_err());
        Ok(())
    }
}
