use std::fmt;

use arrow::datatypes::DataType;
use strata_column::{Page, PageBuilder};
use strata_result::{Error, Result as StrataResult};

/// Address of a build-side row: page index in the high 32 bits, position
/// within that page in the low 32 bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JoinPosition(u64);

impl JoinPosition {
    pub fn new(page_index: u32, position: u32) -> Self {
        Self((u64::from(page_index) << 32) | u64::from(position))
    }

    pub fn try_from_parts(page_index: usize, position: usize) -> StrataResult<Self> {
        let page_index = u32::try_from(page_index).map_err(|_| {
            Error::InvalidArgumentError(format!("build page index {page_index} exceeds u32"))
        })?;
        let position = u32::try_from(position).map_err(|_| {
            Error::InvalidArgumentError(format!("build position {position} exceeds u32"))
        })?;
        Ok(Self::new(page_index, position))
    }

    pub fn from_address(address: u64) -> Self {
        Self(address)
    }

    pub fn address(self) -> u64 {
        self.0
    }

    pub fn page_index(self) -> usize {
        (self.0 >> 32) as usize
    }

    pub fn position(self) -> usize {
        (self.0 & u64::from(u32::MAX)) as usize
    }
}

impl fmt::Debug for JoinPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JoinPosition({}:{})", self.page_index(), self.position())
    }
}

/// Build side of an equality join.
///
/// Lookups receive the probe position, the key sub-page (join channels only,
/// in key order) and the full probe page. Implementations must be
/// deterministic for identical inputs. The probe never calls a lookup for a
/// key tuple that contains a NULL.
pub trait LookupSource {
    /// Number of build columns appended by [`LookupSource::append_to`].
    fn channel_count(&self) -> usize;

    /// Types of the build columns appended by [`LookupSource::append_to`].
    fn output_types(&self) -> &[DataType];

    /// First build row matching the key at `position`; the hash is computed
    /// by the lookup.
    fn join_position(
        &self,
        position: usize,
        key_page: &Page,
        all_page: &Page,
    ) -> StrataResult<Option<JoinPosition>>;

    /// First build row matching the key at `position`, reusing the probe's
    /// precomputed key hash.
    fn join_position_with_hash(
        &self,
        position: usize,
        key_page: &Page,
        all_page: &Page,
        raw_hash: u64,
    ) -> StrataResult<Option<JoinPosition>>;

    /// Next build row with the same key as `current`.
    fn next_join_position(
        &self,
        current: JoinPosition,
        probe_position: usize,
        all_probe_page: &Page,
    ) -> StrataResult<Option<JoinPosition>>;

    /// Append the build columns of `position` to output channels starting at
    /// `output_channel_offset`.
    fn append_to(
        &self,
        position: JoinPosition,
        page_builder: &mut PageBuilder,
        output_channel_offset: usize,
    ) -> StrataResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_position_packs_page_and_position() -> StrataResult<()> {
        let position = JoinPosition::try_from_parts(3, 17)?;
        assert_eq!(position.page_index(), 3);
        assert_eq!(position.position(), 17);
        assert_eq!(position.address(), (3u64 << 32) | 17);
        assert_eq!(JoinPosition::from_address(position.address()), position);
        assert_eq!(format!("{position:?}"), "JoinPosition(3:17)");
        Ok(())
    }

    #[test]
    fn join_position_rejects_wide_parts() {
        assert!(JoinPosition::try_from_parts(usize::MAX, 0).is_err());
        assert!(JoinPosition::try_from_parts(0, usize::MAX).is_err());
    }
}
