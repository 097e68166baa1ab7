//! Probe side of the equality join.
//!
//! A [`JoinProbeFactory`] binds the probe configuration (output channels, join
//! channels and an optional precomputed hash channel) and creates one
//! [`EqualityJoinProbe`] per probe page. The probe walks the page position by
//! position, resolves each row against a build-side [`LookupSource`] and
//! projects the configured probe columns into an output [`PageBuilder`].
//!
//! Rows whose join key contains a NULL never reach the lookup: SQL equality
//! with NULL is never true. [`PagesHashLookupSource`] is an in-memory build
//! side and [`LookupJoiner`] drives probe and lookup in lock-step to produce
//! inner-join pages.
//!
//! [`PageBuilder`]: strata_column::PageBuilder
#![forbid(unsafe_code)]

mod driver;
mod lookup;
mod pages_hash;
mod probe;

use strata_column::PageBuilderOptions;
use strata_result::{Error, Result as StrataResult};

pub use driver::LookupJoiner;
pub use lookup::{JoinPosition, LookupSource};
pub use pages_hash::PagesHashLookupSource;
pub use probe::{EqualityJoinProbe, JoinProbeFactory};

/// Options controlling join output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinOptions {
    /// Maximum number of joined rows per output page.
    pub batch_size: usize,
    /// Output pages are flushed once their builders reach this size.
    pub max_page_size_in_bytes: usize,
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            batch_size: 8192,
            max_page_size_in_bytes: 1024 * 1024,
        }
    }
}

impl JoinOptions {
    /// Set the output batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the output page size limit.
    pub fn with_max_page_size_in_bytes(mut self, bytes: usize) -> Self {
        self.max_page_size_in_bytes = bytes;
        self
    }

    /// Page builder sizing derived from these options.
    pub fn page_builder_options(&self) -> PageBuilderOptions {
        PageBuilderOptions::default()
            .with_max_row_count(self.batch_size)
            .with_max_page_size_in_bytes(self.max_page_size_in_bytes)
            .with_expected_entries(self.batch_size.min(1024))
    }
}

/// Validate join options before execution.
pub fn validate_join_options(options: &JoinOptions) -> StrataResult<()> {
    if options.batch_size == 0 {
        return Err(Error::InvalidArgumentError(
            "join batch_size must be > 0".to_string(),
        ));
    }
    if options.max_page_size_in_bytes == 0 {
        return Err(Error::InvalidArgumentError(
            "join max_page_size_in_bytes must be > 0".to_string(),
        ));
    }
    Ok(())
}
