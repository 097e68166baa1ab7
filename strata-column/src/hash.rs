//! Join-key hashing and precomputed hash columns.
//!
//! The hash of a key tuple folds the hashes of its values left to right as
//! `31 * h + value_hash`. A null value hashes to [`NULL_HASH`]. Scalars are
//! hashed with `FxHasher` over their widened canonical bytes, so a value hashes
//! the same whichever fixed-width integer type stores it.
//!
//! [`hash_columns`] materializes the hash of every position of a page into an
//! `Int64` column, which a probe can carry as its precomputed hash channel.

use std::hash::Hasher;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BinaryArray, BooleanArray, Int64Array, StringArray, StructArray,
};
use arrow::datatypes::{
    DataType, Date32Type, Float32Type, Float64Type, Int8Type, Int16Type, Int32Type, Int64Type,
    UInt64Type,
};
use rustc_hash::FxHasher;
use strata_result::{Error, Result as StrataResult};

use crate::page::Page;
use crate::value::downcast;

pub const NULL_HASH: u64 = 0;

#[inline]
pub fn combine_hash(previous: u64, value: u64) -> u64 {
    previous.wrapping_mul(31).wrapping_add(value)
}

#[inline]
fn hash_i64(value: i64) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write_i64(value);
    hasher.finish()
}

#[inline]
fn hash_bytes(value: &[u8]) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(value);
    hasher.write_usize(value.len());
    hasher.finish()
}

/// Hash the value at `position` of one column.
pub fn hash_value(column: &dyn Array, position: usize) -> StrataResult<u64> {
    if position >= column.len() {
        return Err(Error::InvalidArgumentError(format!(
            "cannot hash position {position} of a column of {} values",
            column.len()
        )));
    }
    if column.is_null(position) {
        return Ok(NULL_HASH);
    }
    let hash = match column.data_type() {
        DataType::Boolean => hash_i64(i64::from(downcast::<BooleanArray>(column)?.value(position))),
        DataType::Int8 => hash_i64(column.as_primitive::<Int8Type>().value(position).into()),
        DataType::Int16 => hash_i64(column.as_primitive::<Int16Type>().value(position).into()),
        DataType::Int32 => hash_i64(column.as_primitive::<Int32Type>().value(position).into()),
        DataType::Date32 => hash_i64(column.as_primitive::<Date32Type>().value(position).into()),
        DataType::Int64 => hash_i64(column.as_primitive::<Int64Type>().value(position)),
        DataType::UInt64 => hash_i64(column.as_primitive::<UInt64Type>().value(position) as i64),
        DataType::Float32 => {
            hash_i64(column.as_primitive::<Float32Type>().value(position).to_bits().into())
        }
        DataType::Float64 => {
            hash_i64(column.as_primitive::<Float64Type>().value(position).to_bits() as i64)
        }
        DataType::Utf8 => hash_bytes(downcast::<StringArray>(column)?.value(position).as_bytes()),
        DataType::Binary => hash_bytes(downcast::<BinaryArray>(column)?.value(position)),
        DataType::Struct(_) => {
            let row = downcast::<StructArray>(column)?;
            let mut hash = 0;
            for field in row.columns() {
                hash = combine_hash(hash, hash_value(field.as_ref(), position)?);
            }
            hash
        }
        other => {
            return Err(Error::not_supported(format!("hashing values of type {other}")));
        }
    };
    Ok(hash)
}

/// Hash the key tuple formed by `columns` at `position`.
pub fn hash_position(columns: &[ArrayRef], position: usize) -> StrataResult<u64> {
    columns.iter().try_fold(0, |hash, column| {
        Ok(combine_hash(hash, hash_value(column.as_ref(), position)?))
    })
}

/// Materialize the key hash of every position of `page` as an `Int64` column.
///
/// The stored values are the `u64` hashes reinterpreted bit for bit.
pub fn hash_columns(page: &Page, channels: &[usize]) -> StrataResult<ArrayRef> {
    let keys = page.select_channels(channels)?;
    let hashes = (0..page.position_count())
        .map(|position| hash_position(keys.columns(), position).map(|hash| hash as i64))
        .collect::<StrataResult<Vec<i64>>>()?;
    Ok(Arc::new(Int64Array::from(hashes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int32Array, Int64Array};

    #[test]
    fn null_hashes_to_zero_and_values_do_not_collide_trivially() -> StrataResult<()> {
        let column = Int64Array::from(vec![None, Some(1), Some(2)]);
        assert_eq!(hash_value(&column, 0)?, NULL_HASH);
        assert_ne!(hash_value(&column, 1)?, hash_value(&column, 2)?);
        Ok(())
    }

    #[test]
    fn integer_width_does_not_change_the_hash() -> StrataResult<()> {
        let narrow = Int32Array::from(vec![12345]);
        let wide = Int64Array::from(vec![12345]);
        assert_eq!(hash_value(&narrow, 0)?, hash_value(&wide, 0)?);
        Ok(())
    }

    #[test]
    fn tuple_hash_is_order_sensitive() -> StrataResult<()> {
        let a: ArrayRef = Arc::new(Int64Array::from(vec![1]));
        let b: ArrayRef = Arc::new(Int64Array::from(vec![2]));
        let ab = hash_position(&[Arc::clone(&a), Arc::clone(&b)], 0)?;
        let ba = hash_position(&[b, a], 0)?;
        assert_ne!(ab, ba);
        Ok(())
    }

    #[test]
    fn hash_column_matches_per_position_hashes() -> StrataResult<()> {
        let keys: ArrayRef = Arc::new(StringArray::from(vec![Some("a"), None, Some("c")]));
        let page = Page::try_new(vec![keys])?;
        let hashes = hash_columns(&page, &[0])?;
        let hashes = hashes.as_primitive::<Int64Type>();
        for position in 0..page.position_count() {
            assert_eq!(
                hashes.value(position) as u64,
                hash_position(page.columns(), position)?
            );
        }
        Ok(())
    }
}
