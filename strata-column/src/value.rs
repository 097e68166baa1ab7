//! Type-dispatched copy of single values from columns into builders.

use arrow::array::{
    Array, AsArray, BinaryArray, BooleanArray, PrimitiveArray, StringArray, StructArray,
};
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Date32Type, Float32Type, Float64Type, Int8Type, Int16Type,
    Int32Type, Int64Type, UInt64Type,
};
use strata_result::{Error, Result as StrataResult};

use crate::builder::ColumnBuilder;

pub(crate) fn downcast<T: Array + 'static>(column: &dyn Array) -> StrataResult<&T> {
    column.as_any().downcast_ref::<T>().ok_or_else(|| {
        Error::Internal(format!(
            "{} column does not downcast to {}",
            column.data_type(),
            std::any::type_name::<T>()
        ))
    })
}

fn primitive<T: ArrowPrimitiveType>(column: &dyn Array, position: usize) -> StrataResult<T::Native> {
    Ok(downcast::<PrimitiveArray<T>>(column)?.value(position))
}

/// Copy the value at `position` of `column` into the next entry of `builder`.
///
/// The source type must equal the type `builder` builds, so a rejected copy
/// writes nothing. Nulls become `append_null`; other values are issued as the
/// raw writes of their type followed by `close_entry`. Struct values open a
/// nested entry on `builder` and copy every field into it.
pub fn append_value(
    column: &dyn Array,
    position: usize,
    builder: &mut dyn ColumnBuilder,
) -> StrataResult<()> {
    if position >= column.len() {
        return Err(Error::InvalidArgumentError(format!(
            "position {position} is outside a column of {} values",
            column.len()
        )));
    }
    check_target_type(column.data_type(), builder)?;
    if column.is_null(position) {
        return builder.append_null();
    }

    match column.data_type() {
        DataType::Boolean => {
            let value = downcast::<BooleanArray>(column)?.value(position);
            builder.write_byte(i8::from(value))?;
        }
        DataType::Int8 => builder.write_byte(primitive::<Int8Type>(column, position)?)?,
        DataType::Int16 => builder.write_short(primitive::<Int16Type>(column, position)?)?,
        DataType::Int32 => builder.write_int(primitive::<Int32Type>(column, position)?)?,
        DataType::Date32 => builder.write_int(primitive::<Date32Type>(column, position)?)?,
        DataType::Int64 => builder.write_long(primitive::<Int64Type>(column, position)?)?,
        DataType::UInt64 => {
            builder.write_long(primitive::<UInt64Type>(column, position)? as i64)?
        }
        DataType::Float32 => {
            builder.write_int(primitive::<Float32Type>(column, position)?.to_bits() as i32)?
        }
        DataType::Float64 => {
            builder.write_long(primitive::<Float64Type>(column, position)?.to_bits() as i64)?
        }
        DataType::Utf8 => {
            let value = downcast::<StringArray>(column)?.value(position);
            builder.write_bytes(value.as_bytes())?;
        }
        DataType::Binary => {
            let value = downcast::<BinaryArray>(column)?.value(position);
            builder.write_bytes(value)?;
        }
        DataType::Struct(_) => {
            let row = downcast::<StructArray>(column)?;
            let mut entry = builder.begin_entry()?;
            for field in row.columns() {
                append_value(field.as_ref(), position, entry.as_mut())?;
            }
        }
        other => {
            return Err(Error::not_supported(format!(
                "copying values of type {other}"
            )));
        }
    }
    builder.close_entry()
}

/// Reject a copy whose source type differs from the type `builder` builds.
///
/// Builders without an encoding of their own (a row writer forwarding to its
/// current field) are checked by the enclosing copy, which compares the whole
/// nested type before opening the row.
fn check_target_type(source: &DataType, builder: &dyn ColumnBuilder) -> StrataResult<()> {
    let target = match builder.encoding() {
        Ok(encoding) => encoding.data_type(),
        Err(Error::NotSupported(_)) => return Ok(()),
        Err(err) => return Err(err),
    };
    if &target != source {
        return Err(Error::InvalidArgumentError(format!(
            "cannot copy a {source} value into a {target} column builder"
        )));
    }
    Ok(())
}

/// Read a fixed-width 64-bit value, reinterpreting `Int64` bits as `u64`.
pub fn read_u64(column: &dyn Array, position: usize) -> StrataResult<u64> {
    if position >= column.len() || column.is_null(position) {
        return Err(Error::InvalidArgumentError(format!(
            "no 64-bit value at position {position} of a column of {} values",
            column.len()
        )));
    }
    match column.data_type() {
        DataType::Int64 => Ok(column.as_primitive::<Int64Type>().value(position) as u64),
        DataType::UInt64 => Ok(column.as_primitive::<UInt64Type>().value(position)),
        other => Err(Error::InvalidArgumentError(format!(
            "expected a 64-bit integer column, got {other}"
        ))),
    }
}

/// Whether `data_type` stores one fixed-width 64-bit integer per position.
pub fn is_fixed_width_u64(data_type: &DataType) -> bool {
    matches!(data_type, DataType::Int64 | DataType::UInt64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::new_column_builder;
    use arrow::array::{ArrayRef, Float64Array, Int32Array, Int64Array};
    use arrow::datatypes::{Field, Fields};
    use std::sync::Arc;

    fn copy_all(column: &ArrayRef) -> StrataResult<ArrayRef> {
        let mut builder = new_column_builder(column.data_type(), column.len())?;
        for position in 0..column.len() {
            append_value(column.as_ref(), position, builder.as_mut())?;
        }
        builder.build()
    }

    #[test]
    fn copies_preserve_values_and_nulls() -> StrataResult<()> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from(vec![Some(1), None, Some(-7)])),
            Arc::new(Float64Array::from(vec![Some(0.5), Some(-2.0), None])),
            Arc::new(StringArray::from(vec![None, Some("b"), Some("")])),
            Arc::new(BooleanArray::from(vec![Some(true), None, Some(false)])),
        ];
        for column in &columns {
            let copied = copy_all(column)?;
            assert_eq!(copied.as_ref(), column.as_ref());
        }
        Ok(())
    }

    #[test]
    fn copies_nested_rows() -> StrataResult<()> {
        let fields = Fields::from(vec![
            Field::new("k", DataType::Int64, true),
            Field::new("v", DataType::Utf8, true),
        ]);
        let column: ArrayRef = Arc::new(StructArray::try_new(
            fields,
            vec![
                Arc::new(Int64Array::from(vec![Some(1), Some(2)])) as ArrayRef,
                Arc::new(StringArray::from(vec![Some("x"), None])) as ArrayRef,
            ],
            None,
        )?);
        let copied = copy_all(&column)?;
        assert_eq!(copied.as_ref(), column.as_ref());
        Ok(())
    }

    #[test]
    fn mismatched_types_are_rejected_before_writing() -> StrataResult<()> {
        let mut names = new_column_builder(&DataType::Utf8, 2)?;
        let ints = Int32Array::from(vec![3]);
        assert!(matches!(
            append_value(&ints, 0, names.as_mut()),
            Err(Error::InvalidArgumentError(_))
        ));
        assert_eq!(names.position_count()?, 0);
        assert_eq!(names.size_in_bytes(), 0);
        Ok(())
    }

    #[test]
    fn mismatched_struct_leaves_the_row_builder_usable() -> StrataResult<()> {
        let target = Fields::from(vec![
            Field::new("k", DataType::Int64, true),
            Field::new("v", DataType::Int64, true),
        ]);
        let mut builder = new_column_builder(&DataType::Struct(target.clone()), 2)?;

        let wrong_type: ArrayRef = Arc::new(StructArray::try_new(
            Fields::from(vec![
                Field::new("k", DataType::Int64, true),
                Field::new("v", DataType::Utf8, true),
            ]),
            vec![
                Arc::new(Int64Array::from(vec![1])) as ArrayRef,
                Arc::new(StringArray::from(vec!["x"])) as ArrayRef,
            ],
            None,
        )?);
        let wrong_count: ArrayRef = Arc::new(StructArray::try_new(
            Fields::from(vec![Field::new("k", DataType::Int64, true)]),
            vec![Arc::new(Int64Array::from(vec![1])) as ArrayRef],
            None,
        )?);
        for value in [&wrong_type, &wrong_count] {
            assert!(matches!(
                append_value(value.as_ref(), 0, builder.as_mut()),
                Err(Error::InvalidArgumentError(_))
            ));
            assert_eq!(builder.position_count()?, 0);
        }

        let good: ArrayRef = Arc::new(StructArray::try_new(
            target,
            vec![
                Arc::new(Int64Array::from(vec![Some(1)])) as ArrayRef,
                Arc::new(Int64Array::from(vec![None])) as ArrayRef,
            ],
            None,
        )?);
        append_value(good.as_ref(), 0, builder.as_mut())?;
        let built = builder.build()?;
        assert_eq!(built.as_ref(), good.as_ref());
        Ok(())
    }

    #[test]
    fn read_u64_reinterprets_signed_bits() -> StrataResult<()> {
        let column = Int64Array::from(vec![Some(-1), None]);
        assert_eq!(read_u64(&column, 0)?, u64::MAX);
        assert!(read_u64(&column, 1).is_err());
        assert!(read_u64(&StringArray::from(vec!["a"]), 0).is_err());
        Ok(())
    }
}
