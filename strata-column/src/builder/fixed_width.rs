use std::mem;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, PrimitiveArray};
use arrow::buffer::{BooleanBuffer, Buffer, MutableBuffer, NullBuffer, ScalarBuffer};
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Date32Type, Float32Type, Float64Type, Int8Type, Int16Type,
    Int32Type, Int64Type, UInt64Type,
};
use strata_result::{Error, Result as StrataResult};

use super::{ColumnBuilder, ColumnEncoding, Validity};

/// Builder for columns whose entries all occupy the same number of bytes.
///
/// Entries are written as little-endian raw bytes and sealed with
/// `close_entry`, which insists on exactly one value's worth of bytes. Floats
/// go through their bit patterns: `write_int(f32::to_bits)` and
/// `write_long(f64::to_bits)`. Booleans take one byte, non-zero meaning true.
#[derive(Debug)]
pub struct FixedWidthColumnBuilder {
    data_type: DataType,
    width: usize,
    values: MutableBuffer,
    entry_bytes: usize,
    validity: Validity,
    position_count: usize,
}

impl FixedWidthColumnBuilder {
    pub fn try_new(data_type: DataType, expected_entries: usize) -> StrataResult<Self> {
        let width = Self::width_of(&data_type).ok_or_else(|| {
            Error::not_supported(format!("{data_type} is not a fixed-width type"))
        })?;
        Ok(Self {
            data_type,
            width,
            values: MutableBuffer::new(expected_entries * width),
            entry_bytes: 0,
            validity: Validity::with_capacity(expected_entries),
            position_count: 0,
        })
    }

    pub fn supports(data_type: &DataType) -> bool {
        Self::width_of(data_type).is_some()
    }

    fn width_of(data_type: &DataType) -> Option<usize> {
        match data_type {
            DataType::Boolean | DataType::Int8 => Some(1),
            DataType::Int16 => Some(2),
            DataType::Int32 | DataType::Date32 | DataType::Float32 => Some(4),
            DataType::Int64 | DataType::UInt64 | DataType::Float64 => Some(8),
            _ => None,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    fn write_raw(&mut self, bytes: &[u8]) -> StrataResult<()> {
        if self.entry_bytes + bytes.len() > self.width {
            return Err(Error::protocol_violation(format!(
                "{}-byte write overflows the {}-byte {} entry ({} bytes already written)",
                bytes.len(),
                self.width,
                self.data_type,
                self.entry_bytes
            )));
        }
        self.values.extend_from_slice(bytes);
        self.entry_bytes += bytes.len();
        Ok(())
    }

    fn ensure_no_pending_entry(&self, operation: &str) -> StrataResult<()> {
        if self.entry_bytes != 0 {
            return Err(Error::protocol_violation(format!(
                "{operation} with a partially written {} entry ({} of {} bytes)",
                self.data_type, self.entry_bytes, self.width
            )));
        }
        Ok(())
    }
}

fn primitive_array<T: ArrowPrimitiveType>(
    values: Buffer,
    len: usize,
    nulls: Option<NullBuffer>,
) -> StrataResult<ArrayRef> {
    let values = ScalarBuffer::<T::Native>::new(values, 0, len);
    Ok(Arc::new(PrimitiveArray::<T>::try_new(values, nulls)?))
}

impl ColumnBuilder for FixedWidthColumnBuilder {
    fn write_byte(&mut self, value: i8) -> StrataResult<()> {
        self.write_raw(&value.to_le_bytes())
    }

    fn write_short(&mut self, value: i16) -> StrataResult<()> {
        self.write_raw(&value.to_le_bytes())
    }

    fn write_int(&mut self, value: i32) -> StrataResult<()> {
        self.write_raw(&value.to_le_bytes())
    }

    fn write_long(&mut self, value: i64) -> StrataResult<()> {
        self.write_raw(&value.to_le_bytes())
    }

    fn close_entry(&mut self) -> StrataResult<()> {
        if self.entry_bytes != self.width {
            return Err(Error::protocol_violation(format!(
                "closing a {} entry after {} of {} bytes",
                self.data_type, self.entry_bytes, self.width
            )));
        }
        self.entry_bytes = 0;
        self.validity.append(true);
        self.position_count += 1;
        Ok(())
    }

    fn append_null(&mut self) -> StrataResult<()> {
        self.ensure_no_pending_entry("append_null")?;
        self.values.extend_zeros(self.width);
        self.validity.append(false);
        self.position_count += 1;
        Ok(())
    }

    fn position_count(&self) -> StrataResult<usize> {
        Ok(self.position_count)
    }

    fn size_in_bytes(&self) -> usize {
        // value bytes plus one null flag per position
        (self.width + 1) * self.position_count
    }

    fn retained_size_in_bytes(&self) -> usize {
        mem::size_of::<Self>() + self.values.capacity() + self.validity.retained_size_in_bytes()
    }

    fn retained_bytes_for_each_part(&self, consumer: &mut dyn FnMut(&str, usize)) {
        consumer("values", self.values.capacity());
        consumer("validity", self.validity.retained_size_in_bytes());
        consumer("builder", mem::size_of::<Self>());
    }

    fn encoding(&self) -> StrataResult<ColumnEncoding> {
        Ok(ColumnEncoding::FixedWidth {
            data_type: self.data_type.clone(),
            width: self.width,
        })
    }

    fn build(&mut self) -> StrataResult<ArrayRef> {
        self.ensure_no_pending_entry("build")?;
        let len = mem::take(&mut self.position_count);
        let values: Buffer = mem::replace(&mut self.values, MutableBuffer::new(0)).into();
        let nulls = self.validity.finish();

        match self.data_type {
            DataType::Boolean => {
                let bits: BooleanBuffer = values.as_slice().iter().map(|byte| *byte != 0).collect();
                Ok(Arc::new(BooleanArray::new(bits, nulls)))
            }
            DataType::Int8 => primitive_array::<Int8Type>(values, len, nulls),
            DataType::Int16 => primitive_array::<Int16Type>(values, len, nulls),
            DataType::Int32 => primitive_array::<Int32Type>(values, len, nulls),
            DataType::Date32 => primitive_array::<Date32Type>(values, len, nulls),
            DataType::Float32 => primitive_array::<Float32Type>(values, len, nulls),
            DataType::Int64 => primitive_array::<Int64Type>(values, len, nulls),
            DataType::UInt64 => primitive_array::<UInt64Type>(values, len, nulls),
            DataType::Float64 => primitive_array::<Float64Type>(values, len, nulls),
            ref other => Err(Error::Internal(format!(
                "fixed-width builder holds unsupported type {other}"
            ))),
        }
    }

    fn new_builder_like(&self, expected_entries: usize) -> StrataResult<Box<dyn ColumnBuilder>> {
        Ok(Box::new(Self::try_new(
            self.data_type.clone(),
            expected_entries,
        )?))
    }
}
