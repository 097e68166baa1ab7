use std::mem;
use std::sync::Arc;

use arrow::array::{ArrayRef, BinaryArray, StringArray};
use arrow::buffer::{Buffer, MutableBuffer, OffsetBuffer, ScalarBuffer};
use arrow::datatypes::DataType;
use strata_result::{Error, Result as StrataResult};

use super::{ColumnBuilder, ColumnEncoding, Validity};

/// Bytes of per-position bookkeeping: one `i32` offset plus a null flag.
const POSITION_OVERHEAD_BYTES: usize = mem::size_of::<i32>() + 1;

/// Builder for `Utf8` and `Binary` columns.
///
/// Any raw write appends to the pending entry; `close_entry` seals whatever
/// was written since the previous entry, which may be nothing (an empty
/// string). `Utf8` contents are validated when the column is built.
#[derive(Debug)]
pub struct VariableWidthColumnBuilder {
    data_type: DataType,
    offsets: Vec<i32>,
    values: MutableBuffer,
    validity: Validity,
}

impl VariableWidthColumnBuilder {
    pub fn try_new(data_type: DataType, expected_entries: usize) -> StrataResult<Self> {
        if !matches!(data_type, DataType::Utf8 | DataType::Binary) {
            return Err(Error::not_supported(format!(
                "{data_type} is not a variable-width type"
            )));
        }
        let mut offsets = Vec::with_capacity(expected_entries + 1);
        offsets.push(0);
        Ok(Self {
            data_type,
            offsets,
            values: MutableBuffer::new(0),
            validity: Validity::with_capacity(expected_entries),
        })
    }

    fn sealed_len(&self) -> usize {
        self.offsets.last().map_or(0, |offset| *offset as usize)
    }

    fn pending_bytes(&self) -> usize {
        self.values.len() - self.sealed_len()
    }

    fn seal(&mut self, is_valid: bool) -> StrataResult<()> {
        let end = i32::try_from(self.values.len()).map_err(|_| {
            Error::InvalidArgumentError(format!(
                "{} column exceeds {} bytes",
                self.data_type,
                i32::MAX
            ))
        })?;
        self.offsets.push(end);
        self.validity.append(is_valid);
        Ok(())
    }
}

impl ColumnBuilder for VariableWidthColumnBuilder {
    fn write_byte(&mut self, value: i8) -> StrataResult<()> {
        self.values.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn write_short(&mut self, value: i16) -> StrataResult<()> {
        self.values.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn write_int(&mut self, value: i32) -> StrataResult<()> {
        self.values.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn write_long(&mut self, value: i64) -> StrataResult<()> {
        self.values.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn write_bytes(&mut self, source: &[u8]) -> StrataResult<()> {
        self.values.extend_from_slice(source);
        Ok(())
    }

    fn close_entry(&mut self) -> StrataResult<()> {
        self.seal(true)
    }

    fn append_null(&mut self) -> StrataResult<()> {
        if self.pending_bytes() != 0 {
            return Err(Error::protocol_violation(format!(
                "append_null with {} unsealed bytes in a {} entry",
                self.pending_bytes(),
                self.data_type
            )));
        }
        self.seal(false)
    }

    fn position_count(&self) -> StrataResult<usize> {
        Ok(self.offsets.len() - 1)
    }

    fn size_in_bytes(&self) -> usize {
        self.sealed_len() + POSITION_OVERHEAD_BYTES * (self.offsets.len() - 1)
    }

    fn retained_size_in_bytes(&self) -> usize {
        mem::size_of::<Self>()
            + self.values.capacity()
            + self.offsets.capacity() * mem::size_of::<i32>()
            + self.validity.retained_size_in_bytes()
    }

    fn retained_bytes_for_each_part(&self, consumer: &mut dyn FnMut(&str, usize)) {
        consumer("values", self.values.capacity());
        consumer("offsets", self.offsets.capacity() * mem::size_of::<i32>());
        consumer("validity", self.validity.retained_size_in_bytes());
        consumer("builder", mem::size_of::<Self>());
    }

    fn encoding(&self) -> StrataResult<ColumnEncoding> {
        Ok(ColumnEncoding::VariableWidth {
            data_type: self.data_type.clone(),
        })
    }

    fn build(&mut self) -> StrataResult<ArrayRef> {
        if self.pending_bytes() != 0 {
            return Err(Error::protocol_violation(format!(
                "build with {} unsealed bytes in a {} entry",
                self.pending_bytes(),
                self.data_type
            )));
        }
        let offsets = OffsetBuffer::new(ScalarBuffer::from(mem::replace(
            &mut self.offsets,
            vec![0],
        )));
        let values: Buffer = mem::replace(&mut self.values, MutableBuffer::new(0)).into();
        let nulls = self.validity.finish();

        match self.data_type {
            DataType::Utf8 => Ok(Arc::new(StringArray::try_new(offsets, values, nulls)?)),
            DataType::Binary => Ok(Arc::new(BinaryArray::try_new(offsets, values, nulls)?)),
            ref other => Err(Error::Internal(format!(
                "variable-width builder holds unsupported type {other}"
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

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, AsArray};

    #[test]
    fn builds_strings_with_nulls_and_empty_values() -> StrataResult<()> {
        let mut builder = VariableWidthColumnBuilder::try_new(DataType::Utf8, 3)?;
        builder.write_bytes(b"hel")?;
        builder.write_bytes(b"lo")?;
        builder.close_entry()?;
        builder.append_null()?;
        builder.close_entry()?;
        assert_eq!(builder.position_count()?, 3);
        assert_eq!(builder.size_in_bytes(), 5 + 3 * POSITION_OVERHEAD_BYTES);

        let array = builder.build()?;
        let strings = array.as_string::<i32>();
        assert_eq!(strings.value(0), "hello");
        assert!(strings.is_null(1));
        assert_eq!(strings.value(2), "");
        Ok(())
    }

    #[test]
    fn invalid_utf8_fails_at_build() -> StrataResult<()> {
        let mut builder = VariableWidthColumnBuilder::try_new(DataType::Utf8, 1)?;
        builder.write_bytes(&[0xff, 0xfe])?;
        builder.close_entry()?;
        assert!(matches!(builder.build(), Err(Error::Arrow(_))));
        Ok(())
    }

    #[test]
    fn binary_accepts_raw_scalars() -> StrataResult<()> {
        let mut builder = VariableWidthColumnBuilder::try_new(DataType::Binary, 1)?;
        builder.write_short(0x0102)?;
        builder.write_byte(3)?;
        builder.close_entry()?;
        let array = builder.build()?;
        assert_eq!(array.as_binary::<i32>().value(0), &[0x02, 0x01, 0x03]);
        Ok(())
    }

    #[test]
    fn null_after_partial_write_is_rejected() -> StrataResult<()> {
        let mut builder = VariableWidthColumnBuilder::try_new(DataType::Binary, 1)?;
        builder.write_bytes(b"x")?;
        assert!(matches!(
            builder.append_null(),
            Err(Error::ProtocolViolation(_))
        ));
        assert!(matches!(builder.build(), Err(Error::ProtocolViolation(_))));
        Ok(())
    }
}
