use crate::error::{Error, Result};
use crate::protocol::command::ColumnTypeAndFlags;
use crate::protocol::primitive::*;
use crate::protocol::value::{NullBitmap, RawValue};

/// The payload part of a binary protocol row packet, after the 0x00 header
#[derive(Debug, Clone)]
pub struct BinaryRowPayload<'a> {
    pub(crate) null_bitmap: NullBitmap<'a>,
    pub(crate) values: &'a [u8],
    pub(crate) num_columns: usize,
}

impl<'a> BinaryRowPayload<'a> {
    pub fn new(null_bitmap: NullBitmap<'a>, values: &'a [u8], num_columns: usize) -> Self {
        Self {
            null_bitmap,
            values,
            num_columns,
        }
    }

    pub fn null_bitmap(&self) -> NullBitmap<'a> {
        self.null_bitmap
    }

    pub fn values(&self) -> &'a [u8] {
        self.values
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    /// Split the row into the wire encoding of each column, `None` for NULL.
    ///
    /// Each slice keeps its length prefix (if the type has one) so it can be parsed again
    /// with [`RawValue::parse`].
    pub fn split(&self, columns: &[ColumnTypeAndFlags]) -> Result<Vec<Option<&'a [u8]>>> {
        if columns.len() != self.num_columns {
            return Err(Error::InvalidPacket);
        }
        let mut data = self.values;
        let mut out = Vec::with_capacity(columns.len());
        for (idx, type_and_flags) in columns.iter().enumerate() {
            if self.null_bitmap.is_null(idx) {
                out.push(None);
                continue;
            }
            let (_, rest) = RawValue::parse(type_and_flags, data)?;
            let (value, _) = data.split_at(data.len() - rest.len());
            out.push(Some(value));
            data = rest;
        }
        if !data.is_empty() {
            return Err(Error::InvalidPacket);
        }
        Ok(out)
    }
}

/// The payload part of a text protocol row packet
#[derive(Debug, Clone)]
pub struct TextRowPayload<'a>(pub &'a [u8]);

impl<'a> TextRowPayload<'a> {
    /// Split the row into the content of each column, `None` for NULL
    pub fn split(&self, num_columns: usize) -> Result<Vec<Option<&'a [u8]>>> {
        let mut data = self.0;
        let mut out = Vec::with_capacity(num_columns);
        for _ in 0..num_columns {
            if let Some((&NULL_MARKER, rest)) = data.split_first() {
                out.push(None);
                data = rest;
            } else {
                let (value, rest) = read_string_lenenc(data)?;
                out.push(Some(value));
                data = rest;
            }
        }
        if !data.is_empty() {
            return Err(Error::InvalidPacket);
        }
        Ok(out)
    }
}
