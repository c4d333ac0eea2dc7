use crate::error::{Error, Result};
use crate::protocol::BinaryRowPayload;
use crate::protocol::primitive::*;
use crate::protocol::value::NullBitmap;

/// Read a binary protocol row
///
/// Layout: 0x00 header, NULL bitmap of `(num_columns + 7 + 2) / 8` bytes, then the values of
/// the non-NULL columns.
pub fn read_binary_row(payload: &[u8], num_columns: usize) -> Result<BinaryRowPayload<'_>> {
    let (header, data) = read_int_1(payload)?;
    if header != 0x00 {
        return Err(Error::InvalidPacket);
    }

    let (null_bitmap, values) = read_string_fix(data, NullBitmap::result_set_len(num_columns))?;
    Ok(BinaryRowPayload::new(
        NullBitmap::for_result_set(null_bitmap),
        values,
        num_columns,
    ))
}
