//! Binary protocol column values
use crate::constant::{ColumnFlags, ColumnType};
use crate::error::{Error, Result};
use crate::protocol::command::ColumnTypeAndFlags;
use crate::protocol::primitive::*;
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// A single value of a binary result set row, borrowed from the row packet
#[derive(Debug, Clone, Copy)]
pub enum RawValue<'a> {
    /// NULL value
    Null,
    /// Signed integer (TINYINT, SMALLINT, INT, BIGINT)
    SignedInt(i64),
    /// Unsigned integer (TINYINT UNSIGNED, SMALLINT UNSIGNED, INT UNSIGNED, BIGINT UNSIGNED)
    UnsignedInt(u64),
    /// FLOAT - 4-byte floating point
    Float(f32),
    /// DOUBLE - 8-byte floating point
    Double(f64),
    /// DATE/DATETIME/TIMESTAMP - 0 bytes (0000-00-00 00:00:00)
    Timestamp0,
    /// DATE/DATETIME/TIMESTAMP - 4 bytes (ymd)
    Timestamp4(&'a Timestamp4),
    /// DATE/DATETIME/TIMESTAMP - 7 bytes (ymd + hms)
    Timestamp7(&'a Timestamp7),
    /// DATE/DATETIME/TIMESTAMP - 11 bytes (ymd + hms + microseconds)
    Timestamp11(&'a Timestamp11),
    /// TIME - 0 bytes (00:00:00)
    Time0,
    /// TIME - 8 bytes (without microseconds)
    Time8(&'a Time8),
    /// TIME - 12 bytes (with microseconds)
    Time12(&'a Time12),
    /// BLOB, GEOMETRY, STRING, VARCHAR, VAR_STRING, DECIMAL, BIT, ..
    Byte(&'a [u8]),
}

fn read_fixed<T: FromBytes + KnownLayout + Immutable>(data: &[u8]) -> Result<(&T, &[u8])> {
    T::ref_from_prefix(data).ok().ok_or(Error::UnexpectedEof)
}

impl<'a> RawValue<'a> {
    /// Parse a single binary protocol value based on column type and flags
    ///
    /// Returns the parsed value and the remaining bytes
    pub fn parse(type_and_flags: &ColumnTypeAndFlags, data: &'a [u8]) -> Result<(Self, &'a [u8])> {
        let is_unsigned = type_and_flags.flags.contains(ColumnFlags::UNSIGNED_FLAG);

        match type_and_flags.column_type {
            ColumnType::MYSQL_TYPE_NULL => Ok((RawValue::Null, data)),

            ColumnType::MYSQL_TYPE_TINY => {
                let (val, rest) = read_int_1(data)?;
                let value = if is_unsigned {
                    RawValue::UnsignedInt(u64::from(val))
                } else {
                    RawValue::SignedInt(i64::from(val as i8))
                };
                Ok((value, rest))
            }

            ColumnType::MYSQL_TYPE_SHORT | ColumnType::MYSQL_TYPE_YEAR => {
                let (val, rest) = read_int_2(data)?;
                let value = if is_unsigned || type_and_flags.column_type == ColumnType::MYSQL_TYPE_YEAR
                {
                    RawValue::UnsignedInt(u64::from(val))
                } else {
                    RawValue::SignedInt(i64::from(val as i16))
                };
                Ok((value, rest))
            }

            ColumnType::MYSQL_TYPE_INT24 | ColumnType::MYSQL_TYPE_LONG => {
                let (val, rest) = read_int_4(data)?;
                let value = if is_unsigned {
                    RawValue::UnsignedInt(u64::from(val))
                } else {
                    RawValue::SignedInt(i64::from(val as i32))
                };
                Ok((value, rest))
            }

            ColumnType::MYSQL_TYPE_LONGLONG => {
                let (val, rest) = read_int_8(data)?;
                let value = if is_unsigned {
                    RawValue::UnsignedInt(val)
                } else {
                    RawValue::SignedInt(val as i64)
                };
                Ok((value, rest))
            }

            ColumnType::MYSQL_TYPE_FLOAT => {
                let (val, rest) = read_int_4(data)?;
                Ok((RawValue::Float(f32::from_bits(val)), rest))
            }

            ColumnType::MYSQL_TYPE_DOUBLE => {
                let (val, rest) = read_int_8(data)?;
                Ok((RawValue::Double(f64::from_bits(val)), rest))
            }

            ColumnType::MYSQL_TYPE_DATE
            | ColumnType::MYSQL_TYPE_DATETIME
            | ColumnType::MYSQL_TYPE_TIMESTAMP
            | ColumnType::MYSQL_TYPE_TIMESTAMP2
            | ColumnType::MYSQL_TYPE_DATETIME2
            | ColumnType::MYSQL_TYPE_NEWDATE => {
                let (len, rest) = read_int_1(data)?;
                match len {
                    0 => Ok((RawValue::Timestamp0, rest)),
                    4 => {
                        let (ts, rest) = read_fixed(rest)?;
                        Ok((RawValue::Timestamp4(ts), rest))
                    }
                    7 => {
                        let (ts, rest) = read_fixed(rest)?;
                        Ok((RawValue::Timestamp7(ts), rest))
                    }
                    11 => {
                        let (ts, rest) = read_fixed(rest)?;
                        Ok((RawValue::Timestamp11(ts), rest))
                    }
                    _ => Err(Error::InvalidPacket),
                }
            }

            ColumnType::MYSQL_TYPE_TIME | ColumnType::MYSQL_TYPE_TIME2 => {
                let (len, rest) = read_int_1(data)?;
                match len {
                    0 => Ok((RawValue::Time0, rest)),
                    8 => {
                        let (time, rest) = read_fixed(rest)?;
                        Ok((RawValue::Time8(time), rest))
                    }
                    12 => {
                        let (time, rest) = read_fixed(rest)?;
                        Ok((RawValue::Time12(time), rest))
                    }
                    _ => Err(Error::InvalidPacket),
                }
            }

            ColumnType::MYSQL_TYPE_VARCHAR
            | ColumnType::MYSQL_TYPE_VAR_STRING
            | ColumnType::MYSQL_TYPE_STRING
            | ColumnType::MYSQL_TYPE_BLOB
            | ColumnType::MYSQL_TYPE_TINY_BLOB
            | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
            | ColumnType::MYSQL_TYPE_LONG_BLOB
            | ColumnType::MYSQL_TYPE_GEOMETRY
            | ColumnType::MYSQL_TYPE_JSON
            | ColumnType::MYSQL_TYPE_DECIMAL
            | ColumnType::MYSQL_TYPE_NEWDECIMAL
            | ColumnType::MYSQL_TYPE_ENUM
            | ColumnType::MYSQL_TYPE_SET
            | ColumnType::MYSQL_TYPE_BIT
            | ColumnType::MYSQL_TYPE_VECTOR
            | ColumnType::MYSQL_TYPE_TYPED_ARRAY => {
                let (bytes, rest) = read_string_lenenc(data)?;
                Ok((RawValue::Byte(bytes), rest))
            }
        }
    }
}

// ============================================================================
// Temporal Types
// ============================================================================

/// TIMESTAMP - 4 bytes (DATE/DATETIME/TIMESTAMP with date only)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Timestamp4 {
    pub year: U16LE,
    pub month: u8,
    pub day: u8,
}

impl Timestamp4 {
    pub fn year(&self) -> u16 {
        self.year.get()
    }
}

/// TIMESTAMP - 7 bytes (DATE/DATETIME/TIMESTAMP without microseconds)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Timestamp7 {
    pub year: U16LE,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Timestamp7 {
    pub fn year(&self) -> u16 {
        self.year.get()
    }
}

/// TIMESTAMP - 11 bytes (DATE/DATETIME/TIMESTAMP with microseconds)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Timestamp11 {
    pub year: U16LE,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: U32LE,
}

impl Timestamp11 {
    pub fn year(&self) -> u16 {
        self.year.get()
    }

    pub fn microsecond(&self) -> u32 {
        self.microsecond.get()
    }
}

/// TIME - 8 bytes
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Time8 {
    pub is_negative: u8,
    pub days: U32LE,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Time8 {
    pub fn is_negative(&self) -> bool {
        self.is_negative != 0
    }

    pub fn days(&self) -> u32 {
        self.days.get()
    }
}

/// TIME - 12 bytes: negative (1), days (4 LE), hour (1), minute (1), second (1), microsecond (4 LE)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Time12 {
    pub is_negative: u8,
    pub days: U32LE,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: U32LE,
}

impl Time12 {
    pub fn is_negative(&self) -> bool {
        self.is_negative != 0
    }

    pub fn days(&self) -> u32 {
        self.days.get()
    }

    pub fn microsecond(&self) -> u32 {
        self.microsecond.get()
    }
}

// ============================================================================
// NULL Bitmap
// ============================================================================

/// NULL bitmap for binary protocol
///
/// Each bit tells whether a column is NULL (1 = NULL). Result set rows shift the
/// bitmap by 2 bits; statement parameters use no offset.
#[derive(Debug, Clone, Copy)]
pub struct NullBitmap<'a> {
    bitmap: &'a [u8],
    offset: usize,
}

impl<'a> NullBitmap<'a> {
    /// Create a NULL bitmap for result sets (offset = 2)
    pub fn for_result_set(bitmap: &'a [u8]) -> Self {
        Self { bitmap, offset: 2 }
    }

    /// Create a NULL bitmap for parameters (offset = 0)
    pub fn for_parameters(bitmap: &'a [u8]) -> Self {
        Self { bitmap, offset: 0 }
    }

    /// Byte length of a result set bitmap for `num_columns` columns
    pub fn result_set_len(num_columns: usize) -> usize {
        (num_columns + 7 + 2) >> 3
    }

    /// Check if the column at the given index is NULL
    pub fn is_null(&self, idx: usize) -> bool {
        let bit_pos = idx + self.offset;
        match self.bitmap.get(bit_pos >> 3) {
            Some(byte) => byte & (1 << (bit_pos & 7)) != 0,
            None => false,
        }
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bitmap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tf(column_type: ColumnType, flags: ColumnFlags) -> ColumnTypeAndFlags {
        ColumnTypeAndFlags { column_type, flags }
    }

    #[test]
    fn signed_integers() {
        let (value, rest) = RawValue::parse(&tf(ColumnType::MYSQL_TYPE_TINY, ColumnFlags::empty()), &[214]).unwrap();
        assert!(matches!(value, RawValue::SignedInt(-42)));
        assert!(rest.is_empty());

        let data = (-1000i16).to_le_bytes();
        let (value, _) = RawValue::parse(&tf(ColumnType::MYSQL_TYPE_SHORT, ColumnFlags::empty()), &data).unwrap();
        assert!(matches!(value, RawValue::SignedInt(-1000)));

        // INT24 is transmitted in 4 bytes
        let data = (-8_388_608i32).to_le_bytes();
        let (value, rest) = RawValue::parse(&tf(ColumnType::MYSQL_TYPE_INT24, ColumnFlags::empty()), &data).unwrap();
        assert!(matches!(value, RawValue::SignedInt(-8_388_608)));
        assert!(rest.is_empty());

        let data = i64::MIN.to_le_bytes();
        let (value, _) = RawValue::parse(&tf(ColumnType::MYSQL_TYPE_LONGLONG, ColumnFlags::empty()), &data).unwrap();
        assert!(matches!(value, RawValue::SignedInt(i64::MIN)));
    }

    #[test]
    fn unsigned_integers() {
        let (value, _) = RawValue::parse(&tf(ColumnType::MYSQL_TYPE_TINY, ColumnFlags::UNSIGNED_FLAG), &[200]).unwrap();
        assert!(matches!(value, RawValue::UnsignedInt(200)));

        let data = u64::MAX.to_le_bytes();
        let (value, _) = RawValue::parse(&tf(ColumnType::MYSQL_TYPE_LONGLONG, ColumnFlags::UNSIGNED_FLAG), &data).unwrap();
        assert!(matches!(value, RawValue::UnsignedInt(u64::MAX)));

        let data = 2024u16.to_le_bytes();
        let (value, _) = RawValue::parse(&tf(ColumnType::MYSQL_TYPE_YEAR, ColumnFlags::empty()), &data).unwrap();
        assert!(matches!(value, RawValue::UnsignedInt(2024)));
    }

    #[test]
    fn floats() {
        let data = 1.5f32.to_le_bytes();
        let (value, _) = RawValue::parse(&tf(ColumnType::MYSQL_TYPE_FLOAT, ColumnFlags::empty()), &data).unwrap();
        assert!(matches!(value, RawValue::Float(f) if f == 1.5));

        let data = std::f64::consts::PI.to_le_bytes();
        let (value, _) = RawValue::parse(&tf(ColumnType::MYSQL_TYPE_DOUBLE, ColumnFlags::empty()), &data).unwrap();
        assert!(matches!(value, RawValue::Double(d) if d == std::f64::consts::PI));
    }

    #[test]
    fn timestamps() {
        let datetime = tf(ColumnType::MYSQL_TYPE_DATETIME, ColumnFlags::empty());

        let (value, rest) = RawValue::parse(&datetime, &[0]).unwrap();
        assert!(matches!(value, RawValue::Timestamp0));
        assert!(rest.is_empty());

        let data = [4, 0xE8, 0x07, 12, 25];
        let (value, _) = RawValue::parse(&datetime, &data).unwrap();
        let RawValue::Timestamp4(ts) = value else {
            panic!("expected Timestamp4, got {value:?}");
        };
        assert_eq!((ts.year(), ts.month, ts.day), (2024, 12, 25));

        let mut data = vec![11, 0xE8, 0x07, 12, 25, 15, 30, 45];
        data.extend_from_slice(&123_456u32.to_le_bytes());
        let (value, rest) = RawValue::parse(&datetime, &data).unwrap();
        let RawValue::Timestamp11(ts) = value else {
            panic!("expected Timestamp11, got {value:?}");
        };
        assert_eq!((ts.hour, ts.minute, ts.second), (15, 30, 45));
        assert_eq!(ts.microsecond(), 123_456);
        assert!(rest.is_empty());
    }

    #[test]
    fn times() {
        let time = tf(ColumnType::MYSQL_TYPE_TIME, ColumnFlags::empty());
        let mut data = vec![8, 1];
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&[3, 4, 5]);
        let (value, _) = RawValue::parse(&time, &data).unwrap();
        let RawValue::Time8(t) = value else {
            panic!("expected Time8, got {value:?}");
        };
        assert!(t.is_negative());
        assert_eq!((t.days(), t.hour, t.minute, t.second), (2, 3, 4, 5));
    }

    #[test]
    fn truncated_or_malformed_values_are_errors() {
        let datetime = tf(ColumnType::MYSQL_TYPE_DATETIME, ColumnFlags::empty());
        assert!(RawValue::parse(&datetime, &[7, 0xE8, 0x07]).is_err());
        assert!(RawValue::parse(&datetime, &[5, 0, 0, 0, 0, 0]).is_err());
        let long = tf(ColumnType::MYSQL_TYPE_LONG, ColumnFlags::empty());
        assert!(RawValue::parse(&long, &[1, 2]).is_err());
        let string = tf(ColumnType::MYSQL_TYPE_VAR_STRING, ColumnFlags::empty());
        assert!(RawValue::parse(&string, &[10, b'a']).is_err());
    }

    #[test]
    fn strings_leave_the_remaining_columns() {
        let string = tf(ColumnType::MYSQL_TYPE_VAR_STRING, ColumnFlags::empty());
        let data = [5, b'h', b'e', b'l', b'l', b'o', 0xAA];
        let (value, rest) = RawValue::parse(&string, &data).unwrap();
        let RawValue::Byte(bytes) = value else {
            panic!("expected Byte, got {value:?}");
        };
        assert_eq!(bytes, b"hello");
        assert_eq!(rest, &[0xAA]);
    }

    #[test]
    fn null_bitmap_offsets() {
        // columns 0 and 2 NULL with the result set offset of 2
        let bitmap = [0b0001_0100];
        let nulls = NullBitmap::for_result_set(&bitmap);
        assert!(nulls.is_null(0));
        assert!(!nulls.is_null(1));
        assert!(nulls.is_null(2));
        assert!(!nulls.is_null(100));

        let nulls = NullBitmap::for_parameters(&bitmap);
        assert!(nulls.is_null(2));
        assert!(nulls.is_null(4));
        assert!(!nulls.is_null(0));

        assert_eq!(NullBitmap::result_set_len(1), 1);
        assert_eq!(NullBitmap::result_set_len(6), 1);
        assert_eq!(NullBitmap::result_set_len(7), 2);
    }
}
