use std::fmt;
use std::str::FromStr;
use std::fmt::Write as _;

use crate::col::Column;
use crate::constant::{ColumnFlags, ColumnType};
use crate::error::Result;
use crate::protocol::command::ColumnTypeAndFlags;
use crate::protocol::primitive::*;
use crate::protocol::r#trait::param::{Param, write_hex_literal, write_quoted_str};
use crate::protocol::value::RawValue;

/// Wire encoding a value was received in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Text protocol: the value is its textual rendering
    Text,
    /// Binary protocol: the value is in the type's binary encoding, length prefix included
    Binary,
}

/// A single column value of a row
///
/// The value keeps the bytes it was received as together with the column's type, flags and
/// display length; the `as_*` accessors convert on demand and return `None` when the value is
/// NULL or the conversion does not apply.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    column_type: ColumnType,
    flags: ColumnFlags,
    column_length: u32,
    format: Format,
    buffer: Option<Vec<u8>>,
}

impl Value {
    pub fn new(
        column_type: ColumnType,
        flags: ColumnFlags,
        column_length: u32,
        format: Format,
        buffer: Option<Vec<u8>>,
    ) -> Self {
        Self {
            column_type,
            flags,
            column_length,
            format,
            buffer,
        }
    }

    /// Value of `column` received in a text protocol row
    pub fn text(column: &Column, bytes: Option<&[u8]>) -> Self {
        Self::new(
            column.column_type,
            column.flags,
            column.column_length,
            Format::Text,
            bytes.map(<[u8]>::to_vec),
        )
    }

    /// Value of `column` received in a binary protocol row
    pub fn binary(column: &Column, bytes: Option<&[u8]>) -> Self {
        Self::new(
            column.column_type,
            column.flags,
            column.column_length,
            Format::Binary,
            bytes.map(<[u8]>::to_vec),
        )
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn flags(&self) -> ColumnFlags {
        self.flags
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn is_null(&self) -> bool {
        self.buffer.is_none()
    }

    /// The bytes as received, `None` for NULL
    pub fn raw(&self) -> Option<&[u8]> {
        self.buffer.as_deref()
    }

    fn is_unsigned(&self) -> bool {
        self.flags.contains(ColumnFlags::UNSIGNED_FLAG)
    }

    fn is_bit(&self) -> bool {
        self.column_type == ColumnType::MYSQL_TYPE_BIT
    }

    fn raw_value(&self) -> Option<RawValue<'_>> {
        let buffer = self.buffer.as_deref()?;
        let type_and_flags = ColumnTypeAndFlags {
            column_type: self.column_type,
            flags: self.flags,
        };
        RawValue::parse(&type_and_flags, buffer)
            .ok()
            .map(|(value, _)| value)
    }

    /// Byte content for string-like values
    ///
    /// Text protocol values always have one. Binary protocol values have one unless the
    /// column is numeric or temporal.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self.format {
            Format::Text => self.buffer.as_deref(),
            Format::Binary => match self.raw_value()? {
                RawValue::Byte(bytes) => Some(bytes),
                _ => None,
            },
        }
    }

    /// The content as UTF-8, `None` if it is not valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        simdutf8::basic::from_utf8(self.as_bytes()?).ok()
    }

    /// Textual rendering of the value
    ///
    /// Binary numbers are formatted in decimal and temporal values as
    /// `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS[.ffffff]` or `[-]HH:MM:SS[.ffffff]`.
    pub fn as_string(&self) -> Option<String> {
        if self.format == Format::Text {
            return self.as_str().map(str::to_owned);
        }
        let is_date = self.column_type == ColumnType::MYSQL_TYPE_DATE
            || self.column_type == ColumnType::MYSQL_TYPE_NEWDATE;
        let s = match self.raw_value()? {
            RawValue::Null => return None,
            RawValue::SignedInt(v) => v.to_string(),
            RawValue::UnsignedInt(v) => v.to_string(),
            RawValue::Float(v) => v.to_string(),
            RawValue::Double(v) => v.to_string(),
            RawValue::Timestamp0 if is_date => "0000-00-00".to_string(),
            RawValue::Timestamp0 => "0000-00-00 00:00:00".to_string(),
            RawValue::Timestamp4(ts) => {
                let (month, day) = (ts.month, ts.day);
                let date = format!("{:04}-{month:02}-{day:02}", ts.year());
                if is_date { date } else { format!("{date} 00:00:00") }
            }
            RawValue::Timestamp7(ts) => {
                let (month, day, hour, minute, second) =
                    (ts.month, ts.day, ts.hour, ts.minute, ts.second);
                format!(
                    "{:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}",
                    ts.year()
                )
            }
            RawValue::Timestamp11(ts) => {
                let (month, day, hour, minute, second) =
                    (ts.month, ts.day, ts.hour, ts.minute, ts.second);
                format!(
                    "{:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{:06}",
                    ts.year(),
                    ts.microsecond()
                )
            }
            RawValue::Time0 => "00:00:00".to_string(),
            RawValue::Time8(t) => {
                format_time(t.is_negative(), t.days(), t.hour, t.minute, t.second, None)
            }
            RawValue::Time12(t) => format_time(
                t.is_negative(),
                t.days(),
                t.hour,
                t.minute,
                t.second,
                Some(t.microsecond()),
            ),
            RawValue::Byte(bytes) => simdutf8::basic::from_utf8(bytes).ok()?.to_owned(),
        };
        Some(s)
    }

    /// BIT content as a big-endian integer
    fn bit_value(&self) -> Option<u64> {
        let bytes = self.as_bytes()?;
        if bytes.len() > 8 {
            return None;
        }
        Some(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    pub fn as_i64(&self) -> Option<i64> {
        if self.is_bit() {
            return self.bit_value().and_then(|v| i64::try_from(v).ok());
        }
        match self.format {
            Format::Text => self.parse_str(),
            Format::Binary => match self.raw_value()? {
                RawValue::SignedInt(v) => Some(v),
                RawValue::UnsignedInt(v) => i64::try_from(v).ok(),
                RawValue::Byte(_) => self.parse_str(),
                _ => None,
            },
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        if self.is_bit() {
            return self.bit_value();
        }
        match self.format {
            Format::Text => self.parse_str(),
            Format::Binary => match self.raw_value()? {
                RawValue::UnsignedInt(v) => Some(v),
                RawValue::SignedInt(v) => u64::try_from(v).ok(),
                RawValue::Byte(_) => self.parse_str(),
                _ => None,
            },
        }
    }

    /// `BIT(1)` columns and integers 0 and 1
    pub fn as_bool(&self) -> Option<bool> {
        if self.is_bit() && self.column_length == 1 {
            return self.as_bytes()?.first().map(|b| *b != 0);
        }
        match self.as_str() {
            Some("true" | "TRUE") => return Some(true),
            Some("false" | "FALSE") => return Some(false),
            _ => {}
        }
        match self.as_i64()? {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.format {
            Format::Text => self.parse_str(),
            Format::Binary => match self.raw_value()? {
                RawValue::Float(v) => Some(f64::from(v)),
                RawValue::Double(v) => Some(v),
                RawValue::SignedInt(v) => Some(v as f64),
                RawValue::UnsignedInt(v) => Some(v as f64),
                RawValue::Byte(_) => self.parse_str(),
                _ => None,
            },
        }
    }

    /// Parse the textual content, as sent for DECIMAL and string columns
    fn parse_str<T: FromStr>(&self) -> Option<T> {
        self.as_str()?.parse().ok()
    }
}

fn format_time(
    negative: bool,
    days: u32,
    hour: u8,
    minute: u8,
    second: u8,
    microsecond: Option<u32>,
) -> String {
    let hours = u64::from(days) * 24 + u64::from(hour);
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    // String formatting is infallible
    let _ = write!(out, "{hours:02}:{minute:02}:{second:02}");
    if let Some(us) = microsecond {
        let _ = write!(out, ".{us:06}");
    }
    out
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("NULL");
        }
        if self.is_bit()
            && self.column_length == 1
            && let Some(b) = self.as_bool()
        {
            return write!(f, "{b}");
        }
        match (self.as_string(), self.raw()) {
            (Some(s), _) => f.write_str(&s),
            (None, Some(raw)) => f.write_str(&String::from_utf8_lossy(raw)),
            (None, None) => Ok(()),
        }
    }
}

impl Param for Value {
    fn is_null(&self) -> bool {
        self.buffer.is_none()
    }

    fn encode_type(&self, out: &mut Vec<u8>) {
        match self.format {
            Format::Text => {
                out.push(ColumnType::MYSQL_TYPE_VAR_STRING as u8);
                out.push(0x00);
            }
            Format::Binary => {
                out.push(self.column_type as u8);
                out.push(if self.is_unsigned() { 0x80 } else { 0x00 });
            }
        }
    }

    fn encode_value(&self, out: &mut Vec<u8>) -> Result<()> {
        let Some(buffer) = self.buffer.as_deref() else {
            return Ok(());
        };
        match self.format {
            Format::Text => write_bytes_lenenc(out, buffer),
            // already in the binary encoding of its own type
            Format::Binary => out.extend_from_slice(buffer),
        }
        Ok(())
    }

    fn write_sql_literal(&self, out: &mut String, no_backslash_escapes: bool) -> Result<()> {
        if self.is_null() {
            out.push_str("NULL");
            return Ok(());
        }
        if self.format == Format::Binary {
            match self.raw_value() {
                Some(RawValue::SignedInt(v)) => return v.write_sql_literal(out, no_backslash_escapes),
                Some(RawValue::UnsignedInt(v)) => {
                    return v.write_sql_literal(out, no_backslash_escapes);
                }
                Some(RawValue::Float(v)) => return v.write_sql_literal(out, no_backslash_escapes),
                Some(RawValue::Double(v)) => return v.write_sql_literal(out, no_backslash_escapes),
                _ => {}
            }
        }
        match self.as_string() {
            Some(s) => write_quoted_str(out, &s, no_backslash_escapes),
            None => write_hex_literal(out, self.as_bytes().or(self.raw()).unwrap_or_default()),
        }
        Ok(())
    }
}
