use auto_impl::auto_impl;

use crate::constant::ColumnType;
use crate::error::{Error, Result};
use crate::protocol::primitive::*;

/// Trait for encoding a single statement parameter
///
/// A parameter knows how to encode itself for the binary protocol (`COM_STMT_EXECUTE`)
/// and how to render itself as a SQL literal for the text protocol.
///
/// # Examples
/// - (42i32, 100u64)
/// - (1i32, 3.14f64, "hello")
/// - ("test", None::<String>)  // NULL string
/// - [1, 2, 3]
#[auto_impl(&, Box)]
pub trait Param {
    /// Returns true if this parameter is NULL
    fn is_null(&self) -> bool {
        false
    }

    /// Encode parameter type
    ///
    /// Format:
    /// - Byte 0: MySQL type (MYSQL_TYPE_*)
    /// - Byte 1: Unsigned flag (0x80 if unsigned, 0x00 otherwise)
    fn encode_type(&self, out: &mut Vec<u8>);

    /// Encode parameter value (binary encoded)
    ///
    /// Only called if is_null() returns false.
    fn encode_value(&self, out: &mut Vec<u8>) -> Result<()>;

    /// Render the parameter as a SQL literal
    ///
    /// With `no_backslash_escapes` (server status `NO_BACKSLASH_ESCAPES`) quotes are
    /// doubled instead of backslash-escaped.
    fn write_sql_literal(&self, out: &mut String, no_backslash_escapes: bool) -> Result<()>;
}

fn write_type(out: &mut Vec<u8>, column_type: ColumnType, unsigned: bool) {
    out.push(column_type as u8);
    out.push(if unsigned { 0x80 } else { 0x00 });
}

/// Append `s` to `out` as a quoted SQL string literal
pub fn write_quoted_str(out: &mut String, s: &str, no_backslash_escapes: bool) {
    out.reserve(s.len() + 2);
    out.push('\'');
    if no_backslash_escapes {
        for c in s.chars() {
            if c == '\'' {
                out.push('\'');
            }
            out.push(c);
        }
    } else {
        for c in s.chars() {
            match c {
                '\0' => out.push_str("\\0"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\\' => out.push_str("\\\\"),
                '\'' => out.push_str("\\'"),
                '"' => out.push_str("\\\""),
                '\x1a' => out.push_str("\\Z"),
                c => out.push(c),
            }
        }
    }
    out.push('\'');
}

/// Append `bytes` to `out` as a hexadecimal literal `X'..'`
pub fn write_hex_literal(out: &mut String, bytes: &[u8]) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    out.reserve(bytes.len() * 2 + 3);
    out.push_str("X'");
    for byte in bytes {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0F)]));
    }
    out.push('\'');
}

// ============================================================================
// Integer implementations
// ============================================================================

macro_rules! impl_param_for_int {
    ($($ty:ty => $column_type:ident, $unsigned:expr, $write:ident as $wire:ty;)*) => {
        $(
            impl Param for $ty {
                fn encode_type(&self, out: &mut Vec<u8>) {
                    write_type(out, ColumnType::$column_type, $unsigned);
                }

                fn encode_value(&self, out: &mut Vec<u8>) -> Result<()> {
                    $write(out, *self as $wire);
                    Ok(())
                }

                fn write_sql_literal(&self, out: &mut String, _no_backslash_escapes: bool) -> Result<()> {
                    out.push_str(&self.to_string());
                    Ok(())
                }
            }
        )*
    };
}

impl_param_for_int! {
    i8 => MYSQL_TYPE_TINY, false, write_int_1 as u8;
    i16 => MYSQL_TYPE_SHORT, false, write_int_2 as u16;
    i32 => MYSQL_TYPE_LONG, false, write_int_4 as u32;
    i64 => MYSQL_TYPE_LONGLONG, false, write_int_8 as u64;
    u8 => MYSQL_TYPE_TINY, true, write_int_1 as u8;
    u16 => MYSQL_TYPE_SHORT, true, write_int_2 as u16;
    u32 => MYSQL_TYPE_LONG, true, write_int_4 as u32;
    u64 => MYSQL_TYPE_LONGLONG, true, write_int_8 as u64;
}

// ============================================================================
// Floating point implementations
// ============================================================================

impl Param for f32 {
    fn encode_type(&self, out: &mut Vec<u8>) {
        write_type(out, ColumnType::MYSQL_TYPE_FLOAT, false);
    }

    fn encode_value(&self, out: &mut Vec<u8>) -> Result<()> {
        write_int_4(out, self.to_bits());
        Ok(())
    }

    fn write_sql_literal(&self, out: &mut String, no_backslash_escapes: bool) -> Result<()> {
        f64::from(*self).write_sql_literal(out, no_backslash_escapes)
    }
}

impl Param for f64 {
    fn encode_type(&self, out: &mut Vec<u8>) {
        write_type(out, ColumnType::MYSQL_TYPE_DOUBLE, false);
    }

    fn encode_value(&self, out: &mut Vec<u8>) -> Result<()> {
        write_int_8(out, self.to_bits());
        Ok(())
    }

    fn write_sql_literal(&self, out: &mut String, _no_backslash_escapes: bool) -> Result<()> {
        if !self.is_finite() {
            return Err(Error::BadUsageError(format!(
                "{self} cannot be written as a SQL literal"
            )));
        }
        out.push_str(&self.to_string());
        Ok(())
    }
}

// ============================================================================
// Boolean implementation
// ============================================================================

impl Param for bool {
    fn encode_type(&self, out: &mut Vec<u8>) {
        write_type(out, ColumnType::MYSQL_TYPE_TINY, false);
    }

    fn encode_value(&self, out: &mut Vec<u8>) -> Result<()> {
        write_int_1(out, u8::from(*self));
        Ok(())
    }

    fn write_sql_literal(&self, out: &mut String, _no_backslash_escapes: bool) -> Result<()> {
        out.push(if *self { '1' } else { '0' });
        Ok(())
    }
}

// ============================================================================
// String and byte implementations
// ============================================================================

impl Param for str {
    fn encode_type(&self, out: &mut Vec<u8>) {
        write_type(out, ColumnType::MYSQL_TYPE_VAR_STRING, false);
    }

    fn encode_value(&self, out: &mut Vec<u8>) -> Result<()> {
        write_string_lenenc(out, self);
        Ok(())
    }

    fn write_sql_literal(&self, out: &mut String, no_backslash_escapes: bool) -> Result<()> {
        write_quoted_str(out, self, no_backslash_escapes);
        Ok(())
    }
}

impl Param for String {
    fn encode_type(&self, out: &mut Vec<u8>) {
        self.as_str().encode_type(out);
    }

    fn encode_value(&self, out: &mut Vec<u8>) -> Result<()> {
        self.as_str().encode_value(out)
    }

    fn write_sql_literal(&self, out: &mut String, no_backslash_escapes: bool) -> Result<()> {
        self.as_str().write_sql_literal(out, no_backslash_escapes)
    }
}

impl Param for [u8] {
    fn encode_type(&self, out: &mut Vec<u8>) {
        write_type(out, ColumnType::MYSQL_TYPE_BLOB, false);
    }

    fn encode_value(&self, out: &mut Vec<u8>) -> Result<()> {
        write_bytes_lenenc(out, self);
        Ok(())
    }

    fn write_sql_literal(&self, out: &mut String, _no_backslash_escapes: bool) -> Result<()> {
        write_hex_literal(out, self);
        Ok(())
    }
}

impl Param for Vec<u8> {
    fn encode_type(&self, out: &mut Vec<u8>) {
        self.as_slice().encode_type(out);
    }

    fn encode_value(&self, out: &mut Vec<u8>) -> Result<()> {
        self.as_slice().encode_value(out)
    }

    fn write_sql_literal(&self, out: &mut String, no_backslash_escapes: bool) -> Result<()> {
        self.as_slice().write_sql_literal(out, no_backslash_escapes)
    }
}

// ============================================================================
// Option<T> implementation (NULL support)
// ============================================================================

impl<T: Param> Param for Option<T> {
    fn is_null(&self) -> bool {
        match self {
            Some(value) => value.is_null(),
            None => true,
        }
    }

    fn encode_type(&self, out: &mut Vec<u8>) {
        match self {
            Some(value) => value.encode_type(out),
            None => write_type(out, ColumnType::MYSQL_TYPE_NULL, false),
        }
    }

    fn encode_value(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Some(value) => value.encode_value(out),
            None => Ok(()),
        }
    }

    fn write_sql_literal(&self, out: &mut String, no_backslash_escapes: bool) -> Result<()> {
        match self {
            Some(value) => value.write_sql_literal(out, no_backslash_escapes),
            None => {
                out.push_str("NULL");
                Ok(())
            }
        }
    }
}
