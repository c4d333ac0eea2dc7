//! Server-side packet builders for tests that play the server role.

use crate::constant::{CapabilityFlags, ColumnFlags, ColumnType, ServerStatusFlags};
use crate::protocol::primitive::*;

pub const SALT: [u8; 20] = *b"abcdefghijklmnopqrst";

pub fn server_capabilities() -> CapabilityFlags {
    CapabilityFlags::CLIENT_LONG_PASSWORD
        | CapabilityFlags::CLIENT_FOUND_ROWS
        | CapabilityFlags::CLIENT_LONG_FLAG
        | CapabilityFlags::CLIENT_CONNECT_WITH_DB
        | CapabilityFlags::CLIENT_PROTOCOL_41
        | CapabilityFlags::CLIENT_TRANSACTIONS
        | CapabilityFlags::CLIENT_SECURE_CONNECTION
        | CapabilityFlags::CLIENT_MULTI_STATEMENTS
        | CapabilityFlags::CLIENT_MULTI_RESULTS
        | CapabilityFlags::CLIENT_PS_MULTI_RESULTS
        | CapabilityFlags::CLIENT_PLUGIN_AUTH
        | CapabilityFlags::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA
        | CapabilityFlags::CLIENT_DEPRECATE_EOF
}

pub fn handshake_v10(plugin: &str, capabilities: CapabilityFlags) -> Vec<u8> {
    let caps = capabilities.bits();
    let mut out = vec![10];
    write_string_null(&mut out, "8.4.0-test");
    write_int_4(&mut out, 42);
    out.extend_from_slice(&SALT[..8]);
    out.push(0);
    write_int_2(&mut out, caps as u16);
    out.push(45);
    write_int_2(&mut out, ServerStatusFlags::SERVER_STATUS_AUTOCOMMIT.bits());
    write_int_2(&mut out, (caps >> 16) as u16);
    out.push(21);
    out.extend_from_slice(&[0; 10]);
    out.extend_from_slice(&SALT[8..]);
    out.push(0);
    write_string_null(&mut out, plugin);
    out
}

pub fn ok(affected_rows: u64, last_insert_id: u64, status: ServerStatusFlags) -> Vec<u8> {
    let mut out = vec![0x00];
    write_int_lenenc(&mut out, affected_rows);
    write_int_lenenc(&mut out, last_insert_id);
    write_int_2(&mut out, status.bits());
    write_int_2(&mut out, 0);
    out
}

/// Result set terminator when `CLIENT_DEPRECATE_EOF` is on
pub fn ok_eof(status: ServerStatusFlags) -> Vec<u8> {
    let mut out = ok(0, 0, status);
    out[0] = 0xFE;
    out
}

pub fn eof(status: ServerStatusFlags) -> Vec<u8> {
    let mut out = vec![0xFE];
    write_int_2(&mut out, 0);
    write_int_2(&mut out, status.bits());
    out
}

pub fn err(code: u16, state: &str, message: &str) -> Vec<u8> {
    let mut out = vec![0xFF];
    write_int_2(&mut out, code);
    out.push(b'#');
    out.extend_from_slice(state.as_bytes());
    out.extend_from_slice(message.as_bytes());
    out
}

pub fn column_count(n: u64) -> Vec<u8> {
    let mut out = Vec::new();
    write_int_lenenc(&mut out, n);
    out
}

pub fn column_definition(name: &str, column_type: ColumnType, flags: ColumnFlags) -> Vec<u8> {
    let mut out = Vec::new();
    write_string_lenenc(&mut out, "def");
    write_string_lenenc(&mut out, "test");
    write_string_lenenc(&mut out, "t");
    write_string_lenenc(&mut out, "t");
    write_string_lenenc(&mut out, name);
    write_string_lenenc(&mut out, name);
    write_int_lenenc(&mut out, 0x0c);
    write_int_2(&mut out, 45);
    write_int_4(&mut out, 255);
    out.push(column_type as u8);
    write_int_2(&mut out, flags.bits());
    out.push(0);
    write_int_2(&mut out, 0);
    out
}

pub fn text_row(values: &[Option<&str>]) -> Vec<u8> {
    let mut out = Vec::new();
    for value in values {
        match value {
            Some(v) => write_string_lenenc(&mut out, v),
            None => out.push(NULL_MARKER),
        }
    }
    out
}

/// `values` are already in binary protocol encoding
pub fn binary_row(values: &[Option<Vec<u8>>]) -> Vec<u8> {
    let mut out = vec![0x00];
    let mut bitmap = vec![0u8; (values.len() + 7 + 2) >> 3];
    for (i, value) in values.iter().enumerate() {
        if value.is_none() {
            let bit = i + 2;
            bitmap[bit >> 3] |= 1 << (bit & 7);
        }
    }
    out.extend_from_slice(&bitmap);
    for value in values.iter().flatten() {
        out.extend_from_slice(value);
    }
    out
}

pub fn prepare_ok(statement_id: u32, num_columns: u16, num_params: u16) -> Vec<u8> {
    let mut out = vec![0x00];
    write_int_4(&mut out, statement_id);
    write_int_2(&mut out, num_columns);
    write_int_2(&mut out, num_params);
    out.push(0);
    write_int_2(&mut out, 0);
    out
}
