use std::mem::size_of;

use zerocopy::FromBytes;

use crate::constant::{ColumnFlags, ColumnType};
use crate::protocol::command::{ColumnDefinition, ColumnDefinitionBytes, ColumnDefinitionTail};
use crate::protocol::primitive::write_string_lenenc;

#[test]
fn tail_is_twelve_bytes() {
    assert_eq!(size_of::<ColumnDefinitionTail>(), 12);
}

#[test]
fn tail_parsing() {
    let data: [u8; 12] = [
        0x21, 0x00, // charset = 33
        0xFF, 0x00, 0x00, 0x00, // column_length = 255
        0xFD, // column_type = VAR_STRING
        0x00, 0x00, // flags
        0x00, // decimals
        0x00, 0x00, // reserved
    ];
    let tail = ColumnDefinitionTail::ref_from_bytes(&data).unwrap();
    assert_eq!(tail.charset(), 33);
    assert_eq!(tail.column_length(), 255);
    assert!(tail.flags().is_empty());
    assert_eq!(tail.column_type().unwrap(), ColumnType::MYSQL_TYPE_VAR_STRING);
}

#[test]
fn tail_with_part_key_flag() {
    // NOT_NULL | PRI_KEY | AUTO_INCREMENT | PART_KEY as sent for an auto-increment primary key
    let data: [u8; 12] = [
        0x3f, 0x00, 0x0B, 0x00, 0x00, 0x00, 0x03, 0x03, 0x42, 0x00, 0x00, 0x00,
    ];
    let tail = ColumnDefinitionTail::ref_from_bytes(&data).unwrap();
    let flags = tail.flags();
    assert!(flags.contains(ColumnFlags::NOT_NULL_FLAG));
    assert!(flags.contains(ColumnFlags::PRI_KEY_FLAG));
    assert!(flags.contains(ColumnFlags::AUTO_INCREMENT_FLAG));
    assert!(flags.contains(ColumnFlags::PART_KEY_FLAG));
    assert_eq!(tail.column_type().unwrap(), ColumnType::MYSQL_TYPE_LONG);
}

#[test]
fn unknown_column_type_is_rejected() {
    let data: [u8; 12] = [0x21, 0, 0, 0, 0, 0, 0x42, 0, 0, 0, 0, 0];
    let tail = ColumnDefinitionTail::ref_from_bytes(&data).unwrap();
    assert!(tail.column_type().is_err());
}

#[test]
fn full_definition() {
    let mut payload = Vec::new();
    for field in ["def", "vapor_database", "f", "foos", "bar", "bar"] {
        write_string_lenenc(&mut payload, field);
    }
    payload.push(0x0c);
    payload.extend_from_slice(&[0x2d, 0x00, 0xfc, 0x03, 0x00, 0x00, 0xfd, 0x00, 0x00, 0x00, 0x00, 0x00]);

    let def = ColumnDefinition::try_from(ColumnDefinitionBytes(&payload)).unwrap();
    assert_eq!(def.schema, b"vapor_database");
    assert_eq!(def.table_alias, b"f");
    assert_eq!(def.table_original, b"foos");
    assert_eq!(def.name_alias, b"bar");
    assert_eq!(def.tail.charset(), 45);
    assert_eq!(def.tail.column_length(), 1020);

    assert!(ColumnDefinition::try_from(ColumnDefinitionBytes(&payload[..payload.len() - 3])).is_err());
}
