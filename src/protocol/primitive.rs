use crate::error::{Error, Result};
use zerocopy::FromBytes;
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE, U64 as U64LE};

/// Marker of a NULL column value in a text protocol row
pub const NULL_MARKER: u8 = 0xFB;

/// Read 1-byte integer
pub fn read_int_1(data: &[u8]) -> Result<(u8, &[u8])> {
    match data.split_first() {
        Some((&value, rest)) => Ok((value, rest)),
        None => Err(Error::UnexpectedEof),
    }
}

/// Read 2-byte little-endian integer
pub fn read_int_2(data: &[u8]) -> Result<(u16, &[u8])> {
    let (value, rest) = U16LE::read_from_prefix(data).ok().ok_or(Error::UnexpectedEof)?;
    Ok((value.get(), rest))
}

/// Read 3-byte little-endian integer
pub fn read_int_3(data: &[u8]) -> Result<(u32, &[u8])> {
    let (bytes, rest) = read_string_fix(data, 3)?;
    Ok((u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]), rest))
}

/// Read 4-byte little-endian integer
pub fn read_int_4(data: &[u8]) -> Result<(u32, &[u8])> {
    let (value, rest) = U32LE::read_from_prefix(data).ok().ok_or(Error::UnexpectedEof)?;
    Ok((value.get(), rest))
}

/// Read 8-byte little-endian integer
pub fn read_int_8(data: &[u8]) -> Result<(u64, &[u8])> {
    let (value, rest) = U64LE::read_from_prefix(data).ok().ok_or(Error::UnexpectedEof)?;
    Ok((value.get(), rest))
}

/// Read length-encoded integer
///
/// `0xFB` (NULL marker) and `0xFF` (ERR header) are not valid here.
pub fn read_int_lenenc(data: &[u8]) -> Result<(u64, &[u8])> {
    let (first, rest) = read_int_1(data)?;
    match first {
        0xFC => {
            let (val, rest) = read_int_2(rest)?;
            Ok((u64::from(val), rest))
        }
        0xFD => {
            let (val, rest) = read_int_3(rest)?;
            Ok((u64::from(val), rest))
        }
        0xFE => read_int_8(rest),
        0xFB | 0xFF => Err(Error::InvalidPacket),
        val => Ok((u64::from(val), rest)),
    }
}

/// Read fixed-length string
pub fn read_string_fix(data: &[u8], len: usize) -> Result<(&[u8], &[u8])> {
    if data.len() < len {
        return Err(Error::UnexpectedEof);
    }
    Ok(data.split_at(len))
}

/// Read null-terminated string
pub fn read_string_null(data: &[u8]) -> Result<(&[u8], &[u8])> {
    match data.iter().position(|&byte| byte == 0) {
        Some(i) => Ok((&data[..i], &data[i + 1..])),
        None => Err(Error::UnexpectedEof),
    }
}

/// Read a string that is either null-terminated or runs to the end of the packet
pub fn read_string_null_or_eof(data: &[u8]) -> (&[u8], &[u8]) {
    match data.iter().position(|&byte| byte == 0) {
        Some(i) => (&data[..i], &data[i + 1..]),
        None => (data, &[]),
    }
}

/// Read length-encoded string
pub fn read_string_lenenc(data: &[u8]) -> Result<(&[u8], &[u8])> {
    let (len, rest) = read_int_lenenc(data)?;
    let len = usize::try_from(len).ok().ok_or(Error::InvalidPacket)?;
    read_string_fix(rest, len)
}

/// Write 1-byte integer
pub fn write_int_1(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

/// Write 2-byte little-endian integer
pub fn write_int_2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write 3-byte little-endian integer
pub fn write_int_3(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes()[..3]);
}

/// Write 4-byte little-endian integer
pub fn write_int_4(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write 8-byte little-endian integer
pub fn write_int_8(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write length-encoded integer
pub fn write_int_lenenc(out: &mut Vec<u8>, value: u64) {
    if value < 251 {
        out.push(value as u8);
    } else if value < (1 << 16) {
        out.push(0xfc);
        write_int_2(out, value as u16);
    } else if value < (1 << 24) {
        out.push(0xfd);
        write_int_3(out, value as u32);
    } else {
        out.push(0xfe);
        write_int_8(out, value);
    }
}

/// Write null-terminated string
pub fn write_string_null(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

/// Write length-encoded string
pub fn write_string_lenenc(out: &mut Vec<u8>, s: &str) {
    write_bytes_lenenc(out, s.as_bytes());
}

/// Write length-encoded bytes
pub fn write_bytes_lenenc(out: &mut Vec<u8>, data: &[u8]) {
    write_int_lenenc(out, data.len() as u64);
    out.extend_from_slice(data);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenenc_int_width_is_chosen_by_magnitude() {
        let cases: [(u64, &[u8]); 6] = [
            (0, &[0x00]),
            (250, &[0xFA]),
            (251, &[0xFC, 0xFB, 0x00]),
            (0xFFFF, &[0xFC, 0xFF, 0xFF]),
            (0x1_0000, &[0xFD, 0x00, 0x00, 0x01]),
            (
                0x100_0000,
                &[0xFE, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00],
            ),
        ];
        for (value, encoded) in cases {
            let mut out = Vec::new();
            write_int_lenenc(&mut out, value);
            assert_eq!(out, encoded, "encoding {value}");

            let (decoded, rest) = read_int_lenenc(&out).unwrap();
            assert_eq!(decoded, value);
            assert!(rest.is_empty());
        }
    }

    #[test]
    fn lenenc_int_rejects_null_and_err_markers() {
        assert!(matches!(read_int_lenenc(&[0xFB]), Err(Error::InvalidPacket)));
        assert!(matches!(read_int_lenenc(&[0xFF]), Err(Error::InvalidPacket)));
    }

    #[test]
    fn truncated_reads_report_eof() {
        assert!(matches!(read_int_1(&[]), Err(Error::UnexpectedEof)));
        assert!(matches!(read_int_2(&[1]), Err(Error::UnexpectedEof)));
        assert!(matches!(read_int_3(&[1, 2]), Err(Error::UnexpectedEof)));
        assert!(matches!(read_int_4(&[1, 2, 3]), Err(Error::UnexpectedEof)));
        assert!(matches!(read_int_8(&[0; 7]), Err(Error::UnexpectedEof)));
        assert!(matches!(read_int_lenenc(&[0xFC, 1]), Err(Error::UnexpectedEof)));
        assert!(matches!(
            read_string_lenenc(&[5, b'a', b'b']),
            Err(Error::UnexpectedEof)
        ));
    }

    #[test]
    fn fixed_width_ints_are_little_endian() {
        let (v, rest) = read_int_2(&[0x34, 0x12, 0xAA]).unwrap();
        assert_eq!(v, 0x1234);
        assert_eq!(rest, &[0xAA]);
        let (v, _) = read_int_3(&[0x56, 0x34, 0x12]).unwrap();
        assert_eq!(v, 0x12_3456);
        let (v, _) = read_int_4(&[0x78, 0x56, 0x34, 0x12]).unwrap();
        assert_eq!(v, 0x1234_5678);
        let (v, _) = read_int_8(&0x0102_0304_0506_0708u64.to_le_bytes()).unwrap();
        assert_eq!(v, 0x0102_0304_0506_0708);
    }

    #[test]
    fn strings() {
        let (s, rest) = read_string_null(b"abc\0def").unwrap();
        assert_eq!(s, b"abc");
        assert_eq!(rest, b"def");
        assert!(read_string_null(b"abc").is_err());

        assert_eq!(read_string_null_or_eof(b"plugin"), (&b"plugin"[..], &b""[..]));

        let mut out = Vec::new();
        write_string_lenenc(&mut out, "vapor");
        let (s, rest) = read_string_lenenc(&out).unwrap();
        assert_eq!(s, b"vapor");
        assert!(rest.is_empty());
    }
}
