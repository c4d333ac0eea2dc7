use crate::constant::ServerStatusFlags;
use crate::error::{Error, Result};
use crate::protocol::primitive::*;
use zerocopy::byteorder::little_endian::U16 as U16LE;
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// OK packet payload (minimal header only)
///
/// Layout: 0x00 (or 0xFE when it terminates a result set) followed by:
/// - affected_rows: length-encoded integer
/// - last_insert_id: length-encoded integer
/// - status_flags: 2 bytes
/// - warnings: 2 bytes
/// - info: variable-length string
#[derive(Debug, Clone, Copy)]
pub struct OkPayloadBytes<'a>(pub &'a [u8]);

impl<'a> OkPayloadBytes<'a> {
    pub fn bytes(&self) -> &'a [u8] {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ErrPayloadBytes<'a>(pub &'a [u8]);

/// OK packet response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OkPayload {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status_flags: ServerStatusFlags,
    pub warnings: u16,
    pub info: String,
}

impl TryFrom<OkPayloadBytes<'_>> for OkPayload {
    type Error = Error;

    fn try_from(bytes: OkPayloadBytes<'_>) -> Result<Self> {
        let (header, data) = read_int_1(bytes.bytes())?;
        if header != 0x00 && header != 0xFE {
            return Err(Error::InvalidPacket);
        }

        let (affected_rows, rest) = read_int_lenenc(data)?;
        let (last_insert_id, rest) = read_int_lenenc(rest)?;
        let (status_flags, rest) = read_int_2(rest)?;
        let (warnings, rest) = read_int_2(rest)?;

        // The info field is a lenenc string when session tracking is on; otherwise it runs
        // to the end of the packet. Either way it is human-readable only.
        let info = String::from_utf8_lossy(rest).into_owned();

        Ok(OkPayload {
            affected_rows,
            last_insert_id,
            status_flags: ServerStatusFlags::from_bits_truncate(status_flags),
            warnings,
            info,
        })
    }
}

/// ERR packet response
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("ERROR {} ({}): {}", self.error_code, self.sql_state, self.message)]
pub struct ErrPayload {
    pub error_code: u16,
    pub sql_state: String,
    pub message: String,
}

impl TryFrom<ErrPayloadBytes<'_>> for ErrPayload {
    type Error = Error;

    fn try_from(bytes: ErrPayloadBytes<'_>) -> Result<Self> {
        let (header, data) = read_int_1(bytes.0)?;
        if header != 0xFF {
            return Err(Error::InvalidPacket);
        }

        let (error_code, data) = read_int_2(data)?;

        // SQL state marker '#' is present with CLIENT_PROTOCOL_41
        let (sql_state, rest) = match data.split_first() {
            Some((b'#', state)) => {
                let (state_bytes, rest) = read_string_fix(state, 5)?;
                (String::from_utf8_lossy(state_bytes).into_owned(), rest)
            }
            _ => (String::new(), data),
        };

        Ok(ErrPayload {
            error_code,
            sql_state,
            message: String::from_utf8_lossy(rest).into_owned(),
        })
    }
}

/// EOF packet response (zero-copy)
///
/// Layout matches MySQL wire protocol after header byte 0xFE:
/// - warnings: 2 bytes (little-endian)
/// - status_flags: 2 bytes (little-endian)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct EofPacket {
    pub warnings: U16LE,
    pub status_flags: U16LE,
}

impl EofPacket {
    pub fn status_flags(&self) -> ServerStatusFlags {
        ServerStatusFlags::from_bits_truncate(self.status_flags.get())
    }
}

/// Read EOF packet (header byte 0xFE, length < 9) - zero-copy
pub fn read_eof_packet(payload: &[u8]) -> Result<&EofPacket> {
    let (header, data) = read_int_1(payload)?;
    if header != 0xFE {
        return Err(Error::InvalidPacket);
    }
    EofPacket::ref_from_prefix(data)
        .map(|(eof, _)| eof)
        .ok()
        .ok_or(Error::UnexpectedEof)
}

/// Whether `payload` is an EOF packet (or an OK packet standing in for one)
pub fn is_eof_packet(payload: &[u8]) -> bool {
    matches!(payload.first(), Some(0xFE)) && payload.len() < crate::constant::MAX_PACKET_PAYLOAD
}

/// Read the packet that ends a result set (or a definition block) and return its status flags
///
/// With `CLIENT_DEPRECATE_EOF` the marker is an OK packet with a 0xFE header, otherwise an
/// EOF packet.
pub fn read_resultset_end(payload: &[u8], deprecate_eof: bool) -> Result<ServerStatusFlags> {
    if deprecate_eof {
        Ok(OkPayload::try_from(OkPayloadBytes(payload))?.status_flags)
    } else {
        Ok(read_eof_packet(payload)?.status_flags())
    }
}
