use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};

/// MySQL packet header (zero-copy)
///
/// Layout matches MySQL wire protocol:
/// - length: 3 bytes (little-endian, payload length)
/// - sequence_id: 1 byte
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, IntoBytes)]
pub struct PacketHeader {
    pub length: [u8; 3],
    pub sequence_id: u8,
}

impl PacketHeader {
    pub fn encode(length: usize, sequence_id: u8) -> Self {
        let len = u32::to_le_bytes(length as u32);
        Self {
            length: [len[0], len[1], len[2]],
            sequence_id,
        }
    }

    pub fn length(&self) -> usize {
        u32::from_le_bytes([self.length[0], self.length[1], self.length[2], 0]) as usize
    }

    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(header, _)| header)
            .ok()
            .ok_or(Error::UnexpectedEof)
    }
}

/// Sequence counter of one connection
///
/// Every packet sent or received takes the next id. The counter is reset to 0 at the start
/// of each command; a received packet carrying any other id than the expected one means
/// the two sides disagree about the exchange and the connection cannot continue.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SequenceId(u8);

impl SequenceId {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }

    /// The id the next packet (in either direction) must carry
    pub fn peek(&self) -> u8 {
        self.0
    }

    /// Take an id for an outgoing packet
    pub fn next_outgoing(&mut self) -> u8 {
        let id = self.0;
        self.0 = self.0.wrapping_add(1);
        id
    }

    /// Check the id of an incoming packet and advance
    pub fn check_incoming(&mut self, actual: u8) -> Result<()> {
        if actual != self.0 {
            return Err(Error::PacketOutOfOrder {
                expected: self.0,
                actual,
            });
        }
        self.0 = self.0.wrapping_add(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let header = PacketHeader::encode(0x12_3456, 7);
        assert_eq!(header.as_bytes(), &[0x56, 0x34, 0x12, 7]);
        let parsed = PacketHeader::from_bytes(header.as_bytes()).unwrap();
        assert_eq!(parsed.length(), 0x12_3456);
        assert_eq!(parsed.sequence_id, 7);
        assert!(PacketHeader::from_bytes(&[1, 0, 0]).is_err());
    }

    #[test]
    fn sequence_id_wraps_and_detects_gaps() {
        let mut seq = SequenceId::new();
        for expected in 0..=255u8 {
            assert_eq!(seq.next_outgoing(), expected);
        }
        assert_eq!(seq.peek(), 0);

        seq.reset();
        assert_eq!(seq.next_outgoing(), 0);
        seq.check_incoming(1).unwrap();
        let err = seq.check_incoming(3).unwrap_err();
        assert!(matches!(
            err,
            Error::PacketOutOfOrder {
                expected: 2,
                actual: 3
            }
        ));
    }
}
