use zerocopy::IntoBytes;

use crate::constant::MAX_PACKET_PAYLOAD;
use crate::protocol::packet::{PacketHeader, SequenceId};

/// Length of a packet header
pub const PACKET_HEADER_LEN: usize = 4;

/// A set of reusable buffers for MySQL protocol communication
///
/// `Conn` uses a single `BufferSet` for all its operations.
#[derive(Debug)]
pub struct BufferSet {
    /// General-purpose read buffer holding one reassembled payload
    /// Bytes are valid during an operation.
    pub read_buffer: Vec<u8>,

    /// Payload of the next command
    /// It always starts with 4 bytes reserved for the first packet header.
    /// Layout: [4-byte header space][payload that is possibly larger than 16MB]
    write_buffer: Vec<u8>,

    /// Payload of the column definition packet being read
    /// Bytes are valid during an operation.
    pub column_definition_buffer: Vec<u8>,
}

impl BufferSet {
    /// Create a new empty buffer set
    pub fn new() -> Self {
        Self {
            read_buffer: Vec::new(),
            write_buffer: vec![0; PACKET_HEADER_LEN],
            column_definition_buffer: Vec::new(),
        }
    }

    /// Clear the write buffer, reserve the header space, and return mutable access.
    #[inline]
    pub fn new_write_buffer(&mut self) -> &mut Vec<u8> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(&[0u8; PACKET_HEADER_LEN]);
        &mut self.write_buffer
    }

    /// The payload in the write buffer, without the header space
    #[inline]
    pub fn write_buffer(&self) -> &[u8] {
        self.write_buffer
            .get(PACKET_HEADER_LEN..)
            .unwrap_or_default()
    }

    /// Frame the packet starting at payload offset `offset` in place
    ///
    /// Offsets step by `MAX_PACKET_PAYLOAD`. The header of a packet overwrites the last
    /// 4 payload bytes of the one before it, so packets must be framed and sent in order,
    /// and the payload is gone once the last one is out. A packet shorter than the maximum
    /// is the last one; a payload whose length is a multiple of `MAX_PACKET_PAYLOAD`
    /// (including zero) ends with an extra packet of that kind.
    pub fn frame_packet(&mut self, offset: usize, sequence: &mut SequenceId) -> &[u8] {
        let end = self
            .write_buffer
            .len()
            .min(offset + PACKET_HEADER_LEN + MAX_PACKET_PAYLOAD);
        let packet = self.write_buffer.get_mut(offset..end).unwrap_or_default();
        if let Some((header, payload)) = packet.split_first_chunk_mut::<PACKET_HEADER_LEN>() {
            let encoded = PacketHeader::encode(payload.len(), sequence.next_outgoing());
            header.copy_from_slice(encoded.as_bytes());
        }
        packet
    }
}

impl Default for BufferSet {
    fn default() -> Self {
        Self::new()
    }
}
