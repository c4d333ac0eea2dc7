use crate::buffer::BufferSet;
use crate::constant::ServerStatusFlags;
use crate::error::{Error, Result, eyre};
use crate::protocol::TextRowPayload;
use crate::protocol::command::{Action, ColumnDefinitionBytes};
use crate::protocol::primitive::*;
use crate::protocol::response::{
    ErrPayloadBytes, OkPayload, OkPayloadBytes, is_eof_packet, read_resultset_end,
};
use crate::protocol::r#trait::TextResultSetHandler;

/// Read COM_QUERY response
/// This can be:
/// - 0xFF: ERR packet (error occurred)
/// - 0x00: OK packet (query succeeded without result set)
/// - 0xFB: LOCAL INFILE request (never negotiated)
/// - Otherwise: Result set (first byte is column count as length-encoded integer)
pub fn read_query_response(payload: &[u8]) -> Result<QueryResponse<'_>> {
    match payload.first() {
        None => Err(Error::InvalidPacket),
        Some(0xFF) => Err(ErrPayloadBytes(payload).into()),
        Some(0x00) => Ok(QueryResponse::Ok(OkPayloadBytes(payload))),
        Some(0xFB) => Err(Error::InvalidPacket),
        Some(_) => {
            let (column_count, _rest) = read_int_lenenc(payload)?;
            let column_count = match usize::try_from(column_count) {
                Ok(0) | Err(_) => return Err(Error::InvalidPacket),
                Ok(n) => n,
            };
            Ok(QueryResponse::ResultSet { column_count })
        }
    }
}

/// Query response variants
#[derive(Debug)]
pub enum QueryResponse<'a> {
    Ok(OkPayloadBytes<'a>),
    ResultSet { column_count: usize },
}

/// Internal state of the Query state machine
enum QueryState {
    /// Initial state - need to read first packet
    Start,
    /// Reading the first response packet of a result
    ReadingFirstPacket,
    /// Reading column definitions
    ReadingColumns { remaining: usize },
    /// Reading the EOF packet after the column definitions
    ReadingColumnsEof,
    /// Reading rows
    ReadingRows,
    /// Finished
    Finished,
}

/// State machine for Query (text protocol) with integrated handler
///
/// The handler is provided at construction and called directly by the state machine.
/// The `step()` method returns actions indicating what I/O operation is needed next.
pub struct Query<'h, H> {
    state: QueryState,
    deprecate_eof: bool,
    handler: &'h mut H,
}

fn next_result(status_flags: ServerStatusFlags) -> QueryState {
    if status_flags.contains(ServerStatusFlags::SERVER_MORE_RESULTS_EXISTS) {
        QueryState::ReadingFirstPacket
    } else {
        QueryState::Finished
    }
}

impl<'h, H: TextResultSetHandler> Query<'h, H> {
    /// Create a new Query state machine with the given handler
    ///
    /// `deprecate_eof` tells whether `CLIENT_DEPRECATE_EOF` was negotiated.
    pub fn new(handler: &'h mut H, deprecate_eof: bool) -> Self {
        Self {
            state: QueryState::Start,
            deprecate_eof,
            handler,
        }
    }

    /// Drive the state machine forward
    ///
    /// # Returns
    /// * `Action::NeedPacket(&mut Vec<u8>)` - Needs the next payload in the specified buffer
    /// * `Action::Finished` - Processing complete
    pub fn step<'buf>(&mut self, buffer_set: &'buf mut BufferSet) -> Result<Action<'buf>> {
        match &mut self.state {
            QueryState::Start => {
                self.state = QueryState::ReadingFirstPacket;
            }

            QueryState::ReadingFirstPacket => {
                let payload = &buffer_set.read_buffer[..];
                match read_query_response(payload)? {
                    QueryResponse::Ok(ok_bytes) => {
                        let ok_payload = OkPayload::try_from(ok_bytes)?;
                        self.handler.no_result_set(ok_bytes)?;
                        self.state = next_result(ok_payload.status_flags);
                    }
                    QueryResponse::ResultSet { column_count } => {
                        self.handler.resultset_start(column_count)?;
                        self.state = QueryState::ReadingColumns {
                            remaining: column_count,
                        };
                        return Ok(Action::NeedPacket(&mut buffer_set.column_definition_buffer));
                    }
                }
            }

            QueryState::ReadingColumns { remaining } => {
                let payload = &buffer_set.column_definition_buffer[..];
                if let Some(0xFF) = payload.first() {
                    return Err(ErrPayloadBytes(payload).into());
                }
                self.handler.col(ColumnDefinitionBytes(payload))?;
                *remaining -= 1;

                if *remaining > 0 {
                    return Ok(Action::NeedPacket(&mut buffer_set.column_definition_buffer));
                }
                self.state = if self.deprecate_eof {
                    QueryState::ReadingRows
                } else {
                    QueryState::ReadingColumnsEof
                };
            }

            QueryState::ReadingColumnsEof => {
                read_resultset_end(&buffer_set.read_buffer, false)?;
                self.state = QueryState::ReadingRows;
            }

            QueryState::ReadingRows => {
                let payload = &buffer_set.read_buffer[..];
                // A row's first item is NULL (0xFB) or string<lenenc>, and a lenenc int never
                // starts with 0xFF, so 0xFF is always an ERR packet. 0xFE can only start a row
                // whose first value is at least 2^24 bytes, which no end marker is.
                match payload.first() {
                    Some(0xFF) => return Err(ErrPayloadBytes(payload).into()),
                    Some(0xFE) if is_eof_packet(payload) => {
                        let status_flags = read_resultset_end(payload, self.deprecate_eof)?;
                        self.handler.resultset_end(status_flags)?;
                        self.state = next_result(status_flags);
                    }
                    _ => self.handler.row(&TextRowPayload(payload))?,
                }
            }

            QueryState::Finished => {
                return Err(Error::LibraryBug(eyre!("Query::step called after finish")));
            }
        }

        match self.state {
            QueryState::Finished => Ok(Action::Finished),
            _ => Ok(Action::NeedPacket(&mut buffer_set.read_buffer)),
        }
    }
}
