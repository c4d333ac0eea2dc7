use crate::buffer::BufferSet;
use crate::constant::{CommandByte, ServerStatusFlags};
use crate::error::{Error, Result, eyre};
use crate::protocol::command::resultset::read_binary_row;
use crate::protocol::command::{Action, ColumnDefinitionBytes};
use crate::protocol::primitive::*;
use crate::protocol::response::{
    ErrPayloadBytes, OkPayload, OkPayloadBytes, is_eof_packet, read_resultset_end,
};
use crate::protocol::r#trait::params::Params;
use crate::protocol::r#trait::{BinaryResultSetHandler, PrepareHandler};
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// Prepared statement OK response (zero-copy)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct PrepareOk {
    statement_id: U32LE,
    num_columns: U16LE,
    num_params: U16LE,
    _reserved: u8,
    warning_count: U16LE,
}

impl PrepareOk {
    /// Get the statement ID
    pub fn statement_id(&self) -> u32 {
        self.statement_id.get()
    }

    /// Get the number of columns in the result set
    pub fn num_columns(&self) -> u16 {
        self.num_columns.get()
    }

    /// Get the number of parameters in the prepared statement
    pub fn num_params(&self) -> u16 {
        self.num_params.get()
    }

    /// Get the warning count
    pub fn warning_count(&self) -> u16 {
        self.warning_count.get()
    }
}

/// Write COM_STMT_PREPARE command
pub fn write_prepare(out: &mut Vec<u8>, sql: &str) {
    write_int_1(out, CommandByte::StmtPrepare as u8);
    out.extend_from_slice(sql.as_bytes());
}

/// Read COM_STMT_PREPARE response
pub fn read_prepare_ok(payload: &[u8]) -> Result<&PrepareOk> {
    match read_int_1(payload)? {
        (0x00, data) => PrepareOk::ref_from_prefix(data)
            .map(|(ok, _)| ok)
            .ok()
            .ok_or(Error::UnexpectedEof),
        (0xFF, _) => Err(ErrPayloadBytes(payload).into()),
        _ => Err(Error::InvalidPacket),
    }
}

/// Write COM_STMT_EXECUTE command
///
/// Fails with `BadUsageError` when the number of parameters differs from `num_params`.
pub fn write_execute<P: Params + ?Sized>(
    out: &mut Vec<u8>,
    statement_id: u32,
    num_params: usize,
    params: &P,
) -> Result<()> {
    if params.len() != num_params {
        return Err(Error::BadUsageError(format!(
            "statement expects {} parameters but {} were given",
            num_params,
            params.len()
        )));
    }

    write_int_1(out, CommandByte::StmtExecute as u8);
    write_int_4(out, statement_id);

    // flags (1 byte) - CURSOR_TYPE_NO_CURSOR
    write_int_1(out, 0x00);

    // iteration count (4 bytes) - always 1
    write_int_4(out, 1);

    if num_params > 0 {
        params.write_null_bitmap(out)?;

        // new-params-bound-flag (1 byte)
        write_int_1(out, 0x01);
        params.write_types(out)?;
        params.write_values(out)?;
    }
    Ok(())
}

/// Write COM_STMT_CLOSE command
pub fn write_close_statement(out: &mut Vec<u8>, statement_id: u32) {
    write_int_1(out, CommandByte::StmtClose as u8);
    write_int_4(out, statement_id);
}

// ============================================================================
// State Machine API for COM_STMT_PREPARE
// ============================================================================

enum PrepareState {
    Start,
    ReadingPrepareOk,
    ReadingParams { remaining: usize, num_columns: usize },
    ReadingParamsEof { num_columns: usize },
    ReadingColumns { remaining: usize },
    ReadingColumnsEof,
    Finished,
}

/// State machine for the COM_STMT_PREPARE response
///
/// PrepareOK is followed by a block of parameter definitions and a block of column
/// definitions. A block is omitted when its count is zero; otherwise it is terminated by an
/// EOF packet unless `CLIENT_DEPRECATE_EOF` was negotiated.
pub struct Prepare<'h, H> {
    state: PrepareState,
    deprecate_eof: bool,
    handler: &'h mut H,
}

impl<'h, H: PrepareHandler> Prepare<'h, H> {
    pub fn new(handler: &'h mut H, deprecate_eof: bool) -> Self {
        Self {
            state: PrepareState::Start,
            deprecate_eof,
            handler,
        }
    }

    fn columns_or_finish(num_columns: usize) -> PrepareState {
        if num_columns > 0 {
            PrepareState::ReadingColumns {
                remaining: num_columns,
            }
        } else {
            PrepareState::Finished
        }
    }

    pub fn step<'buf>(&mut self, buffer_set: &'buf mut BufferSet) -> Result<Action<'buf>> {
        let payload = &buffer_set.read_buffer[..];
        self.state = match std::mem::replace(&mut self.state, PrepareState::Finished) {
            PrepareState::Start => PrepareState::ReadingPrepareOk,

            PrepareState::ReadingPrepareOk => {
                let prepare_ok = read_prepare_ok(payload)?;
                self.handler.prepare_ok(prepare_ok)?;
                let num_params = usize::from(prepare_ok.num_params());
                let num_columns = usize::from(prepare_ok.num_columns());
                if num_params > 0 {
                    PrepareState::ReadingParams {
                        remaining: num_params,
                        num_columns,
                    }
                } else {
                    Self::columns_or_finish(num_columns)
                }
            }

            PrepareState::ReadingParams {
                remaining,
                num_columns,
            } => {
                self.handler.param(ColumnDefinitionBytes(payload))?;
                match (remaining - 1, self.deprecate_eof) {
                    (0, true) => Self::columns_or_finish(num_columns),
                    (0, false) => PrepareState::ReadingParamsEof { num_columns },
                    (remaining, _) => PrepareState::ReadingParams {
                        remaining,
                        num_columns,
                    },
                }
            }

            PrepareState::ReadingParamsEof { num_columns } => {
                read_resultset_end(payload, false)?;
                Self::columns_or_finish(num_columns)
            }

            PrepareState::ReadingColumns { remaining } => {
                self.handler.col(ColumnDefinitionBytes(payload))?;
                match (remaining - 1, self.deprecate_eof) {
                    (0, true) => PrepareState::Finished,
                    (0, false) => PrepareState::ReadingColumnsEof,
                    (remaining, _) => PrepareState::ReadingColumns { remaining },
                }
            }

            PrepareState::ReadingColumnsEof => {
                read_resultset_end(payload, false)?;
                PrepareState::Finished
            }

            PrepareState::Finished => {
                return Err(Error::LibraryBug(eyre!("Prepare::step called after finish")));
            }
        };

        match self.state {
            PrepareState::Finished => Ok(Action::Finished),
            _ => Ok(Action::NeedPacket(&mut buffer_set.read_buffer)),
        }
    }
}

// ============================================================================
// State Machine API for COM_STMT_EXECUTE
// ============================================================================

/// Read COM_STMT_EXECUTE response
/// This can be either an OK packet or a result set
pub fn read_execute_response(payload: &[u8]) -> Result<ExecuteResponse<'_>> {
    match payload.first() {
        None => Err(Error::InvalidPacket),
        Some(0x00) => Ok(ExecuteResponse::Ok(OkPayloadBytes(payload))),
        Some(0xFF) => Err(ErrPayloadBytes(payload).into()),
        Some(_) => {
            let (column_count, _rest) = read_int_lenenc(payload)?;
            let column_count = match usize::try_from(column_count) {
                Ok(0) | Err(_) => return Err(Error::InvalidPacket),
                Ok(n) => n,
            };
            Ok(ExecuteResponse::ResultSet { column_count })
        }
    }
}

/// Execute response variants
#[derive(Debug)]
pub enum ExecuteResponse<'a> {
    Ok(OkPayloadBytes<'a>),
    ResultSet { column_count: usize },
}

enum ExecState {
    Start,
    ReadingFirstPacket,
    ReadingColumns { num_columns: usize, remaining: usize },
    ReadingColumnsEof { num_columns: usize },
    ReadingRows { num_columns: usize },
    Finished,
}

fn next_result(status_flags: ServerStatusFlags) -> ExecState {
    if status_flags.contains(ServerStatusFlags::SERVER_MORE_RESULTS_EXISTS) {
        ExecState::ReadingFirstPacket
    } else {
        ExecState::Finished
    }
}

/// State machine for COM_STMT_EXECUTE (binary protocol) with integrated handler
pub struct Exec<'h, H> {
    state: ExecState,
    deprecate_eof: bool,
    handler: &'h mut H,
}

impl<'h, H: BinaryResultSetHandler> Exec<'h, H> {
    pub fn new(handler: &'h mut H, deprecate_eof: bool) -> Self {
        Self {
            state: ExecState::Start,
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
        self.state = match std::mem::replace(&mut self.state, ExecState::Finished) {
            ExecState::Start => ExecState::ReadingFirstPacket,

            ExecState::ReadingFirstPacket => match read_execute_response(&buffer_set.read_buffer)? {
                ExecuteResponse::Ok(ok_bytes) => {
                    let ok_payload = OkPayload::try_from(ok_bytes)?;
                    self.handler.no_result_set(ok_bytes)?;
                    next_result(ok_payload.status_flags)
                }
                ExecuteResponse::ResultSet { column_count } => {
                    self.handler.resultset_start(column_count)?;
                    self.state = ExecState::ReadingColumns {
                        num_columns: column_count,
                        remaining: column_count,
                    };
                    return Ok(Action::NeedPacket(&mut buffer_set.column_definition_buffer));
                }
            },

            ExecState::ReadingColumns {
                num_columns,
                remaining,
            } => {
                let payload = &buffer_set.column_definition_buffer[..];
                if let Some(0xFF) = payload.first() {
                    return Err(ErrPayloadBytes(payload).into());
                }
                self.handler.col(ColumnDefinitionBytes(payload))?;
                match (remaining - 1, self.deprecate_eof) {
                    (0, true) => ExecState::ReadingRows { num_columns },
                    (0, false) => ExecState::ReadingColumnsEof { num_columns },
                    (remaining, _) => {
                        self.state = ExecState::ReadingColumns {
                            num_columns,
                            remaining,
                        };
                        return Ok(Action::NeedPacket(&mut buffer_set.column_definition_buffer));
                    }
                }
            }

            ExecState::ReadingColumnsEof { num_columns } => {
                read_resultset_end(&buffer_set.read_buffer, false)?;
                ExecState::ReadingRows { num_columns }
            }

            ExecState::ReadingRows { num_columns } => {
                let payload = &buffer_set.read_buffer[..];
                match payload.first() {
                    Some(0x00) => {
                        let row = read_binary_row(payload, num_columns)?;
                        self.handler.row(&row)?;
                        ExecState::ReadingRows { num_columns }
                    }
                    Some(0xFE) if is_eof_packet(payload) => {
                        let status_flags = read_resultset_end(payload, self.deprecate_eof)?;
                        self.handler.resultset_end(status_flags)?;
                        next_result(status_flags)
                    }
                    Some(0xFF) => return Err(ErrPayloadBytes(payload).into()),
                    _ => return Err(Error::InvalidPacket),
                }
            }

            ExecState::Finished => {
                return Err(Error::LibraryBug(eyre!("Exec::step called after finish")));
            }
        };

        match self.state {
            ExecState::Finished => Ok(Action::Finished),
            _ => Ok(Action::NeedPacket(&mut buffer_set.read_buffer)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_ok_parsing() {
        let payload = [0x00, 0x07, 0, 0, 0, 0x02, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00];
        let ok = read_prepare_ok(&payload).unwrap();
        assert_eq!(ok.statement_id(), 7);
        assert_eq!(ok.num_columns(), 2);
        assert_eq!(ok.num_params(), 1);
        assert_eq!(ok.warning_count(), 0);

        // truncated payload is an error, not a panic
        assert!(read_prepare_ok(&payload[..5]).is_err());

        let mut err = vec![0xFF];
        err.extend_from_slice(&1064u16.to_le_bytes());
        err.extend_from_slice(b"#42000syntax");
        let Err(Error::ServerError(e)) = read_prepare_ok(&err) else {
            panic!("expected a server error");
        };
        assert_eq!(e.error_code, 1064);
    }

    #[test]
    fn execute_layout() {
        let mut out = Vec::new();
        write_execute(&mut out, 1, 2, &(-1i8, None::<i32>)).unwrap();
        assert_eq!(
            out,
            vec![
                0x17, // COM_STMT_EXECUTE
                1, 0, 0, 0, // statement id
                0x00, // flags
                1, 0, 0, 0,    // iteration count
                0b10, // NULL bitmap
                0x01, // new params bound
                0x01, 0x00, 0x06, 0x00, // types
                0xFF, // values
            ]
        );
    }

    #[test]
    fn execute_without_params() {
        let mut out = Vec::new();
        write_execute(&mut out, 0x0102_0304, 0, &()).unwrap();
        assert_eq!(out, vec![0x17, 4, 3, 2, 1, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn execute_param_count_mismatch() {
        let mut out = Vec::new();
        assert!(matches!(
            write_execute(&mut out, 1, 2, &(1i32,)),
            Err(Error::BadUsageError(_))
        ));
    }

    #[test]
    fn zero_column_result_set_is_invalid() {
        assert!(matches!(
            read_execute_response(&[0xFC, 0x00, 0x00]),
            Err(Error::InvalidPacket)
        ));

        let mut collector = crate::handler::RowCollector::new();
        let mut exec = Exec::new(&mut collector, false);
        let mut buffer_set = BufferSet::new();
        assert!(matches!(
            exec.step(&mut buffer_set),
            Ok(Action::NeedPacket(_))
        ));
        buffer_set.read_buffer = vec![0xFC, 0x00, 0x00];
        assert!(matches!(exec.step(&mut buffer_set), Err(Error::InvalidPacket)));
    }

    #[test]
    fn close_statement() {
        let mut out = Vec::new();
        write_close_statement(&mut out, 9);
        assert_eq!(out, vec![0x19, 9, 0, 0, 0]);
    }
}
