pub mod param;
pub mod params;


use crate::constant::ServerStatusFlags;
use crate::error::Result;
use crate::protocol::command::ColumnDefinitionBytes;
use crate::protocol::command::prepared::PrepareOk;
use crate::protocol::response::OkPayloadBytes;
use crate::protocol::{BinaryRowPayload, TextRowPayload};

/// Trait that defines event callbacks for binary protocol result sets
pub trait BinaryResultSetHandler {
    fn no_result_set(&mut self, ok: OkPayloadBytes) -> Result<()>;
    fn resultset_start(&mut self, num_columns: usize) -> Result<()>;
    fn col(&mut self, col: ColumnDefinitionBytes) -> Result<()>;
    fn row(&mut self, row: &BinaryRowPayload) -> Result<()>;
    fn resultset_end(&mut self, status_flags: ServerStatusFlags) -> Result<()>;
}

/// Trait that defines event callbacks for text protocol result sets
pub trait TextResultSetHandler {
    fn no_result_set(&mut self, ok: OkPayloadBytes) -> Result<()>;
    fn resultset_start(&mut self, num_columns: usize) -> Result<()>;
    fn col(&mut self, col: ColumnDefinitionBytes) -> Result<()>;
    fn row(&mut self, row: &TextRowPayload) -> Result<()>;
    fn resultset_end(&mut self, status_flags: ServerStatusFlags) -> Result<()>;
}

/// Trait that defines event callbacks for a COM_STMT_PREPARE response
pub trait PrepareHandler {
    fn prepare_ok(&mut self, prepare_ok: &PrepareOk) -> Result<()>;
    fn param(&mut self, param: ColumnDefinitionBytes) -> Result<()>;
    fn col(&mut self, col: ColumnDefinitionBytes) -> Result<()>;
}
