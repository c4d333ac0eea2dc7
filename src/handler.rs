use std::sync::Arc;

use crate::col::Column;
use crate::constant::ServerStatusFlags;
use crate::error::Result;
use crate::prepared::Statement;
use crate::protocol::command::prepared::PrepareOk;
use crate::protocol::command::{ColumnDefinitionBytes, ColumnTypeAndFlags};
use crate::protocol::r#trait::{BinaryResultSetHandler, PrepareHandler, TextResultSetHandler};
use crate::protocol::response::{OkPayload, OkPayloadBytes};
use crate::protocol::{BinaryRowPayload, TextRowPayload};
use crate::row::Row;
use crate::value::Value;

/// A handler that materializes every row of every result set
///
/// Rows of consecutive result sets (multi-statements, stored procedures) are concatenated.
/// Also captures affected_rows and last_insert_id of the last OK packet.
#[derive(Debug, Default)]
pub struct RowCollector {
    /// Column definitions of the current result set until its first row
    pending: Vec<Column>,
    columns: Option<Arc<[Column]>>,
    types: Vec<ColumnTypeAndFlags>,
    rows: Vec<Row>,
    affected_rows: u64,
    last_insert_id: u64,
    status_flags: ServerStatusFlags,
}

impl RowCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of affected rows from the last operation
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    /// Get the last insert ID from the last operation
    pub fn last_insert_id(&self) -> u64 {
        self.last_insert_id
    }

    pub fn status_flags(&self) -> ServerStatusFlags {
        self.status_flags
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    fn ok(&mut self, ok: OkPayloadBytes) -> Result<()> {
        let payload = OkPayload::try_from(ok)?;
        self.affected_rows = payload.affected_rows;
        self.last_insert_id = payload.last_insert_id;
        self.status_flags = payload.status_flags;
        Ok(())
    }

    fn start(&mut self, num_columns: usize) {
        self.pending = Vec::with_capacity(num_columns);
        self.columns = None;
        self.types.clear();
        self.affected_rows = 0;
        self.last_insert_id = 0;
    }

    fn push_column(&mut self, col: ColumnDefinitionBytes) -> Result<()> {
        self.pending.push(Column::try_from(col)?);
        Ok(())
    }

    /// The shared column list of the current result set
    fn columns(&mut self) -> Arc<[Column]> {
        match &self.columns {
            Some(columns) => Arc::clone(columns),
            None => {
                let columns: Arc<[Column]> = std::mem::take(&mut self.pending).into();
                self.types = columns.iter().map(Column::type_and_flags).collect();
                self.columns = Some(Arc::clone(&columns));
                columns
            }
        }
    }
}

impl BinaryResultSetHandler for RowCollector {
    fn no_result_set(&mut self, ok: OkPayloadBytes) -> Result<()> {
        self.ok(ok)
    }

    fn resultset_start(&mut self, num_columns: usize) -> Result<()> {
        self.start(num_columns);
        Ok(())
    }

    fn col(&mut self, col: ColumnDefinitionBytes) -> Result<()> {
        self.push_column(col)
    }

    fn row(&mut self, row: &BinaryRowPayload) -> Result<()> {
        let columns = self.columns();
        let values = row
            .split(&self.types)?
            .into_iter()
            .zip(columns.iter())
            .map(|(bytes, col)| Value::binary(col, bytes))
            .collect();
        self.rows.push(Row::new(columns, values));
        Ok(())
    }

    fn resultset_end(&mut self, status_flags: ServerStatusFlags) -> Result<()> {
        self.status_flags = status_flags;
        Ok(())
    }
}

impl TextResultSetHandler for RowCollector {
    fn no_result_set(&mut self, ok: OkPayloadBytes) -> Result<()> {
        self.ok(ok)
    }

    fn resultset_start(&mut self, num_columns: usize) -> Result<()> {
        self.start(num_columns);
        Ok(())
    }

    fn col(&mut self, col: ColumnDefinitionBytes) -> Result<()> {
        self.push_column(col)
    }

    fn row(&mut self, row: &TextRowPayload) -> Result<()> {
        let columns = self.columns();
        let values = row
            .split(columns.len())?
            .into_iter()
            .zip(columns.iter())
            .map(|(bytes, col)| Value::text(col, bytes))
            .collect();
        self.rows.push(Row::new(columns, values));
        Ok(())
    }

    fn resultset_end(&mut self, status_flags: ServerStatusFlags) -> Result<()> {
        self.status_flags = status_flags;
        Ok(())
    }
}

/// Builds a [`Statement`] from a COM_STMT_PREPARE response
#[derive(Debug, Default)]
pub struct StatementCollector {
    statement_id: u32,
    params: Vec<Column>,
    columns: Vec<Column>,
}

impl StatementCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_statement(self) -> Statement {
        Statement::new(self.statement_id, self.params, self.columns)
    }
}

impl PrepareHandler for StatementCollector {
    fn prepare_ok(&mut self, prepare_ok: &PrepareOk) -> Result<()> {
        self.statement_id = prepare_ok.statement_id();
        self.params = Vec::with_capacity(usize::from(prepare_ok.num_params()));
        self.columns = Vec::with_capacity(usize::from(prepare_ok.num_columns()));
        Ok(())
    }

    fn param(&mut self, param: ColumnDefinitionBytes) -> Result<()> {
        self.params.push(Column::try_from(param)?);
        Ok(())
    }

    fn col(&mut self, col: ColumnDefinitionBytes) -> Result<()> {
        self.columns.push(Column::try_from(col)?);
        Ok(())
    }
}
