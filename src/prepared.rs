use crate::col::Column;

/// A server-side prepared statement
///
/// Not `Clone`: the statement id is released by `Conn::close_statement`, which consumes the
/// statement.
#[derive(Debug)]
pub struct Statement {
    id: u32,
    params: Vec<Column>,
    columns: Vec<Column>,
}

impl Statement {
    pub(crate) fn new(id: u32, params: Vec<Column>, columns: Vec<Column>) -> Self {
        Self {
            id,
            params,
            columns,
        }
    }

    /// Statement id assigned by the server
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Metadata of the `?` placeholders
    pub fn params(&self) -> &[Column] {
        &self.params
    }

    pub fn num_params(&self) -> usize {
        self.params.len()
    }

    /// Metadata of the result set columns, empty for statements without a result set
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}
