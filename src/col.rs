use crate::constant::{ColumnFlags, ColumnType};
use crate::error::{Error, Result};
use crate::protocol::command::{ColumnDefinition, ColumnDefinitionBytes, ColumnTypeAndFlags};

/// Column metadata of a result set or of a statement's parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub schema: String,
    pub table: String,
    pub org_table: String,
    /// Name (or alias) as it appears in the result set
    pub name: String,
    pub org_name: String,
    pub charset: u16,
    /// Display length
    pub column_length: u32,
    pub column_type: ColumnType,
    pub flags: ColumnFlags,
    pub decimals: u8,
}

impl Column {
    pub fn type_and_flags(&self) -> ColumnTypeAndFlags {
        ColumnTypeAndFlags {
            column_type: self.column_type,
            flags: self.flags,
        }
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

impl TryFrom<ColumnDefinitionBytes<'_>> for Column {
    type Error = Error;

    fn try_from(bytes: ColumnDefinitionBytes<'_>) -> Result<Self> {
        let def = ColumnDefinition::try_from(bytes)?;
        Ok(Self {
            schema: lossy(def.schema),
            table: lossy(def.table_alias),
            org_table: lossy(def.table_original),
            name: lossy(def.name_alias),
            org_name: lossy(def.name_original),
            charset: def.tail.charset(),
            column_length: def.tail.column_length(),
            column_type: def.tail.column_type()?,
            flags: def.tail.flags(),
            decimals: def.tail.decimals(),
        })
    }
}
