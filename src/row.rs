use std::fmt;
use std::sync::Arc;

use crate::col::Column;
use crate::value::Value;

/// A fully decoded row
///
/// Values are paired by position with the columns of the result set, which all rows of
/// that result set share.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[Column]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[Column]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// The value of the first column named `name`
    pub fn column(&self, name: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|col| col.name == name)?;
        self.values.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Column, &Value)> {
        self.columns.iter().zip(self.values.iter())
    }
}

/// `{"name": "value", "other": NULL}`
impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (col, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if value.is_null() {
                write!(f, "{:?}: NULL", col.name)?;
            } else {
                write!(f, "{:?}: {:?}", col.name, value.to_string())?;
            }
        }
        f.write_str("}")
    }
}
