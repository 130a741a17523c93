//! Row representation for query results.

use crate::error::TypeError;
use crate::value::{FromValue, Value};

/// A row from a query result.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<Column>,
    values: Vec<Value>,
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Column index.
    pub index: usize,
    /// Whether the column is nullable.
    pub nullable: bool,
}

impl Row {
    /// Create a new row from columns and values.
    ///
    /// Drivers build rows; callers only read them.
    #[must_use]
    pub fn new(columns: Vec<Column>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Build a row from `(name, value)` pairs, deriving column metadata.
    #[must_use]
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for (index, (name, value)) in pairs.into_iter().enumerate() {
            columns.push(Column {
                name,
                index,
                nullable: value.is_null(),
            });
            values.push(value);
        }
        Self { columns, values }
    }

    /// Get a value by column index.
    pub fn get<T: FromValue>(&self, index: usize) -> Result<T, TypeError> {
        self.values
            .get(index)
            .ok_or_else(|| TypeError::NoSuchColumn(format!("index {index}")))
            .and_then(T::from_value)
    }

    /// Get a value by column name (case-insensitive).
    pub fn get_by_name<T: FromValue>(&self, name: &str) -> Result<T, TypeError> {
        let index = self
            .position(name)
            .ok_or_else(|| TypeError::NoSuchColumn(name.to_string()))?;
        self.get(index)
    }

    /// Try to get a value by column index, returning `None` if NULL or absent.
    pub fn try_get<T: FromValue>(&self, index: usize) -> Option<T> {
        self.values
            .get(index)
            .and_then(|v| T::from_value_nullable(v).ok().flatten())
    }

    /// Try to get a value by column name, returning `None` if NULL or absent.
    pub fn try_get_by_name<T: FromValue>(&self, name: &str) -> Option<T> {
        self.try_get(self.position(name)?)
    }

    /// Get the raw value by index.
    #[must_use]
    pub fn get_raw(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get the raw value by column name.
    #[must_use]
    pub fn get_raw_by_name(&self, name: &str) -> Option<&Value> {
        self.position(name).and_then(|i| self.values.get(i))
    }

    /// Get the number of columns in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get the column metadata.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Iterate over (column, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Column, &Value)> {
        self.columns.iter().zip(self.values.iter())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}

impl IntoIterator for Row {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
