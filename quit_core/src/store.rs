//! Storage boundary: named tables of string cells.
//!
//! The tracker persists two tables (`Settings` and `Logs`). Components take a
//! `&impl TableStore` at construction so tests can inject an in-memory store.

use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Mutex;

/// Header plus rows of string cells
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Create an empty table with the given header
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Create a table with the given header and rows
    pub fn with_rows(columns: &[&str], rows: Vec<Vec<String>>) -> Self {
        Self {
            rows,
            ..Self::new(columns)
        }
    }

    /// Position of a column, matched case-insensitively
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.trim().eq_ignore_ascii_case(name))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Cell at `index`, or "" when the row is short
pub fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(String::as_str).unwrap_or("")
}

/// Named-table store
///
/// `read` distinguishes a missing table (`Ok(None)`) from a failed read
/// (`Err`). `overwrite` replaces a whole table atomically.
pub trait TableStore {
    fn read(&self, table: &str) -> Result<Option<Table>>;

    fn overwrite(&self, table: &str, contents: &Table) -> Result<()>;

    /// Append rows laid out as `columns`
    ///
    /// The default is a plain read-then-overwrite with no serialization
    /// between concurrent callers. Stores that can do better override it.
    fn append_rows(&self, table: &str, columns: &[&str], rows: Vec<Vec<String>>) -> Result<()> {
        let updated = merge_append(self.read(table)?, table, columns, rows)?;
        self.overwrite(table, &updated)
    }
}

/// Build the table that results from appending `rows` (laid out as `columns`)
/// to `existing`
///
/// New rows are re-ordered to match the stored header; stored columns the
/// caller doesn't supply are left blank. A stored header missing one of
/// `columns` is a schema mismatch.
pub(crate) fn merge_append(
    existing: Option<Table>,
    table: &str,
    columns: &[&str],
    rows: Vec<Vec<String>>,
) -> Result<Table> {
    let mut target = match existing {
        Some(t) if !t.columns.is_empty() => t,
        _ => return Ok(Table::with_rows(columns, rows)),
    };

    let laid_out = lay_out_rows(&target.columns, table, columns, rows)?;
    target.rows.extend(laid_out);
    Ok(target)
}

/// Re-order `rows` (laid out as `columns`) to match a stored `header`
pub(crate) fn lay_out_rows(
    header: &[String],
    table: &str,
    columns: &[&str],
    rows: Vec<Vec<String>>,
) -> Result<Vec<Vec<String>>> {
    let mut positions = Vec::with_capacity(columns.len());
    for name in columns {
        let index = header.iter().position(|c| c == name).ok_or_else(|| {
            Error::Schema(format!("table '{}' has no column '{}'", table, name))
        })?;
        positions.push(index);
    }

    let width = header.len();
    Ok(rows
        .into_iter()
        .map(|row| {
            let mut laid_out = vec![String::new(); width];
            for (value, &index) in row.into_iter().zip(&positions) {
                laid_out[index] = value;
            }
            laid_out
        })
        .collect())
}

/// In-process table store
///
/// Appends hold the mutex for the whole read-modify-write.
#[derive(Debug, Default)]
pub struct MemoryTableStore {
    tables: Mutex<HashMap<String, Table>>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Table>>> {
        self.tables
            .lock()
            .map_err(|_| Error::Storage("memory store lock poisoned".into()))
    }
}

impl TableStore for MemoryTableStore {
    fn read(&self, table: &str) -> Result<Option<Table>> {
        Ok(self.lock()?.get(table).cloned())
    }

    fn overwrite(&self, table: &str, contents: &Table) -> Result<()> {
        self.lock()?.insert(table.to_string(), contents.clone());
        Ok(())
    }

    fn append_rows(&self, table: &str, columns: &[&str], rows: Vec<Vec<String>>) -> Result<()> {
        let mut tables = self.lock()?;
        let updated = merge_append(tables.get(table).cloned(), table, columns, rows)?;
        tables.insert(table.to_string(), updated);
        Ok(())
    }
}

/// Store whose every operation fails, for exercising error paths
#[cfg(test)]
pub(crate) struct UnavailableStore;

#[cfg(test)]
impl TableStore for UnavailableStore {
    fn read(&self, table: &str) -> Result<Option<Table>> {
        Err(Error::Storage(format!("cannot reach table '{}'", table)))
    }

    fn overwrite(&self, table: &str, _contents: &Table) -> Result<()> {
        Err(Error::Storage(format!("cannot reach table '{}'", table)))
    }
}
