//! CSV-file table store with file locking.
//!
//! Each table lives in `<dir>/<Table>.csv` with a header row. Overwrites go
//! to a temp file in the same directory which is synced and renamed over the
//! original, so a reader never sees a half-written table. Appends to an
//! existing table add bytes to the end of the file and never rewrite stored
//! rows; padding and skipping of bad rows only happen in what `read` returns.
//! A sidecar `<dir>/.<Table>.lock` file carries the advisory lock, since the
//! data file itself is replaced on overwrite.

use crate::store::{lay_out_rows, Table, TableStore};
use crate::{Error, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Table store backed by one CSV file per table
#[derive(Clone, Debug)]
pub struct CsvTableStore {
    dir: PathBuf,
}

/// Held advisory lock on a table's sidecar lock file
struct TableLock {
    file: File,
}

impl TableLock {
    fn open(path: &Path) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        Ok(file)
    }

    fn shared(path: &Path) -> Result<Self> {
        let file = Self::open(path)?;
        FileExt::lock_shared(&file)?;
        Ok(Self { file })
    }

    fn exclusive(path: &Path) -> Result<Self> {
        let file = Self::open(path)?;
        FileExt::lock_exclusive(&file)?;
        Ok(Self { file })
    }
}

impl Drop for TableLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl CsvTableStore {
    /// Create a store rooted at `dir` (created lazily on first write)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the CSV file backing `table`
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", table))
    }

    fn lock_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!(".{}.lock", table))
    }

    fn check_table_name(table: &str) -> Result<()> {
        let valid = !table.is_empty()
            && table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(())
        } else {
            Err(Error::Storage(format!("invalid table name '{}'", table)))
        }
    }

    fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Read a table without taking the lock; caller holds it
    fn read_unlocked(&self, table: &str) -> Result<Option<Table>> {
        let path = self.table_path(table);
        if !path.exists() {
            return Ok(None);
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&path)?;

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let width = columns.len();
        let mut rows = Vec::new();

        for (line, result) in reader.records().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(
                        "Skipping unreadable row {} of table '{}': {}",
                        line + 1,
                        table,
                        e
                    );
                    continue;
                }
            };

            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            if row.len() != width {
                tracing::warn!(
                    "Row {} of table '{}' has {} cells, expected {}",
                    line + 1,
                    table,
                    row.len(),
                    width
                );
                row.resize(width, String::new());
            }
            rows.push(row);
        }

        tracing::debug!("Read {} rows from table '{}'", rows.len(), table);
        Ok(Some(Table { columns, rows }))
    }

    /// Header of a stored table, `None` when the file is missing or empty
    fn read_header_unlocked(&self, table: &str) -> Result<Option<Vec<String>>> {
        let path = self.table_path(table);
        if !path.exists() {
            return Ok(None);
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&path)?;
        let columns: Vec<String> = reader
            .byte_headers()?
            .iter()
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect();

        Ok(if columns.is_empty() { None } else { Some(columns) })
    }

    /// Add rows to the end of an existing table file; caller holds the lock
    fn append_unlocked(&self, table: &str, rows: &[Vec<String>]) -> Result<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(self.table_path(table))?;

        // A last row without its line terminator would swallow the first new one
        if file.metadata()?.len() > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                file.write_all(b"\n")?;
            }
        }

        {
            let mut writer = csv::Writer::from_writer(&file);
            for row in rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }

        file.sync_all()?;
        Ok(())
    }

    /// Atomically replace a table without taking the lock; caller holds it
    fn write_unlocked(&self, table: &str, contents: &Table) -> Result<()> {
        // Temp file in the same directory so the rename stays on one filesystem
        let temp = NamedTempFile::new_in(&self.dir)?;

        {
            let mut writer = csv::Writer::from_writer(temp.as_file());
            writer.write_record(&contents.columns)?;
            for row in &contents.rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }

        temp.as_file().sync_all()?;

        // Atomically replace the old table file
        temp.persist(self.table_path(table))
            .map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Wrote {} rows to table '{}'", contents.len(), table);
        Ok(())
    }
}

impl TableStore for CsvTableStore {
    fn read(&self, table: &str) -> Result<Option<Table>> {
        Self::check_table_name(table)?;
        if !self.table_path(table).exists() {
            return Ok(None);
        }

        let _lock = TableLock::shared(&self.lock_path(table))?;
        self.read_unlocked(table)
    }

    fn overwrite(&self, table: &str, contents: &Table) -> Result<()> {
        Self::check_table_name(table)?;
        self.ensure_dir()?;

        let _lock = TableLock::exclusive(&self.lock_path(table))?;
        self.write_unlocked(table, contents)
    }

    /// Append under the exclusive lock so concurrent appenders queue up
    /// instead of overwriting each other's rows
    fn append_rows(&self, table: &str, columns: &[&str], rows: Vec<Vec<String>>) -> Result<()> {
        Self::check_table_name(table)?;
        self.ensure_dir()?;

        let _lock = TableLock::exclusive(&self.lock_path(table))?;
        let count = rows.len();
        match self.read_header_unlocked(table)? {
            Some(header) => {
                let laid_out = lay_out_rows(&header, table, columns, rows)?;
                self.append_unlocked(table, &laid_out)?;
            }
            None => self.write_unlocked(table, &Table::with_rows(columns, rows))?,
        }

        tracing::debug!("Appended {} rows to table '{}'", count, table);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_read_missing_table() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = CsvTableStore::new(temp_dir.path().join("tables"));

        assert!(store.read("Logs").unwrap().is_none());
        // Reading must not create the directory
        assert!(!temp_dir.path().join("tables").exists());
    }

    #[test]
    fn test_overwrite_and_read_back() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = CsvTableStore::new(temp_dir.path());

        let table = Table::with_rows(
            &["Key", "Value"],
            vec![row(&["cost_per_pack", "12.5"]), row(&["note", "has, comma"])],
        );
        store.overwrite("Settings", &table).unwrap();

        let loaded = store.read("Settings").unwrap().unwrap();
        assert_eq!(loaded, table);
    }

    #[test]
    fn test_overwrite_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = CsvTableStore::new(temp_dir.path());

        store
            .overwrite("Settings", &Table::new(&["Key", "Value"]))
            .unwrap();

        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name != "Settings.csv" && name != ".Settings.lock")
            .collect();
        assert!(extras.is_empty(), "unexpected files: {:?}", extras);
    }

    #[test]
    fn test_ragged_rows_are_padded() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("Logs.csv"), "A,B,C\n1,2\n3,4,5,6\n").unwrap();

        let store = CsvTableStore::new(temp_dir.path());
        let table = store.read("Logs").unwrap().unwrap();
        assert_eq!(table.rows, vec![row(&["1", "2", ""]), row(&["3", "4", "5"])]);
    }

    #[test]
    fn test_append_keeps_stored_rows_verbatim() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("Logs.csv");
        let original: &[u8] = b"A,B\n1,2\n3,caf\xe9\n5,6,extra\n";
        std::fs::write(&path, original).unwrap();

        let store = CsvTableStore::new(temp_dir.path());
        store
            .append_rows("Logs", &["A", "B"], vec![row(&["7", "8"])])
            .unwrap();

        let mut expected = original.to_vec();
        expected.extend_from_slice(b"7,8\n");
        assert_eq!(std::fs::read(&path).unwrap(), expected);
    }

    #[test]
    fn test_append_after_unterminated_last_row() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("Logs.csv");
        std::fs::write(&path, "A,B\n1,2").unwrap();

        let store = CsvTableStore::new(temp_dir.path());
        store
            .append_rows("Logs", &["A", "B"], vec![row(&["7", "8"])])
            .unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "A,B\n1,2\n7,8\n");
        let table = store.read("Logs").unwrap().unwrap();
        assert_eq!(table.rows, vec![row(&["1", "2"]), row(&["7", "8"])]);
    }

    #[test]
    fn test_append_follows_stored_column_order() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("Logs.csv");
        std::fs::write(&path, "B,A,C\n").unwrap();

        let store = CsvTableStore::new(temp_dir.path());
        store
            .append_rows("Logs", &["A", "B"], vec![row(&["a", "b"])])
            .unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "B,A,C\nb,a,\n");
    }

    #[test]
    fn test_append_schema_mismatch_leaves_file_alone() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("Logs.csv");
        std::fs::write(&path, "A,C\n1,2\n").unwrap();

        let store = CsvTableStore::new(temp_dir.path());
        let err = store
            .append_rows("Logs", &["A", "B"], vec![row(&["7", "8"])])
            .unwrap_err();

        assert!(matches!(err, Error::Schema(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "A,C\n1,2\n");
    }

    #[test]
    fn test_append_creates_missing_table() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = CsvTableStore::new(temp_dir.path().join("tables"));

        store
            .append_rows("Logs", &["A", "B"], vec![row(&["1", "2"])])
            .unwrap();

        let content = std::fs::read_to_string(store.table_path("Logs")).unwrap();
        assert_eq!(content, "A,B\n1,2\n");
    }

    #[test]
    fn test_rejects_path_like_table_names() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = CsvTableStore::new(temp_dir.path());

        let err = store.read("../escape").unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn test_concurrent_appends_are_all_kept() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CsvTableStore::new(temp_dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for j in 0..5 {
                        let cells = vec![i.to_string(), j.to_string()];
                        store
                            .append_rows("Logs", &["Writer", "Seq"], vec![cells])
                            .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let table = store.read("Logs").unwrap().unwrap();
        assert_eq!(table.len(), 40);
    }
}
