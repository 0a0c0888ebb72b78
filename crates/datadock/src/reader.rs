//! Reads delimited files into raw in-memory tables. Header detection is
//! left to schema inference, so every record (including the first) comes
//! back as data.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::config::TableFormat;
use crate::error::ReadError;

/// The raw contents of one tabular file.
#[derive(Debug, Clone)]
pub struct TableData {
    pub path: PathBuf,
    pub file_name: String,
    pub format: TableFormat,
    /// Every record in file order, first row included.
    pub records: Vec<Vec<String>>,
}

impl TableData {
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Widest record in the file.
    pub fn column_count(&self) -> usize {
        self.records.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Reads `path` as CSV or TSV based on its extension. Records may have
/// uneven lengths; blank lines are skipped.
pub fn read_table(path: &Path) -> Result<TableData, ReadError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let format = TableFormat::from_extension(ext)
        .ok_or_else(|| ReadError::UnsupportedFormat(path.display().to_string()))?;
    let file = File::open(path).map_err(|source| ReadError::OpenFile {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(format.delimiter())
        .from_reader(file);

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| ReadError::ParseFile {
            path: path.to_path_buf(),
            source,
        })?;
        records.push(record.iter().map(str::to_string).collect());
    }

    if records.is_empty() {
        return Err(ReadError::EmptyFile(path.to_path_buf()));
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(TableData {
        path: path.to_path_buf(),
        file_name,
        format,
        records,
    })
}
