//! Tabular dataset with a fixed column order
//!
//! Reading goes through polars with every column loaded as text, so the
//! cleaner and the trainer see exactly what was written. Writing uses a small
//! hand-rolled CSV emitter that always produces UTF-8 with a BOM.

use polars::prelude::*;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{require_file, PipelineError, Result};
use crate::models::{Column, RaceRecord};

const BOM: &str = "\u{feff}";

/// Ordered rows of text cells sharing one header
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a dataset from records in the given column order
    pub fn from_records(records: &[RaceRecord], order: &[Column]) -> Self {
        Self {
            columns: Column::headers(order),
            rows: records.iter().map(|r| r.to_row(order)).collect(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell text, or `None` for short rows
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column).map(String::as_str)
    }

    /// All values of one column (short rows yield "")
    pub fn column_values(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).map(String::as_str).unwrap_or(""))
                .collect(),
        )
    }

    /// Keep only the rows for which `keep` returns true
    pub fn filter_rows<F>(&self, mut keep: F) -> Dataset
    where
        F: FnMut(&[String]) -> bool,
    {
        Dataset {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Load a CSV file, every column as text
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        require_file(path)?;

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        let dataset = Self::from_dataframe(&df)?;
        info!(
            "Loaded {} rows x {} columns from {:?}",
            dataset.len(),
            dataset.columns.len(),
            path
        );
        Ok(dataset)
    }

    fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let columns: Vec<String> = df
            .get_columns()
            .iter()
            .map(|c| c.name().to_string().trim_start_matches('\u{feff}').to_string())
            .collect();

        let text_columns = df
            .get_columns()
            .iter()
            .map(|c| c.str())
            .collect::<std::result::Result<Vec<_>, PolarsError>>()?;

        let mut rows = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            rows.push(
                text_columns
                    .iter()
                    .map(|ca| ca.get(i).unwrap_or("").to_string())
                    .collect(),
            );
        }

        Ok(Self { columns, rows })
    }

    /// Write the whole dataset, replacing any existing file
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path.as_ref())?;
        write!(file, "{}", BOM)?;
        write_line(&mut file, &self.columns)?;
        for row in &self.rows {
            write_line(&mut file, row)?;
        }
        Ok(())
    }
}

/// Append-only writer for the scraped result dataset
///
/// A missing or empty destination is created with the header; an existing
/// one must carry the same header and only receives new rows.
pub struct DatasetWriter {
    path: PathBuf,
    order: Vec<Column>,
    rows_written: usize,
}

impl DatasetWriter {
    pub fn open<P: AsRef<Path>>(path: P, order: &[Column]) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let expected = Column::headers(order);

        if has_content(&path)? {
            let found = read_header(&path)?;
            if found != expected {
                return Err(PipelineError::HeaderMismatch {
                    path,
                    expected,
                    found,
                });
            }
            ensure_trailing_newline(&path)?;
        } else {
            let mut file = File::create(&path)?;
            write!(file, "{}", BOM)?;
            write_line(&mut file, &expected)?;
            info!("Created {:?}", path);
        }

        Ok(Self {
            path,
            order: order.to_vec(),
            rows_written: 0,
        })
    }

    /// Append one batch; returns the number of rows written
    pub fn append(&mut self, batch: &[RaceRecord]) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        for record in batch {
            write_line(&mut file, &record.to_row(&self.order))?;
        }
        file.flush()?;

        self.rows_written += batch.len();
        Ok(batch.len())
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Whether the file holds anything besides a BOM and whitespace
fn has_content(path: &Path) -> Result<bool> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    let bom = BOM.as_bytes();
    for (i, byte) in BufReader::new(file).bytes().enumerate() {
        let byte = byte?;
        if i < bom.len() && byte == bom[i] {
            continue;
        }
        if !byte.is_ascii_whitespace() {
            return Ok(true);
        }
    }
    Ok(false)
}

fn read_header(path: &Path) -> Result<Vec<String>> {
    let mut first = String::new();
    BufReader::new(File::open(path)?).read_line(&mut first)?;
    Ok(first
        .trim_start_matches('\u{feff}')
        .trim_end_matches(['\r', '\n'])
        .split(',')
        .map(|s| s.trim_matches('"').to_string())
        .collect())
}

fn ensure_trailing_newline(path: &Path) -> Result<()> {
    let mut file = OpenOptions::new().read(true).append(true).open(path)?;
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    if last[0] != b'\n' {
        file.write_all(b"\n")?;
    }
    Ok(())
}

fn write_line<W: Write, S: AsRef<str>>(out: &mut W, cells: &[S]) -> std::io::Result<()> {
    let line: Vec<String> = cells.iter().map(|c| escape_field(c.as_ref())).collect();
    writeln!(out, "{}", line.join(","))
}

/// Quote a CSV field when it contains a separator, quote or line break
fn escape_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
