//! Dataset cleaner
//!
//! Removes every row that has a missing cell in any column. Surviving rows
//! keep their text and their relative order.

use serde::Serialize;
use std::path::Path;
use tracing::info;

use crate::data::dataset::Dataset;
use crate::error::Result;

/// Cell texts treated as missing, in addition to empty or blank cells
pub const NULL_MARKERS: [&str; 11] = [
    "NaN", "nan", "-NaN", "NA", "N/A", "n/a", "#N/A", "NULL", "null", "None", "<NA>",
];

/// Row counts before and after cleaning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub rows_before: usize,
    pub rows_after: usize,
    pub rows_removed: usize,
}

/// Whether a cell counts as missing
pub fn is_missing(cell: &str) -> bool {
    let text = cell.trim();
    text.is_empty() || NULL_MARKERS.contains(&text)
}

/// Drop rows with any missing or absent cell
pub fn clean(dataset: &Dataset) -> (Dataset, CleanReport) {
    let width = dataset.columns().len();
    let cleaned = dataset.filter_rows(|row| row.len() == width && !row.iter().any(|c| is_missing(c)));

    let report = CleanReport {
        rows_before: dataset.len(),
        rows_after: cleaned.len(),
        rows_removed: dataset.len() - cleaned.len(),
    };
    (cleaned, report)
}

/// Clean a CSV file into a new file with the same header
pub fn clean_file<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<CleanReport> {
    let dataset = Dataset::read_csv(input.as_ref())?;
    let (cleaned, report) = clean(&dataset);
    cleaned.write_csv(output.as_ref())?;

    info!(
        "Cleaned {:?}: {} rows -> {} rows ({} removed)",
        input.as_ref(),
        report.rows_before,
        report.rows_after,
        report.rows_removed
    );
    Ok(report)
}
