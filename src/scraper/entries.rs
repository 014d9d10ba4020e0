//! Race card (出馬表) scraper
//!
//! Entry rows carry only per-horse fields; race name, weather, round, field
//! size and track condition come from the [`RaceContext`] supplied by the
//! user.

use regex::Regex;
use std::path::Path;

use super::layout::TableLayout;
use super::table::extract_rows;
use super::ScraperError;
use crate::data::{AssembledPage, Dataset, RecordAssembler};
use crate::error::Result;
use crate::models::{Column, RaceContext, RaceRecord};

/// Parse the entry table of a race card page
pub fn parse_race_card(
    html: &str,
    layout: &TableLayout,
    assembler: &RecordAssembler,
    context: &RaceContext,
) -> std::result::Result<AssembledPage, ScraperError> {
    let rows = extract_rows(html, layout)?;
    let page = assembler.assemble_page(rows, Some(context));

    for record in &page.records {
        tracing::info!(
            "Entry: {} {}",
            record
                .horse_number
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".to_string()),
            record.horse_name.as_deref().unwrap_or("")
        );
    }

    Ok(page)
}

/// Builds entry-list file names: `predict_data_<race name>.csv`
///
/// Characters that are unsafe in file names are replaced with `-`.
pub struct EntryFileNamer {
    unsafe_chars: Regex,
}

impl Default for EntryFileNamer {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryFileNamer {
    pub fn new() -> Self {
        Self {
            unsafe_chars: Regex::new(r#"[\\/:?."<>|]"#).unwrap(),
        }
    }

    pub fn file_name(&self, race_name: &str) -> String {
        format!(
            "predict_data_{}.csv",
            self.unsafe_chars.replace_all(race_name, "-")
        )
    }
}

/// Write entry records as a fresh CSV in entry-list column order
pub fn write_entry_list<P: AsRef<Path>>(path: P, records: &[RaceRecord]) -> Result<()> {
    Dataset::from_records(records, &Column::ENTRY_ORDER).write_csv(path.as_ref())?;
    tracing::info!("Wrote {} entries to {:?}", records.len(), path.as_ref());
    Ok(())
}
