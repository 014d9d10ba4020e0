//! Horse past-performance page parser
//!
//! Every row of the results table already carries its own race-level fields,
//! so no shared context is needed.

use super::layout::TableLayout;
use super::table::extract_rows;
use super::ScraperError;
use crate::data::{AssembledPage, RecordAssembler};

/// Parse one horse page into result records
pub fn parse_horse_results(
    html: &str,
    layout: &TableLayout,
    assembler: &RecordAssembler,
) -> Result<AssembledPage, ScraperError> {
    let rows = extract_rows(html, layout)?;
    Ok(assembler.assemble_page(rows, None))
}
