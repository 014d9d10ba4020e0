//! Row extraction driven by a [`TableLayout`]

use scraper::{ElementRef, Html, Selector};

use super::layout::{CellTarget, FieldLocator, TableLayout};
use super::ScraperError;
use crate::data::RawRow;
use crate::models::SkipReason;

fn selector(css: &str) -> Result<Selector, ScraperError> {
    Selector::parse(css).map_err(|e| ScraperError::ParseError(format!("{}: {}", css, e)))
}

/// Extract every row of the layout's table
///
/// Returns `TableNotFound` when the page has no such table. Rows that lack a
/// located cell come back as `Err(SkipReason)` so the caller can count them.
pub fn extract_rows(
    html: &str,
    layout: &TableLayout,
) -> Result<Vec<Result<RawRow, SkipReason>>, ScraperError> {
    let document = Html::parse_document(html);
    let table_selector = selector(&layout.table)?;
    let row_selector = selector(&layout.row)?;
    let cell_selector = selector("td")?;
    let link_selector = selector("a")?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| ScraperError::TableNotFound(layout.table.clone()))?;

    let mut rows = Vec::new();
    for row in table.select(&row_selector) {
        let cells: Vec<ElementRef> = row.select(&cell_selector).collect();
        if cells.is_empty() {
            rows.push(Err(SkipReason::NoCells));
            continue;
        }

        rows.push(extract_row(&cells, &layout.fields, &link_selector));
    }

    Ok(rows)
}

fn extract_row(
    cells: &[ElementRef],
    fields: &[FieldLocator],
    link_selector: &Selector,
) -> Result<RawRow, SkipReason> {
    let mut raw = RawRow::new();
    for locator in fields {
        let missing = SkipReason::MissingCell {
            field: locator.field,
            column: locator.column,
        };
        let cell = cells.get(locator.column).ok_or_else(|| missing.clone())?;

        let value = match &locator.target {
            CellTarget::Text => Some(element_text(cell)),
            CellTarget::LinkText => cell.select(link_selector).next().map(|a| element_text(&a)),
            CellTarget::Href => cell
                .select(link_selector)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(str::to_string),
            CellTarget::ClassText(class) => Selector::parse(&format!(".{}", class))
                .ok()
                .and_then(|sel| cell.select(&sel).next().map(|el| element_text(&el))),
        };

        raw.insert(locator.field, value.ok_or(missing)?);
    }
    Ok(raw)
}

/// Element text with runs of whitespace collapsed
fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
