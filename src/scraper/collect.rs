//! Sequential multi-page collection
//!
//! Pages are fetched one after another. A page that cannot be fetched, or
//! has no table, contributes zero records and the run moves on; only local
//! write failures stop it.

use tracing::{info, warn};

use super::client::{PageSource, ScraperError};
use super::entries::parse_race_card;
use super::horse_list::parse_horse_list;
use super::layout::TableLayout;
use super::results::parse_horse_results;
use crate::data::{AssembledPage, DatasetWriter, RecordAssembler};
use crate::error::Result;
use crate::models::RaceContext;

/// What happened to one page
#[derive(Debug, Clone, PartialEq)]
pub enum PageStatus {
    Collected { records: usize, skipped: usize },
    NoTable,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageReport {
    pub url: String,
    pub status: PageStatus,
}

/// Totals over a whole collection run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectSummary {
    pub pages_ok: usize,
    pub pages_failed: usize,
    pub records: usize,
    pub rows_skipped: usize,
}

impl CollectSummary {
    fn record(&mut self, status: &PageStatus) {
        match status {
            PageStatus::Collected { records, skipped } => {
                self.pages_ok += 1;
                self.records += records;
                self.rows_skipped += skipped;
            }
            PageStatus::NoTable => self.pages_ok += 1,
            PageStatus::Failed(_) => self.pages_failed += 1,
        }
    }
}

/// Fetch each horse page and append its results to the dataset
pub async fn collect_results<S, F>(
    source: &S,
    urls: &[String],
    layout: &TableLayout,
    writer: &mut DatasetWriter,
    mut on_page: F,
) -> Result<CollectSummary>
where
    S: PageSource + ?Sized,
    F: FnMut(&PageReport),
{
    let assembler = RecordAssembler::new();
    let mut summary = CollectSummary::default();

    for url in urls {
        let status = match fetch_results(source, url, layout, &assembler).await {
            Ok(page) => {
                let written = writer.append(&page.records)?;
                if page.records.is_empty() {
                    warn!("No valid rows on {} ({} skipped)", url, page.skipped_count());
                }
                PageStatus::Collected {
                    records: written,
                    skipped: page.skipped_count(),
                }
            }
            Err(ScraperError::TableNotFound(table)) => {
                warn!("Results table {} not found on {}", table, url);
                PageStatus::NoTable
            }
            Err(e) => {
                warn!("Failed to fetch {}: {}", url, e);
                PageStatus::Failed(e.to_string())
            }
        };

        summary.record(&status);
        on_page(&PageReport {
            url: url.clone(),
            status,
        });
    }

    info!(
        "Collected {} records from {} pages ({} failed, {} rows skipped)",
        summary.records, summary.pages_ok, summary.pages_failed, summary.rows_skipped
    );
    Ok(summary)
}

async fn fetch_results<S: PageSource + ?Sized>(
    source: &S,
    url: &str,
    layout: &TableLayout,
    assembler: &RecordAssembler,
) -> std::result::Result<AssembledPage, ScraperError> {
    let html = source.fetch(url).await?;
    parse_horse_results(&html, layout, assembler)
}

/// Walk the search list pages and gather horse detail URLs
pub async fn collect_horse_urls<S, F>(
    source: &S,
    page_urls: &[String],
    layout: &TableLayout,
    mut on_page: F,
) -> (Vec<String>, CollectSummary)
where
    S: PageSource + ?Sized,
    F: FnMut(&PageReport),
{
    let mut urls = Vec::new();
    let mut summary = CollectSummary::default();

    for page_url in page_urls {
        let parsed = match source.fetch(page_url).await {
            Ok(html) => parse_horse_list(&html, layout, page_url),
            Err(e) => Err(e),
        };

        let status = match parsed {
            Ok(page) => {
                let status = PageStatus::Collected {
                    records: page.urls.len(),
                    skipped: page.skipped.len(),
                };
                urls.extend(page.urls);
                status
            }
            Err(ScraperError::TableNotFound(_)) => {
                warn!("Horse list table not found on {}", page_url);
                PageStatus::NoTable
            }
            Err(e) => {
                warn!("Failed to fetch {}: {}", page_url, e);
                PageStatus::Failed(e.to_string())
            }
        };

        summary.record(&status);
        on_page(&PageReport {
            url: page_url.clone(),
            status,
        });
    }

    info!("Found {} horse URLs", urls.len());
    (urls, summary)
}

/// Fetch one race card and assemble its entries
pub async fn collect_entries<S: PageSource + ?Sized>(
    source: &S,
    url: &str,
    layout: &TableLayout,
    context: &RaceContext,
) -> std::result::Result<AssembledPage, ScraperError> {
    let html = source.fetch(url).await?;
    let page = parse_race_card(&html, layout, &RecordAssembler::new(), context)?;
    info!(
        "Race card {}: {} entries, {} rows skipped",
        url,
        page.records.len(),
        page.skipped_count()
    );
    Ok(page)
}
