//! Web scraper for netkeiba.com
//!
//! Collects horse detail URLs from the search list, past-performance rows
//! from each horse page and entries from a race card. Table positions live in
//! [`TableLayout`] values, not in the parsing code.
//!
//! # Example
//!
//! ```no_run
//! use keiba::data::DatasetWriter;
//! use keiba::models::Column;
//! use keiba::scraper::{collect_results, HttpFetcher, ScraperConfig, TableLayout};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let fetcher = HttpFetcher::new(ScraperConfig::default())?;
//!     let mut writer = DatasetWriter::open("all_horses_race_data_appended.csv", &Column::RESULT_ORDER)?;
//!     let urls = vec!["https://db.netkeiba.com/horse/2015104961/".to_string()];
//!
//!     let summary = collect_results(&fetcher, &urls, &TableLayout::horse_results(), &mut writer, |_| {}).await?;
//!     println!("Appended {} rows", summary.records);
//!     Ok(())
//! }
//! ```

mod client;
mod collect;
mod entries;
mod horse_list;
mod layout;
mod results;
mod table;

pub use client::{BodyDecoder, HttpFetcher, PageSource, ScraperConfig, ScraperError};
pub use collect::{
    collect_entries, collect_horse_urls, collect_results, CollectSummary, PageReport, PageStatus,
};
pub use entries::{parse_race_card, write_entry_list, EntryFileNamer};
pub use horse_list::{
    dedup_urls, list_page_urls, parse_horse_list, read_url_file, resolve_url, write_url_file,
    HorseListPage,
};
pub use layout::{CellTarget, FieldLocator, TableLayout};
pub use results::parse_horse_results;
pub use table::extract_rows;
