//! Horse search-list parser and URL file helpers

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use reqwest::Url;

use super::layout::TableLayout;
use super::table::extract_rows;
use super::ScraperError;
use crate::error::{require_file, Result};
use crate::models::{Field, SkipReason};

/// Horse detail URLs found on one list page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HorseListPage {
    pub urls: Vec<String>,
    pub skipped: Vec<SkipReason>,
}

/// Parse the detail links out of one search result page
pub fn parse_horse_list(
    html: &str,
    layout: &TableLayout,
    base_url: &str,
) -> std::result::Result<HorseListPage, ScraperError> {
    let mut page = HorseListPage::default();

    for row in extract_rows(html, layout)? {
        match row {
            Ok(raw) => match raw.get(Field::HorseLink).filter(|href| !href.is_empty()) {
                Some(href) => match resolve_url(base_url, href) {
                    Some(url) => page.urls.push(url),
                    None => page.skipped.push(SkipReason::InvalidLink(href.to_string())),
                },
                None => page.skipped.push(SkipReason::MissingCell {
                    field: Field::HorseLink,
                    column: layout
                        .locator(Field::HorseLink)
                        .map(|l| l.column)
                        .unwrap_or_default(),
                }),
            },
            Err(reason) => page.skipped.push(reason),
        }
    }

    Ok(page)
}

/// URLs of list pages 1..=pages; page 1 is the search URL itself
pub fn list_page_urls(search_url: &str, pages: u32) -> Vec<String> {
    (1..=pages)
        .map(|page| {
            if page == 1 {
                search_url.to_string()
            } else {
                format!("{}&page={}", search_url, page)
            }
        })
        .collect()
}

/// Resolve a possibly relative href against the page URL
///
/// `None` when the base is not an absolute URL or the join fails.
pub fn resolve_url(base_url: &str, href: &str) -> Option<String> {
    Url::parse(base_url)
        .and_then(|base| base.join(href))
        .ok()
        .map(|url| url.to_string())
}

/// Drop repeated URLs, keeping the first occurrence
pub fn dedup_urls(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
}

pub fn write_url_file<P: AsRef<Path>>(path: P, urls: &[String]) -> Result<()> {
    let mut file = std::fs::File::create(path.as_ref())?;
    for url in urls {
        writeln!(file, "{}", url)?;
    }
    Ok(())
}

/// Read a URL list, one per line, ignoring blank lines
pub fn read_url_file<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    require_file(path)?;
    Ok(std::fs::read_to_string(path)?
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::tests::temp_path;

    const SEARCH: &str = "https://db.netkeiba.com/?pid=horse_list&list=100&sort=prize";

    fn list_page(rows: &[&str]) -> String {
        let body: String = rows
            .iter()
            .map(|href| {
                if href.is_empty() {
                    "<tr><td>-</td><td>抹消</td></tr>".to_string()
                } else {
                    format!("<tr><td>1</td><td><a href=\"{}\">馬</a></td></tr>", href)
                }
            })
            .collect();
        format!(
            r#"<html><body><form id="result_form"><table>
            <tr><th>No</th><th>馬名</th></tr>{}</table></form></body></html>"#,
            body
        )
    }

    #[test]
    fn test_parse_horse_list() {
        let html = list_page(&["/horse/2015104961/", "", "https://db.netkeiba.com/horse/2019105219/"]);
        let page = parse_horse_list(&html, &TableLayout::horse_list(), SEARCH).unwrap();

        assert_eq!(
            page.urls,
            vec![
                "https://db.netkeiba.com/horse/2015104961/".to_string(),
                "https://db.netkeiba.com/horse/2019105219/".to_string(),
            ]
        );
        assert_eq!(page.skipped.len(), 2);
    }

    #[test]
    fn test_list_page_urls() {
        let urls = list_page_urls(SEARCH, 3);
        assert_eq!(urls.len(), 3);
        assert_eq!(urls[0], SEARCH);
        assert_eq!(urls[2], format!("{}&page=3", SEARCH));
    }

    #[test]
    fn test_resolve_url() {
        let resolved = |base: &str, href: &str| resolve_url(base, href).unwrap();
        assert_eq!(
            resolved("https://db.netkeiba.com/?pid=x", "/horse/1/"),
            "https://db.netkeiba.com/horse/1/"
        );
        assert_eq!(
            resolved("https://db.netkeiba.com", "horse/1/"),
            "https://db.netkeiba.com/horse/1/"
        );
        assert_eq!(
            resolved("https://db.netkeiba.com/", "//race.netkeiba.com/x"),
            "https://race.netkeiba.com/x"
        );
        assert_eq!(
            resolved("https://db.netkeiba.com/horse/1/", "https://db.netkeiba.com/horse/2/"),
            "https://db.netkeiba.com/horse/2/"
        );
    }

    #[test]
    fn test_resolve_url_relative_to_page_directory() {
        assert_eq!(
            resolve_url("https://db.netkeiba.com/horse/list/", "2019105219/").as_deref(),
            Some("https://db.netkeiba.com/horse/list/2019105219/")
        );
        assert_eq!(
            resolve_url("https://db.netkeiba.com/horse/list/", "../2019105219/").as_deref(),
            Some("https://db.netkeiba.com/horse/2019105219/")
        );
        assert_eq!(
            resolve_url("https://db.netkeiba.com/horse/list/page.html", "./2019105219/").as_deref(),
            Some("https://db.netkeiba.com/horse/list/2019105219/")
        );
    }

    #[test]
    fn test_unresolvable_link_is_skipped() {
        assert_eq!(resolve_url("db.netkeiba.com/list", "horse/1/"), None);

        let html = list_page(&["../horse/2015104961/"]);
        let page = parse_horse_list(&html, &TableLayout::horse_list(), "not a url").unwrap();
        assert!(page.urls.is_empty());
        assert!(page
            .skipped
            .contains(&SkipReason::InvalidLink("../horse/2015104961/".to_string())));
    }

    #[test]
    fn test_dedup_urls_keeps_first() {
        let urls = vec!["a".to_string(), "b".to_string(), "a".to_string(), "c".to_string()];
        assert_eq!(dedup_urls(urls), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_url_file_round_trip() {
        let path = temp_path("horse_urls.txt");
        let urls = vec!["https://x/1".to_string(), "https://x/2".to_string()];
        write_url_file(&path, &urls).unwrap();
        assert_eq!(read_url_file(&path).unwrap(), urls);
        std::fs::remove_file(&path).ok();
    }
}
