//! HTTP page fetcher for netkeiba.com

use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Scraper errors
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to parse HTML: {0}")]
    ParseError(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),
}

/// Fetcher configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Pause after each page load, in milliseconds
    pub settle_ms: u64,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            settle_ms: 3000,
            timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        }
    }
}

/// Source of page HTML, one URL at a time
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, ScraperError>;
}

/// reqwest-backed page source
pub struct HttpFetcher {
    client: reqwest::Client,
    config: ScraperConfig,
    decoder: BodyDecoder,
}

impl HttpFetcher {
    pub fn new(config: ScraperConfig) -> Result<Self, ScraperError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            config,
            decoder: BodyDecoder::new(),
        })
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    /// Fetch and decode one page, then wait for the settle delay
    async fn fetch(&self, url: &str) -> Result<String, ScraperError> {
        tracing::debug!("GET {}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;
        let html = self.decoder.decode(&body, content_type.as_deref());

        tokio::time::sleep(Duration::from_millis(self.config.settle_ms)).await;
        Ok(html)
    }
}

/// Page body decoder
///
/// netkeiba serves EUC-JP; the charset is taken from the `Content-Type`
/// header first, then from a `<meta>` tag near the top of the document, and
/// falls back to UTF-8.
pub struct BodyDecoder {
    charset_pattern: Regex,
}

impl Default for BodyDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BodyDecoder {
    pub fn new() -> Self {
        Self {
            charset_pattern: Regex::new(r#"(?i)charset\s*=\s*["']?([A-Za-z0-9_\-]+)"#).unwrap(),
        }
    }

    pub fn decode(&self, body: &[u8], content_type: Option<&str>) -> String {
        let encoding = content_type
            .and_then(|ct| self.charset_label(ct))
            .or_else(|| self.meta_charset(body))
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .unwrap_or(UTF_8);

        let (text, used, had_errors) = encoding.decode(body);
        if had_errors {
            tracing::warn!("Malformed {} sequences replaced while decoding", used.name());
        }
        text.into_owned()
    }

    fn charset_label(&self, content_type: &str) -> Option<String> {
        self.charset_pattern
            .captures(content_type)
            .map(|c| c[1].to_string())
    }

    fn meta_charset(&self, body: &[u8]) -> Option<String> {
        let head = &body[..body.len().min(2048)];
        self.charset_label(&String::from_utf8_lossy(head))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ScraperConfig::default();
        assert_eq!(config.settle_ms, 3000);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_decode_euc_jp_from_header() {
        let (bytes, _, _) = encoding_rs::EUC_JP.encode("<td>晴</td>");
        let html = BodyDecoder::new().decode(&bytes, Some("text/html; charset=EUC-JP"));
        assert_eq!(html, "<td>晴</td>");
    }

    #[test]
    fn test_one_decoder_serves_many_pages() {
        let decoder = BodyDecoder::new();
        let (euc, _, _) = encoding_rs::EUC_JP.encode("<td>不良</td>");
        let (sjis, _, _) = encoding_rs::SHIFT_JIS.encode("<td>重</td>");
        assert_eq!(decoder.decode(&euc, Some("text/html; charset=euc-jp")), "<td>不良</td>");
        assert_eq!(decoder.decode(&sjis, Some("text/html; charset=Shift_JIS")), "<td>重</td>");
        assert_eq!(decoder.decode("<td>良</td>".as_bytes(), None), "<td>良</td>");
    }

    #[test]
    fn test_decode_euc_jp_from_meta() {
        let source = r#"<html><head><meta http-equiv="Content-Type" content="text/html; charset=euc-jp"></head><body>良</body></html>"#;
        let (bytes, _, _) = encoding_rs::EUC_JP.encode(source);
        let html = BodyDecoder::new().decode(&bytes, Some("text/html"));
        assert!(html.contains("良"));
    }

    #[test]
    fn test_decode_defaults_to_utf8() {
        let html = BodyDecoder::new().decode("稍重".as_bytes(), None);
        assert_eq!(html, "稍重");
    }

    #[test]
    fn test_charset_label() {
        let decoder = BodyDecoder::new();
        assert_eq!(
            decoder.charset_label("text/html; charset=\"UTF-8\""),
            Some("UTF-8".to_string())
        );
        assert_eq!(decoder.charset_label("text/html"), None);
    }
}
