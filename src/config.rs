//! Pipeline configuration
//!
//! Loaded from `keiba.toml`. Every section and field is optional; anything
//! left out takes the built-in default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::predictor::Imputation;
use crate::scraper::{ScraperConfig, TableLayout};
use crate::trainer::TrainingOptions;

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "KEIBA_CONFIG";
/// Config file picked up from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "keiba.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layouts {
    pub horse_results: TableLayout,
    pub race_card: TableLayout,
    pub horse_list: TableLayout,
}

impl Default for Layouts {
    fn default() -> Self {
        Self {
            horse_results: TableLayout::horse_results(),
            race_card: TableLayout::race_card(),
            horse_list: TableLayout::horse_list(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeSection {
    #[serde(flatten)]
    pub client: ScraperConfig,
    /// Horse search result list; page 1 of the URL collection
    pub horse_list_url: String,
    pub list_pages: u32,
    pub layouts: Layouts,
}

impl Default for ScrapeSection {
    fn default() -> Self {
        Self {
            client: ScraperConfig::default(),
            horse_list_url: "https://db.netkeiba.com/?pid=horse_list&word=&match=partial_match\
                &sire=&keito=&mare=&bms=&trainer=&owner=&breeder=&sex%5B%5D=1&sex%5B%5D=2\
                &under_age=3&over_age=none&under_birthmonth=1&over_birthmonth=12\
                &under_birthday=1&over_birthday=31&grade%5B%5D=4&grade%5B%5D=3\
                &prize_min=&prize_max=&sort=prize&list=100"
                .to_string(),
            list_pages: 49,
            layouts: Layouts::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub url_list: PathBuf,
    pub dataset: PathBuf,
    pub cleaned: PathBuf,
    /// Directory holding the model and encoder artifacts
    pub model_dir: PathBuf,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            url_list: PathBuf::from("horse_urls_all_pages.txt"),
            dataset: PathBuf::from("all_horses_race_data_appended.csv"),
            cleaned: PathBuf::from("cleaned_race_data.csv"),
            model_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionSection {
    pub imputation: Imputation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub scrape: ScrapeSection,
    pub paths: PathsSection,
    pub training: TrainingOptions,
    pub prediction: PredictionSection,
}

impl PipelineConfig {
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_str(&content)?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// `flag`, else `$KEIBA_CONFIG`, else `./keiba.toml` if present, else defaults
    pub fn resolve(flag: Option<&Path>) -> Result<Self, ConfigError> {
        let env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        Self::resolve_from(flag, env.as_deref(), Path::new(DEFAULT_CONFIG_FILE))
    }

    fn resolve_from(
        flag: Option<&Path>,
        env: Option<&Path>,
        local: &Path,
    ) -> Result<Self, ConfigError> {
        match flag.or(env) {
            Some(path) => Self::load(path),
            None if local.exists() => Self::load(local),
            None => Ok(Self::default()),
        }
    }
}
