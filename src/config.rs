//! Configuration for bookharvest.
//!
//! Loaded from a TOML file (explicit `--config`, else a `bookharvest` config
//! discovered by `prefer` in its standard locations, else built-in defaults),
//! then overridden by environment variables. Every field has a default so a
//! partial file is valid.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::SearchType;

/// Name `prefer` discovers config files under.
pub const CONFIG_NAME: &str = "bookharvest";

/// File written by `init`.
pub const DEFAULT_CONFIG_FILE: &str = "bookharvest.toml";

/// Environment variable overriding `database`.
pub const ENV_DATABASE: &str = "BOOKHARVEST_DATABASE";
/// Environment variable overriding `base_url`.
pub const ENV_BASE_URL: &str = "BOOKHARVEST_BASE_URL";

const DEFAULT_BASE_URL: &str = "https://www.goodreads.com";
const DEFAULT_SEARCH_URL_TEMPLATE: &str =
    "https://www.goodreads.com/search?q={query}&page={page}&search_type={search_type}&tab={tab}";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file.
    pub database: PathBuf,
    /// Prefix for relative hrefs found on search result pages.
    pub base_url: String,
    /// Search page URL with `{query}`, `{page}`, `{search_type}` and `{tab}` placeholders.
    pub search_url_template: String,
    /// CSS selector matching result anchors, per search type.
    pub item_selector_by_search_type: BTreeMap<String, String>,
    pub selectors: SelectorConfig,
    pub fetch: FetchConfig,
    pub lock: LockConfig,
    pub schedule: ScheduleConfig,
}

impl Default for Config {
    fn default() -> Self {
        let mut items = BTreeMap::new();
        items.insert(SearchType::Books.as_str().to_string(), "a.bookTitle".to_string());
        items.insert(SearchType::Groups.as_str().to_string(), "a.groupName".to_string());

        Self {
            database: PathBuf::from("bookharvest.db"),
            base_url: DEFAULT_BASE_URL.to_string(),
            search_url_template: DEFAULT_SEARCH_URL_TEMPLATE.to_string(),
            item_selector_by_search_type: items,
            selectors: SelectorConfig::default(),
            fetch: FetchConfig::default(),
            lock: LockConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

/// Detail page selectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub book_title: String,
    /// First match is used as the description.
    pub book_description: String,
    pub book_thumbnail: String,
    pub book_author: String,
    pub book_genres: String,
    /// Genre labels to drop (e.g. the "...more" toggle).
    pub ignored_genre_labels: Vec<String>,
    /// Required container on a group page.
    pub group_content: String,
    /// Title element, searched within `group_content`.
    pub group_title: String,
    pub group_thumbnail: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            book_title: "h1.Text.Text__title1".to_string(),
            book_description: "div.DetailsLayoutRightParagraph__widthConstrained span".to_string(),
            book_thumbnail: r#"img.ResponsiveImage[role="presentation"]"#.to_string(),
            book_author: "span.ContributorLink__name".to_string(),
            book_genres:
                r#"ul.CollapsableList[aria-label="Top genres for this book"] span.Button__labelItem"#
                    .to_string(),
            ignored_genre_labels: vec!["...more".to_string()],
            group_content: "div.mainContentFloat".to_string(),
            group_title: "h1".to_string(),
            group_thumbnail: "a.groupPicLink img".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Lower bound of the random delay slept before every request.
    pub min_delay_ms: u64,
    /// Upper bound of the random delay slept before every request.
    pub max_delay_ms: u64,
    /// None: built-in browser user agent. "impersonate": random real browser
    /// user agent. Anything else is sent as-is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            min_delay_ms: 2000,
            max_delay_ms: 5000,
            user_agent: None,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// SQLite busy timeout applied to every connection.
    pub busy_timeout_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay_ms: 2000,
            busy_timeout_ms: 5000,
        }
    }
}

impl LockConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub search_interval_secs: u64,
    pub sweep_books_interval_secs: u64,
    pub sweep_groups_interval_secs: u64,
    /// How often the daemon drains the dispatch outbox.
    pub dispatch_poll_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            search_interval_secs: 3,
            sweep_books_interval_secs: 60,
            sweep_groups_interval_secs: 60,
            dispatch_poll_ms: 1000,
        }
    }
}

/// Options for loading configuration.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Database path (--database flag), applied after environment overrides.
    pub database: Option<PathBuf>,
}

impl Config {
    /// Load configuration: file, then environment, then CLI overrides.
    pub async fn load(options: &LoadOptions) -> Result<Self, ConfigError> {
        let mut config = match &options.config_path {
            Some(path) => Self::from_file(path)?,
            None => Self::discover().await?,
        };

        config.apply_env_overrides();
        if let Some(database) = &options.database {
            config.database = database.clone();
        }

        config.validate()?;
        Ok(config)
    }

    /// Find a config file with `prefer`, then parse it with serde.
    async fn discover() -> Result<Self, ConfigError> {
        match prefer::load(CONFIG_NAME).await {
            Ok(found) => match found.source_path() {
                Some(path) => Self::from_file(path),
                None => Ok(Self::default()),
            },
            Err(_) => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse a TOML config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loaded config from: {}", path.display());
        Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(database) = std::env::var(ENV_DATABASE).ok().filter(|s| !s.is_empty()) {
            self.database = PathBuf::from(database);
        }
        if let Some(base_url) = std::env::var(ENV_BASE_URL).ok().filter(|s| !s.is_empty()) {
            self.base_url = base_url;
        }
    }

    /// Check that the settings can drive a scrape.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::Invalid("base_url is empty".to_string()));
        }
        if !self.search_url_template.contains("{query}") {
            return Err(ConfigError::Invalid(
                "search_url_template must contain {query}".to_string(),
            ));
        }
        for search_type in [SearchType::Books, SearchType::Groups] {
            if self.item_selector(search_type).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "item_selector_by_search_type is missing '{}'",
                    search_type
                )));
            }
        }
        if self.fetch.min_delay_ms > self.fetch.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "fetch.min_delay_ms ({}) exceeds fetch.max_delay_ms ({})",
                self.fetch.min_delay_ms, self.fetch.max_delay_ms
            )));
        }
        Ok(())
    }

    /// Item anchor selector for a search type.
    pub fn item_selector(&self, search_type: SearchType) -> Option<&str> {
        self.item_selector_by_search_type
            .get(search_type.as_str())
            .map(|s| s.as_str())
    }

    /// Build the URL of one search results page.
    pub fn search_url(&self, keyword: &str, page: u32, search_type: SearchType) -> String {
        self.search_url_template
            .replace("{query}", &urlencoding::encode(keyword))
            .replace("{page}", &page.to_string())
            .replace("{search_type}", search_type.as_str())
            .replace("{tab}", search_type.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.item_selector(SearchType::Books), Some("a.bookTitle"));
        assert_eq!(config.lock.max_retries, 5);
        assert_eq!(config.lock.retry_delay(), Duration::from_secs(2));
        assert_eq!(config.schedule.search_interval_secs, 3);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            base_url = "http://localhost:8080"

            [fetch]
            min_delay_ms = 0
            max_delay_ms = 0

            [lock]
            max_retries = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.fetch.max_delay_ms, 0);
        assert_eq!(config.fetch.timeout_secs, 30);
        assert_eq!(config.lock.max_retries, 2);
        assert_eq!(config.lock.retry_delay_ms, 2000);
        assert_eq!(config.selectors, SelectorConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn test_search_url_placeholders() {
        let config = Config::default();
        assert_eq!(
            config.search_url("Dune Messiah", 2, SearchType::Books),
            "https://www.goodreads.com/search?q=Dune%20Messiah&page=2&search_type=books&tab=books"
        );
    }

    #[test]
    fn test_validate_rejects_missing_item_selector() {
        let config = Config::from_toml(
            r#"
            [item_selector_by_search_type]
            books = "a.bookTitle"
            "#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_delay() {
        let mut config = Config::default();
        config.fetch.min_delay_ms = 10;
        config.fetch.max_delay_ms = 5;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_load_explicit_file_and_database_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "search_url_template = \"http://x/s?q={query}&p={page}\"\n").unwrap();

        let config = Config::load(&LoadOptions {
            config_path: Some(path),
            database: Some(dir.path().join("flag.db")),
        })
        .await
        .unwrap();
        assert_eq!(config.search_url_template, "http://x/s?q={query}&p={page}");
        assert_eq!(config.database, dir.path().join("flag.db"));
    }

    #[tokio::test]
    async fn test_load_without_path_discovers_or_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&LoadOptions {
            config_path: None,
            database: Some(dir.path().join("flag.db")),
        })
        .await
        .unwrap();
        // Whatever discovery finds, the flag still wins
        assert_eq!(config.database, dir.path().join("flag.db"));
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_error() {
        let err = Config::load(&LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/bookharvest.toml")),
            database: None,
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
