use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::release::github::DEFAULT_BASE_URL;
use crate::release::merger::MergeOptions;

// =============================================================================
// Fetch-related constants
// =============================================================================

/// Default number of pages fetched per update
pub const DEFAULT_MAX_PAGES: u32 = 5;

/// Largest page size the GitHub releases endpoint accepts
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page size for the first fetch of a repository
pub const DEFAULT_INITIAL_PAGE_SIZE: u32 = 100;

/// Page size when a cache exists and only recent releases are expected
pub const DEFAULT_INCREMENTAL_PAGE_SIZE: u32 = 30;

/// Delay between two page fetches (1 second)
pub const PAGE_DELAY_MS: u64 = 1000;

/// Window for the "recent releases" count in reports
pub const RECENT_WINDOW_DAYS: i64 = 90;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid option: {0}")]
    Invalid(String),

    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Configuration file structure
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    pub github: GitHubConfig,
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct GitHubConfig {
    pub base_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Paging defaults, overridden by command-line flags
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct FetchConfig {
    pub max_pages: u32,
    pub page_size: Option<u32>,
    pub page_delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            page_size: None,
            page_delay_ms: PAGE_DELAY_MS,
        }
    }
}

impl AppConfig {
    /// Load the config file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Fully resolved parameters of one update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateConfig {
    pub owner: String,
    pub repo: String,
    pub max_pages: u32,
    /// `None` picks a size depending on whether a cache exists
    pub page_size: Option<u32>,
    pub auth_token: Option<String>,
    pub page_delay_ms: u64,
}

impl UpdateConfig {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            max_pages: DEFAULT_MAX_PAGES,
            page_size: None,
            auth_token: None,
            page_delay_ms: PAGE_DELAY_MS,
        }
    }

    /// Check the parameters once, before any fetch happens
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.owner.trim().is_empty() {
            return Err(ConfigError::Invalid("owner must not be empty".to_string()));
        }
        if self.repo.trim().is_empty() {
            return Err(ConfigError::Invalid("repo must not be empty".to_string()));
        }
        if self.max_pages == 0 {
            return Err(ConfigError::Invalid(
                "max pages must be at least 1".to_string(),
            ));
        }
        if self.page_size == Some(0) {
            return Err(ConfigError::Invalid(
                "page size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the paging budget for an update
    pub fn merge_options(&self, has_cache: bool) -> MergeOptions {
        let default_size = if has_cache {
            DEFAULT_INCREMENTAL_PAGE_SIZE
        } else {
            DEFAULT_INITIAL_PAGE_SIZE
        };
        let mut page_size = self.page_size.unwrap_or(default_size);
        if page_size > MAX_PAGE_SIZE {
            warn!("Page size too large, setting to {}", MAX_PAGE_SIZE);
            page_size = MAX_PAGE_SIZE;
        }

        MergeOptions {
            max_pages: self.max_pages,
            page_size,
            page_delay: Duration::from_millis(self.page_delay_ms),
        }
    }
}

/// Returns the path to the data directory for release-cadence.
/// Uses $XDG_DATA_HOME/release-cadence if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/release-cadence,
/// or ./release-cadence if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the database file.
pub fn db_path() -> PathBuf {
    data_dir().join("releases.db")
}

/// Returns the path to the config file.
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Name of the log file inside the data directory.
pub const LOG_FILE_NAME: &str = "release-cadence.log";

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("release-cadence")
}
