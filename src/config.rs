use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub cachedir: Option<String>,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(skip)]
    pub debug_logs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default)]
    pub tlscert: Option<String>,
    #[serde(default)]
    pub tlskey: Option<String>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: None,
            port: default_port(),
            tlscert: None,
            tlskey: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default)]
    pub sqlite: Option<SqliteConfig>,
    #[serde(default)]
    pub rest: Option<RestConfig>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
            sqlite: None,
            rest: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SqliteConfig {
    pub filename: String,
}

/// A PostgREST-style endpoint, e.g. a Supabase project.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RestConfig {
    pub url: String,
    #[serde(default)]
    pub apikey: Option<String>,
    #[serde(alias = "timeoutsecs", default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(alias = "baseurl", default)]
    pub base_url: Option<String>,
    #[serde(alias = "poweredbyurl", default)]
    pub powered_by_url: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            description: default_description(),
            base_url: None,
            powered_by_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DisplayConfig {
    #[serde(alias = "assetsdir", default)]
    pub assets_dir: Option<String>,
    #[serde(alias = "posterwidth", default = "default_poster_width")]
    pub poster_width: u32,
    #[serde(alias = "posterquality", default = "default_poster_quality")]
    pub poster_quality: u32,
    #[serde(alias = "transitionms", default = "default_transition_ms")]
    pub transition_ms: u64,
    #[serde(alias = "preloadposters", default = "default_true")]
    pub preload_posters: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            assets_dir: None,
            poster_width: default_poster_width(),
            poster_quality: default_poster_quality(),
            transition_ms: default_transition_ms(),
            preload_posters: true,
        }
    }
}

fn default_port() -> String {
    "8080".to_string()
}

fn default_table() -> String {
    "show_list".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_title() -> String {
    "Pursuit of Greatness".to_string()
}

fn default_description() -> String {
    "Shows for those in the pursuit of greatness.".to_string()
}

fn default_poster_width() -> u32 {
    640
}

fn default_poster_quality() -> u32 {
    75
}

fn default_transition_ms() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_string(), e))?;

        Self::from_yaml(&content).map_err(|e| ConfigError::ParseError(path.to_string(), e))
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    pub fn get_image_cache_dir(&self) -> PathBuf {
        let base = self.cachedir.as_deref().unwrap_or("./cache");
        PathBuf::from(base).join("images")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(String, std::io::Error),
    #[error("Failed to parse config file {0}: {1}")]
    ParseError(String, serde_yaml::Error),
    #[error("No catalog backend configured (need catalog.sqlite or catalog.rest)")]
    NoCatalog,
}
