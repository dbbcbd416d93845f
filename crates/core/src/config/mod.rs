//! Application configuration with layered loading.
//!
//! Sources, highest precedence first:
//!
//! 1. Environment variables (ORC_*, `__` separates nested keys)
//! 2. TOML config file (if ORC_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::ExpirationPolicy;

mod validation;

pub use validation::ConfigError;

/// Caching strategy named by a runtime rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
pub enum StrategyKind {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
    NetworkOnly,
}

/// One precache manifest entry.
///
/// Accepts both `"/a.js"` and `{"url": "/a.js", "revision": "..."}` forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPrecacheEntry")]
pub struct PrecacheEntry {
    pub url: String,
    pub revision: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPrecacheEntry {
    Url(String),
    Entry {
        url: String,
        #[serde(default)]
        revision: Option<String>,
    },
}

impl From<RawPrecacheEntry> for PrecacheEntry {
    fn from(raw: RawPrecacheEntry) -> Self {
        match raw {
            RawPrecacheEntry::Url(url) => Self { url, revision: None },
            RawPrecacheEntry::Entry { url, revision } => Self { url, revision },
        }
    }
}

impl PrecacheEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), revision: None }
    }
}

/// A user-declared route evaluated before the built-in table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeRule {
    /// Regex matched against the full request URL.
    pub url_pattern: String,
    pub handler: StrategyKind,
    pub cache_name: String,
    #[serde(default)]
    pub expiration: ExpirationPolicy,
    /// Statuses allowed into the store; absent means any 2xx.
    #[serde(default)]
    pub cacheable_statuses: Option<Vec<u16>>,
}

/// Names of the runtime stores.
///
/// Rename a store whenever its retention policy changes so differently
/// governed entries never share one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreNames {
    #[serde(default = "default_api_store")]
    pub api: String,
    #[serde(default = "default_images_store")]
    pub images: String,
    #[serde(default = "default_font_stylesheets_store")]
    pub font_stylesheets: String,
    #[serde(default = "default_font_files_store")]
    pub font_files: String,
    #[serde(default = "default_pages_store")]
    pub pages: String,
    #[serde(default = "default_offline_store")]
    pub offline: String,
}

fn default_api_store() -> String {
    "api-cache".into()
}

fn default_images_store() -> String {
    "images".into()
}

fn default_font_stylesheets_store() -> String {
    "google-fonts-stylesheets".into()
}

fn default_font_files_store() -> String {
    "google-fonts-webfonts".into()
}

fn default_pages_store() -> String {
    "pages".into()
}

fn default_offline_store() -> String {
    "offline-html".into()
}

impl Default for StoreNames {
    fn default() -> Self {
        Self {
            api: default_api_store(),
            images: default_images_store(),
            font_stylesheets: default_font_stylesheets_store(),
            font_files: default_font_files_store(),
            pages: default_pages_store(),
            offline: default_offline_store(),
        }
    }
}

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite store database.
    ///
    /// Set via ORC_DB_PATH.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum response body bytes accepted from the network.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Network timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Origin that relative manifest and offline URLs resolve against.
    ///
    /// Set via ORC_ORIGIN.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Main store name prefix; the version is appended.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Deployed version tag. Changing it triggers install + activate.
    ///
    /// Set via ORC_CACHE_VERSION.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Path segment that marks API requests.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// URL of the offline fallback document.
    #[serde(default = "default_offline_url")]
    pub offline_url: String,

    /// Icon shown with push notifications.
    #[serde(default = "default_notification_icon")]
    pub notification_icon: String,

    /// Origin serving web-font stylesheets.
    #[serde(default = "default_font_stylesheet_origin")]
    pub font_stylesheet_origin: String,

    /// Origin serving web-font binaries.
    #[serde(default = "default_font_file_origin")]
    pub font_file_origin: String,

    /// Activate a freshly installed version without waiting.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,

    #[serde(default)]
    pub stores: StoreNames,

    /// Inline precache manifest.
    #[serde(default = "default_precache")]
    pub precache: Vec<PrecacheEntry>,

    /// JSON manifest file (`[{"url": ..., "revision": ...}]`) merged after
    /// the inline entries.
    #[serde(default)]
    pub precache_manifest_path: Option<PathBuf>,

    /// Extra routes evaluated before the built-in table.
    #[serde(default)]
    pub runtime_rules: Vec<RuntimeRule>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./orc-cache.sqlite")
}

fn default_user_agent() -> String {
    "orc/0.1".into()
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_origin() -> String {
    "http://localhost:5173".into()
}

fn default_cache_prefix() -> String {
    "avtoservis-cache".into()
}

fn default_cache_version() -> String {
    "v1".into()
}

fn default_api_prefix() -> String {
    "/api".into()
}

fn default_offline_url() -> String {
    "/offline.html".into()
}

fn default_notification_icon() -> String {
    "/pwa-192x192.png".into()
}

fn default_font_stylesheet_origin() -> String {
    "https://fonts.googleapis.com".into()
}

fn default_font_file_origin() -> String {
    "https://fonts.gstatic.com".into()
}

fn default_true() -> bool {
    true
}

fn default_precache() -> Vec<PrecacheEntry> {
    [
        "/",
        "/index.html",
        "/favicon.svg",
        "/apple-touch-icon.png",
        "/mask-icon.svg",
        "/pwa-192x192.png",
        "/pwa-512x512.png",
        "/manifest.json",
        "/src/assets/logo.svg",
    ]
    .into_iter()
    .map(PrecacheEntry::new)
    .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            origin: default_origin(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            api_prefix: default_api_prefix(),
            offline_url: default_offline_url(),
            notification_icon: default_notification_icon(),
            font_stylesheet_origin: default_font_stylesheet_origin(),
            font_file_origin: default_font_file_origin(),
            skip_waiting: true,
            stores: StoreNames::default(),
            precache: default_precache(),
            precache_manifest_path: None,
            runtime_rules: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Name of the version-tagged main store.
    pub fn main_store(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.cache_version)
    }

    /// Resolve a possibly relative URL against `origin`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin or the joined URL does not parse.
    pub fn resolve(&self, url: &str) -> Result<Url, ConfigError> {
        let base = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        base.join(url)
            .map_err(|e| ConfigError::Invalid { field: "url".into(), reason: format!("{url}: {e}") })
    }

    /// Absolute URL of the offline fallback document.
    pub fn offline_document_url(&self) -> Result<Url, ConfigError> {
        self.resolve(&self.offline_url)
    }

    /// Inline manifest followed by the manifest file, first occurrence of a URL wins.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::LoadFailed` if the manifest file cannot be read or parsed.
    pub fn precache_manifest(&self) -> Result<Vec<PrecacheEntry>, ConfigError> {
        let mut entries = self.precache.clone();
        if let Some(path) = &self.precache_manifest_path {
            entries.extend(read_manifest(path)?);
        }

        let mut seen = std::collections::HashSet::new();
        entries.retain(|e| seen.insert(e.url.clone()));
        Ok(entries)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("ORC_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("ORC_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

fn read_manifest(path: &Path) -> Result<Vec<PrecacheEntry>, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::LoadFailed(format!("precache manifest {}: {e}", path.display())))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::LoadFailed(format!("precache manifest {}: {e}", path.display())))
}
