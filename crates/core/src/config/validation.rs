//! Configuration validation rules.
//!
//! Run after loading so bad values fail at startup rather than on the
//! first intercepted request.

use crate::config::AppConfig;
use thiserror::Error;
use url::Url;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 100MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent`, `cache_prefix`, `cache_version` or a store name is empty
    /// - `api_prefix` or `offline_url` is not an absolute path
    /// - `origin` is not an http(s) URL
    /// - a runtime rule has an empty store name or a pattern that does not compile
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 100 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 100MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        for (field, value) in [
            ("user_agent", &self.user_agent),
            ("cache_prefix", &self.cache_prefix),
            ("cache_version", &self.cache_version),
            ("stores.api", &self.stores.api),
            ("stores.images", &self.stores.images),
            ("stores.font_stylesheets", &self.stores.font_stylesheets),
            ("stores.font_files", &self.stores.font_files),
            ("stores.pages", &self.stores.pages),
            ("stores.offline", &self.stores.offline),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
        }

        if !self.api_prefix.starts_with('/') {
            return Err(invalid("api_prefix", "must start with '/'"));
        }
        if self.api_prefix.trim_end_matches('/').is_empty() {
            return Err(invalid("api_prefix", "must name a path below the root"));
        }

        if !self.offline_url.starts_with('/') && Url::parse(&self.offline_url).is_err() {
            return Err(invalid("offline_url", "must be an absolute path or URL"));
        }

        match Url::parse(&self.origin) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => return Err(invalid("origin", format!("unsupported scheme: {}", url.scheme()))),
            Err(e) => return Err(invalid("origin", e.to_string())),
        }

        for (i, rule) in self.runtime_rules.iter().enumerate() {
            if rule.cache_name.trim().is_empty() {
                return Err(invalid(&format!("runtime_rules[{i}].cache_name"), "must not be empty"));
            }
            if let Err(e) = regex::Regex::new(&rule.url_pattern) {
                return Err(invalid(&format!("runtime_rules[{i}].url_pattern"), e.to_string()));
            }
        }

        if self.stores.offline == self.main_store() {
            tracing::warn!(
                store = %self.stores.offline,
                "offline document shares the main store; a version bump will drop it until reinstall"
            );
        }

        Ok(())
    }
}
