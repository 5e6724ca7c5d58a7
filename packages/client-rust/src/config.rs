//! Configuration types for the ORM context and the HTTP store.

use std::time::Duration;

/// Tunables shared by every table of an [`Orm`](crate::Orm) context.
#[derive(Debug, Clone)]
pub struct OrmConfig {
    /// Page size used by `select` when the caller gives none.
    pub default_page_size: u32,
    /// Upper bound for any requested page size.
    pub max_page_size: u32,
    /// Number of concurrent fetch workers used when populating relations.
    pub populate_concurrency: usize,
    /// Page size used to resolve targets of a many-row update.
    pub update_many_page_size: u32,
    /// Maximum number of rows archived or restored by one filter-based call.
    pub bulk_target_limit: u32,
}

impl Default for OrmConfig {
    fn default() -> Self {
        Self {
            default_page_size: 25,
            max_page_size: 100,
            populate_concurrency: 4,
            update_many_page_size: 100,
            bulk_target_limit: 100,
        }
    }
}

impl OrmConfig {
    /// Clamps a requested page size to `[1, max_page_size]`.
    #[must_use]
    pub fn clamp_page_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1))
    }
}

/// Connection settings for [`HttpStore`](crate::store::HttpStore).
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    /// API root, without a trailing slash.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub api_token: String,
    /// Value of the API version header.
    pub api_version: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for HttpStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.notion.com".to_string(),
            api_token: String::new(),
            api_version: "2025-09-03".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl HttpStoreConfig {
    /// Reads `DOCORM_API_TOKEN`, `DOCORM_BASE_URL` and `DOCORM_API_VERSION`,
    /// keeping defaults for unset variables.
    ///
    /// # Errors
    ///
    /// Returns an error when `DOCORM_API_TOKEN` is unset or empty.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::default().with_env_overrides().require_token()
    }

    /// Replaces fields whose `DOCORM_*` variable is set and non-empty.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(token) = var("DOCORM_API_TOKEN") {
            self.api_token = token;
        }
        if let Some(base_url) = var("DOCORM_BASE_URL") {
            self.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(version) = var("DOCORM_API_VERSION") {
            self.api_version = version;
        }
        self
    }

    /// Fails when no API token is configured.
    ///
    /// # Errors
    ///
    /// Returns an error when `api_token` is empty.
    pub fn require_token(self) -> anyhow::Result<Self> {
        if self.api_token.is_empty() {
            anyhow::bail!("DOCORM_API_TOKEN is not set");
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn default_values() {
        let config = OrmConfig::default();
        assert_eq!(config.default_page_size, 25);
        assert_eq!(config.max_page_size, 100);
        assert_eq!(config.populate_concurrency, 4);
        assert_eq!(config.bulk_target_limit, 100);
    }

    #[test]
    fn page_size_is_clamped() {
        let config = OrmConfig::default();
        assert_eq!(config.clamp_page_size(Some(500)), 100);
        assert_eq!(config.clamp_page_size(Some(0)), 1);
        assert_eq!(config.clamp_page_size(Some(40)), 40);
        assert_eq!(config.clamp_page_size(None), 25);
    }

    #[test]
    fn http_defaults() {
        let config = HttpStoreConfig::default();
        assert!(config.base_url.starts_with("https://"));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    proptest! {
        #[test]
        fn clamped_page_size_stays_in_bounds(requested in any::<Option<u32>>(), max in 0u32..500) {
            let config = OrmConfig { max_page_size: max, ..OrmConfig::default() };
            let size = config.clamp_page_size(requested);
            prop_assert!(size >= 1);
            prop_assert!(size <= max.max(1));
        }
    }

    #[test]
    fn set_variables_override_defaults() {
        let vars = [
            ("DOCORM_API_TOKEN", "secret"),
            ("DOCORM_BASE_URL", "http://localhost:8080/"),
            ("DOCORM_API_VERSION", ""),
        ];
        let lookup = |key: &str| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
        };
        let config = HttpStoreConfig::default()
            .with_overrides(lookup)
            .require_token()
            .unwrap();
        assert_eq!(config.api_token, "secret");
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.api_version, HttpStoreConfig::default().api_version);
    }

    #[test]
    fn missing_token_is_rejected() {
        let config = HttpStoreConfig::default().with_overrides(|_| None);
        assert!(config.require_token().is_err());
    }
}
