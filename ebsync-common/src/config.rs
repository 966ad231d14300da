//! Run configuration
//!
//! A `SyncConfig` is built once at process start and passed by reference to
//! every component. Priority per setting:
//! 1. Command-line argument / environment variable (`ConfigOverrides`)
//! 2. TOML config file (optional)
//! 3. Compiled default

use crate::{Error, Result, RetryPolicy};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the Elba API key (sent as `X-Kontur-ApiKey`)
pub const ELBA_TOKEN_ENV: &str = "ELBA_TOKEN";
/// Environment variable holding the Bitrix24 inbound webhook base URL
pub const BITRIX_WEBHOOK_ENV: &str = "BITRIX_WEBHOOK_URL";
/// Public Elba API root
pub const DEFAULT_ELBA_API_BASE: &str = "https://elba-api.kontur.ru/v1";

/// Values supplied on the command line or through the environment.
///
/// Every field overrides its TOML counterpart when set.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub elba_token: Option<String>,
    pub bitrix_webhook_url: Option<String>,
    pub elba_base_url: Option<String>,
    pub page_size: Option<usize>,
    pub log_level: Option<String>,
}

/// Complete configuration for one sync run
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    pub retry: RetryPolicy,
    pub logging: LoggingConfig,
}

/// Elba (source) connection settings
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub api_key: String,
    pub base_url: String,
    pub page_size: usize,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_ELBA_API_BASE.to_string(),
            page_size: 100,
            connect_timeout_secs: 10,
            request_timeout_secs: 60,
        }
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl SourceConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Bitrix24 (destination) settings, including the custom field vocabulary
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    /// Inbound webhook base URL, always ending with `/`
    pub webhook_url: String,
    /// Identity keys per `crm.<kind>.list` request
    pub lookup_chunk_size: usize,
    pub identity_field: String,
    pub identity_label: String,
    pub tax_id_field: String,
    pub tax_id_label: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            lookup_chunk_size: 50,
            identity_field: "UF_CRM_ELBA_ID".to_string(),
            identity_label: "ID Эльбы".to_string(),
            tax_id_field: "UF_CRM_INN".to_string(),
            tax_id_label: "ИНН".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 60,
        }
    }
}

// The webhook URL embeds the access code
impl fmt::Debug for DestinationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationConfig")
            .field("webhook_url", &"<redacted>")
            .field("lookup_chunk_size", &self.lookup_chunk_size)
            .field("identity_field", &self.identity_field)
            .field("tax_id_field", &self.tax_id_field)
            .finish()
    }
}

impl DestinationConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl SyncConfig {
    /// Build the run configuration: TOML file (if any), then overrides, then validation.
    ///
    /// Fails with `Error::Config` when a required secret is missing. Performs
    /// no network activity.
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = match &overrides.config_file {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file; missing sections fall back to defaults
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Read config file {} failed: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            Error::Config(format!("Parse config file {} failed: {}", path.display(), e))
        })
    }

    fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(token) = &overrides.elba_token {
            self.source.api_key = token.clone();
        }
        if let Some(url) = &overrides.bitrix_webhook_url {
            self.destination.webhook_url = url.clone();
        }
        if let Some(url) = &overrides.elba_base_url {
            self.source.base_url = url.clone();
        }
        if let Some(size) = overrides.page_size {
            self.source.page_size = size;
        }
        if let Some(level) = &overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Check required secrets and limits, and normalize URLs
    pub fn validate(&mut self) -> Result<()> {
        self.source.api_key = self.source.api_key.trim().to_string();
        if self.source.api_key.is_empty() {
            return Err(Error::Config(format!(
                "{} (X-Kontur-ApiKey) is not set",
                ELBA_TOKEN_ENV
            )));
        }

        let webhook = self.destination.webhook_url.trim();
        if webhook.is_empty() {
            return Err(Error::Config(format!("{} is not set", BITRIX_WEBHOOK_ENV)));
        }
        if !is_http_url(webhook) {
            return Err(Error::Config(format!(
                "{} must be an http(s) URL, got '{}'",
                BITRIX_WEBHOOK_ENV, webhook
            )));
        }
        self.destination.webhook_url = if webhook.ends_with('/') {
            webhook.to_string()
        } else {
            format!("{}/", webhook)
        };

        let base = self.source.base_url.trim().trim_end_matches('/');
        if !is_http_url(base) {
            return Err(Error::Config(format!(
                "Elba base URL must be an http(s) URL, got '{}'",
                base
            )));
        }
        self.source.base_url = base.to_string();

        if self.source.page_size == 0 {
            return Err(Error::Config("source.page_size must be greater than 0".to_string()));
        }
        if self.destination.lookup_chunk_size == 0 {
            return Err(Error::Config(
                "destination.lookup_chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.destination.identity_field.trim().is_empty() {
            return Err(Error::Config("destination.identity_field is empty".to_string()));
        }

        Ok(())
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("https://") || value.starts_with("http://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn overrides_with_secrets() -> ConfigOverrides {
        ConfigOverrides {
            elba_token: Some("token-123".to_string()),
            bitrix_webhook_url: Some("https://example.bitrix24.ru/rest/1/abc".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_applied() {
        let config = SyncConfig::load(&overrides_with_secrets()).unwrap();
        assert_eq!(config.source.base_url, DEFAULT_ELBA_API_BASE);
        assert_eq!(config.source.page_size, 100);
        assert_eq!(config.destination.lookup_chunk_size, 50);
        assert_eq!(config.destination.identity_field, "UF_CRM_ELBA_ID");
        assert_eq!(config.destination.tax_id_field, "UF_CRM_INN");
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_webhook_gets_trailing_slash() {
        let config = SyncConfig::load(&overrides_with_secrets()).unwrap();
        assert_eq!(
            config.destination.webhook_url,
            "https://example.bitrix24.ru/rest/1/abc/"
        );
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let overrides = ConfigOverrides {
            elba_token: None,
            ..overrides_with_secrets()
        };
        let err = SyncConfig::load(&overrides).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains(ELBA_TOKEN_ENV)));
    }

    #[test]
    fn test_blank_webhook_is_config_error() {
        let overrides = ConfigOverrides {
            bitrix_webhook_url: Some("   ".to_string()),
            ..overrides_with_secrets()
        };
        let err = SyncConfig::load(&overrides).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains(BITRIX_WEBHOOK_ENV)));
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let overrides = ConfigOverrides {
            page_size: Some(0),
            ..overrides_with_secrets()
        };
        assert!(matches!(SyncConfig::load(&overrides), Err(Error::Config(_))));
    }

    #[test]
    fn test_toml_file_then_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[source]
api_key = "from-toml"
base_url = "http://localhost:9000/v1/"
page_size = 25

[destination]
webhook_url = "https://toml.bitrix24.ru/rest/7/xyz/"
lookup_chunk_size = 10

[retry]
max_attempts = 5
"#
        )
        .unwrap();

        let overrides = ConfigOverrides {
            config_file: Some(file.path().to_path_buf()),
            page_size: Some(40),
            ..Default::default()
        };
        let config = SyncConfig::load(&overrides).unwrap();

        assert_eq!(config.source.api_key, "from-toml");
        assert_eq!(config.source.base_url, "http://localhost:9000/v1");
        assert_eq!(config.source.page_size, 40);
        assert_eq!(config.destination.webhook_url, "https://toml.bitrix24.ru/rest/7/xyz/");
        assert_eq!(config.destination.lookup_chunk_size, 10);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 4_000);
    }

    #[test]
    fn test_unreadable_toml_is_config_error() {
        let overrides = ConfigOverrides {
            config_file: Some(PathBuf::from("/nonexistent/ebsync.toml")),
            ..overrides_with_secrets()
        };
        assert!(matches!(SyncConfig::load(&overrides), Err(Error::Config(_))));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = SyncConfig::load(&overrides_with_secrets()).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("token-123"));
        assert!(!rendered.contains("rest/1/abc"));
    }
}
