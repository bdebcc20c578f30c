//! Server configuration: defaults, then an optional TOML file, then
//! environment variables.
//!
//! Everything has a default so the server starts with zero configuration
//! for local development. Only uploads need `OPENAI_API_KEY`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use dompet_core::DEFAULT_CURRENCY;
use dompet_ingest::{IngestSettings, DEFAULT_BASE_URL, DEFAULT_MODEL};
use dompet_storage::CorruptionPolicy;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Clone)]
pub struct ServerConfig {
    /// Env: `DOMPET_HTTP_ADDR`
    /// Default: `127.0.0.1:8000`
    pub http_addr: SocketAddr,

    /// Env: `DOMPET_DB_PATH`
    /// Default: `data/db.json`
    pub db_path: PathBuf,

    /// What to do when the store file exists but does not parse.
    /// Env: `DOMPET_ON_CORRUPT` (`fail` | `degrade`)
    /// Default: `fail`
    pub on_corrupt: CorruptionPolicy,

    /// Env: `DOMPET_MODEL`
    pub model: String,

    /// Currency stamped on new transactions.
    /// Env: `DOMPET_CURRENCY`
    /// Default: `IDR`
    pub currency: String,

    /// Env: `OPENAI_API_KEY`
    pub openai_api_key: Option<String>,

    /// Env: `OPENAI_BASE_URL`
    pub openai_base_url: String,

    /// Comma-separated in the environment.
    /// Env: `DOMPET_ALLOWED_ORIGINS`
    pub allowed_origins: Vec<String>,

    /// Maximum request body for `/upload` (50 MiB).
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([127, 0, 0, 1], 8000).into(),
            db_path: PathBuf::from("data/db.json"),
            on_corrupt: CorruptionPolicy::FailClosed,
            model: DEFAULT_MODEL.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            openai_api_key: None,
            openai_base_url: DEFAULT_BASE_URL.to_string(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:3001".to_string(),
            ],
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

// The API key must never reach the logs.
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("db_path", &self.db_path)
            .field("on_corrupt", &self.on_corrupt)
            .field("model", &self.model)
            .field("currency", &self.currency)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<redacted>"))
            .field("openai_base_url", &self.openai_base_url)
            .field("allowed_origins", &self.allowed_origins)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

/// Shape of the optional TOML file. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    http_addr: Option<SocketAddr>,
    db_path: Option<PathBuf>,
    on_corrupt: Option<CorruptionPolicy>,
    model: Option<String>,
    currency: Option<String>,
    openai_api_key: Option<String>,
    openai_base_url: Option<String>,
    allowed_origins: Option<Vec<String>>,
    max_upload_bytes: Option<usize>,
}

impl ServerConfig {
    /// Defaults, then the file named by `DOMPET_CONFIG` (if set), then the
    /// process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("DOMPET_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        let file: FileConfig = toml::from_str(raw)?;
        let mut config = Self::default();
        if let Some(v) = file.http_addr {
            config.http_addr = v;
        }
        if let Some(v) = file.db_path {
            config.db_path = v;
        }
        if let Some(v) = file.on_corrupt {
            config.on_corrupt = v;
        }
        if let Some(v) = file.model {
            config.model = v;
        }
        if let Some(v) = file.currency {
            config.currency = v;
        }
        config.openai_api_key = file.openai_api_key.filter(|k| !k.trim().is_empty());
        if let Some(v) = file.openai_base_url {
            config.openai_base_url = v;
        }
        if let Some(v) = file.allowed_origins {
            config.allowed_origins = v;
        }
        if let Some(v) = file.max_upload_bytes {
            config.max_upload_bytes = v;
        }
        Ok(config)
    }

    /// Overrides from `lookup` (normally `std::env::var`). Unparseable values
    /// are logged and ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("DOMPET_HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => self.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid DOMPET_HTTP_ADDR, using default"),
            }
        }

        if let Some(path) = lookup("DOMPET_DB_PATH") {
            if !path.trim().is_empty() {
                self.db_path = PathBuf::from(path);
            }
        }

        if let Some(policy) = lookup("DOMPET_ON_CORRUPT") {
            match policy.parse::<CorruptionPolicy>() {
                Ok(parsed) => self.on_corrupt = parsed,
                Err(e) => tracing::warn!(error = %e, "Invalid DOMPET_ON_CORRUPT, using default"),
            }
        }

        if let Some(model) = lookup("DOMPET_MODEL") {
            if !model.trim().is_empty() {
                self.model = model.trim().to_string();
            }
        }

        if let Some(currency) = lookup("DOMPET_CURRENCY") {
            let currency = currency.trim();
            if currency.len() == 3 && currency.chars().all(|c| c.is_ascii_alphabetic()) {
                self.currency = currency.to_ascii_uppercase();
            } else {
                tracing::warn!(value = %currency, "Invalid DOMPET_CURRENCY, using default");
            }
        }

        if let Some(key) = lookup("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                self.openai_api_key = Some(key.trim().to_string());
            }
        }

        if let Some(url) = lookup("OPENAI_BASE_URL") {
            if !url.trim().is_empty() {
                self.openai_base_url = url.trim().to_string();
            }
        }

        if let Some(origins) = lookup("DOMPET_ALLOWED_ORIGINS") {
            let parsed: Vec<String> = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
            if !parsed.is_empty() {
                self.allowed_origins = parsed;
            }
        }

        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.
    }

    pub fn ingest_settings(&self) -> IngestSettings {
        IngestSettings {
            currency: self.currency.clone(),
            model: self.model.clone(),
            ..IngestSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 8000).into());
        assert_eq!(config.db_path, PathBuf::from("data/db.json"));
        assert_eq!(config.on_corrupt, CorruptionPolicy::FailClosed);
        assert_eq!(config.currency, "IDR");
        assert_eq!(config.allowed_origins.len(), 2);
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = ServerConfig::from_toml_str(
            r#"
            http_addr = "0.0.0.0:9000"
            db_path = "/var/lib/dompet/db.json"
            on_corrupt = "degrade"
            allowed_origins = ["https://dompet.example"]
            "#,
        )
        .unwrap();
        assert_eq!(config.http_addr.port(), 9000);
        assert_eq!(config.db_path, PathBuf::from("/var/lib/dompet/db.json"));
        assert_eq!(config.on_corrupt, CorruptionPolicy::DegradeToEmpty);
        assert_eq!(config.allowed_origins, vec!["https://dompet.example"]);
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_toml_rejects_unknown_keys() {
        assert!(ServerConfig::from_toml_str("databse = \"typo\"").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ServerConfig::default();
        config.apply_env(env(&[
            ("DOMPET_HTTP_ADDR", "0.0.0.0:8080"),
            ("DOMPET_ON_CORRUPT", "degrade"),
            ("DOMPET_CURRENCY", "usd"),
            ("OPENAI_API_KEY", " sk-abc "),
            ("DOMPET_ALLOWED_ORIGINS", "http://a.test, ,http://b.test"),
        ]));
        assert_eq!(config.http_addr.port(), 8080);
        assert_eq!(config.on_corrupt, CorruptionPolicy::DegradeToEmpty);
        assert_eq!(config.currency, "USD");
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-abc"));
        assert_eq!(config.allowed_origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn test_invalid_env_values_keep_defaults() {
        let mut config = ServerConfig::default();
        config.apply_env(env(&[
            ("DOMPET_HTTP_ADDR", "not-an-addr"),
            ("DOMPET_ON_CORRUPT", "shrug"),
            ("DOMPET_CURRENCY", "rupiah"),
            ("OPENAI_API_KEY", "   "),
        ]));
        let default = ServerConfig::default();
        assert_eq!(config.http_addr, default.http_addr);
        assert_eq!(config.on_corrupt, default.on_corrupt);
        assert_eq!(config.currency, "IDR");
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ServerConfig {
            openai_api_key: Some("sk-secret".to_string()),
            ..ServerConfig::default()
        };
        let printed = format!("{config:?}");
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains("<redacted>"));
    }
}
