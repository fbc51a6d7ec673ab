//! Configuration: JSON file at `QUERYRELAY_CONFIG` plus environment
//! overrides, with defaults matching production deployments.

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Default per-query byte cap (10 GB).
pub const DEFAULT_MAX_QUERY_BYTES: i64 = 10_000_000_000;

/// Complete gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub log_level: String,
    pub cors_origins: Vec<String>,

    // Auth
    pub api_key_header: String,
    pub api_keys: Vec<String>,
    pub enable_auth: bool,

    // Rate limiting
    pub rate_limit_per_minute: usize,

    // Warehouse backend
    pub warehouse_enabled: bool,
    pub warehouse_base_url: String,
    pub warehouse_project_id: String,
    pub warehouse_token: String,

    // Security
    pub max_query_bytes_processed: i64,
    pub enable_data_masking: bool,
    pub enable_pii_detection: bool,
    pub enable_audit_logging: bool,
    pub sensitive_columns: Vec<String>,
    pub pii_keywords: Vec<String>,

    // Search backend
    pub search_enabled: bool,
    pub search_base_url: String,
    pub search_username: String,
    pub search_password: String,
    pub search_allowed_patterns: Vec<String>,

    // LLM
    pub anthropic_api_key: String,
    pub anthropic_base_url: String,
    pub llm_model: String,
    pub agent_timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            environment: "development".to_string(),
            log_level: "info".to_string(),
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:8080".to_string(),
            ],
            api_key_header: "X-API-Key".to_string(),
            api_keys: Vec::new(),
            enable_auth: true,
            rate_limit_per_minute: 60,
            warehouse_enabled: false,
            warehouse_base_url: String::new(),
            warehouse_project_id: String::new(),
            warehouse_token: String::new(),
            max_query_bytes_processed: DEFAULT_MAX_QUERY_BYTES,
            enable_data_masking: true,
            enable_pii_detection: true,
            enable_audit_logging: true,
            sensitive_columns: default_sensitive_columns(),
            pii_keywords: default_pii_keywords(),
            search_enabled: false,
            search_base_url: String::new(),
            search_username: String::new(),
            search_password: String::new(),
            search_allowed_patterns: Vec::new(),
            anthropic_api_key: String::new(),
            anthropic_base_url: String::new(),
            llm_model: String::new(),
            agent_timeout: 300,
        }
    }
}

fn default_sensitive_columns() -> Vec<String> {
    [
        "email",
        "phone",
        "ssn",
        "social_security_number",
        "credit_card",
        "password",
        "secret",
        "token",
        "api_key",
        "access_key",
        "private_key",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_pii_keywords() -> Vec<String> {
    [
        "password",
        "ssn",
        "social security",
        "credit card",
        "bank account",
        "pin",
        "secret",
        "private key",
        "access token",
        "api key",
        "personal data",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Config {
    /// Loads defaults, then the JSON file named by `QUERYRELAY_CONFIG` (if
    /// set), then environment overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = Config::default();

        if let Ok(path) = env::var("QUERYRELAY_CONFIG") {
            if !path.is_empty() {
                cfg = Self::from_file(&path)?;
            }
        }

        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Parses a JSON config file; missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())
            .map_err(|err| Error::Config(format!("read config: {err}")))?;
        serde_json::from_str(&data).map_err(Error::Serialization)
    }

    fn apply_env_overrides(&mut self) {
        override_string(&mut self.host, "QUERYRELAY_HOST");
        override_parse(&mut self.port, "QUERYRELAY_PORT");
        override_string(&mut self.environment, "QUERYRELAY_ENV");
        override_string(&mut self.log_level, "QUERYRELAY_LOG_LEVEL");
        if let Ok(keys) = env::var("QUERYRELAY_API_KEYS") {
            if !keys.is_empty() {
                self.api_keys = keys.split(',').map(|k| k.trim().to_string()).collect();
            }
        }
        override_bool(&mut self.enable_auth, "ENABLE_AUTH");
        override_parse(&mut self.rate_limit_per_minute, "RATE_LIMIT_PER_MINUTE");

        override_bool(&mut self.warehouse_enabled, "WAREHOUSE_ENABLED");
        override_string(&mut self.warehouse_base_url, "WAREHOUSE_BASE_URL");
        override_string(&mut self.warehouse_project_id, "WAREHOUSE_PROJECT_ID");
        override_string(&mut self.warehouse_token, "WAREHOUSE_TOKEN");
        override_parse(&mut self.max_query_bytes_processed, "MAX_QUERY_BYTES_PROCESSED");

        override_bool(&mut self.search_enabled, "SEARCH_ENABLED");
        override_string(&mut self.search_base_url, "SEARCH_BASE_URL");
        override_string(&mut self.search_username, "SEARCH_USERNAME");
        override_string(&mut self.search_password, "SEARCH_PASSWORD");

        override_string(&mut self.anthropic_api_key, "ANTHROPIC_API_KEY");
        override_string(&mut self.anthropic_base_url, "ANTHROPIC_BASE_URL");
        override_string(&mut self.llm_model, "QUERYRELAY_LLM_MODEL");
        override_parse(&mut self.agent_timeout, "QUERYRELAY_AGENT_TIMEOUT");
    }
}

fn override_string(target: &mut String, key: &str) {
    if let Ok(value) = env::var(key) {
        if !value.is_empty() {
            *target = value;
        }
    }
}

fn override_bool(target: &mut bool, key: &str) {
    if let Ok(value) = env::var(key) {
        if !value.is_empty() {
            *target = value == "true" || value == "1";
        }
    }
}

fn override_parse<T: std::str::FromStr>(target: &mut T, key: &str) {
    if let Ok(value) = env::var(key) {
        if let Ok(parsed) = value.parse::<T>() {
            *target = parsed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.rate_limit_per_minute, 60);
        assert_eq!(cfg.max_query_bytes_processed, DEFAULT_MAX_QUERY_BYTES);
        assert_eq!(cfg.api_key_header, "X-API-Key");
        assert!(cfg.enable_auth);
        assert!(cfg.sensitive_columns.contains(&"password".to_string()));
        assert!(cfg.pii_keywords.contains(&"social security".to_string()));
    }

    #[test]
    fn file_overrides_partial_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"port": 9000, "api_keys": ["k1", "k2"], "warehouse_enabled": true}}"#
        )
        .unwrap();

        let cfg = Config::from_file(file.path()).unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.api_keys, vec!["k1", "k2"]);
        assert!(cfg.warehouse_enabled);
        // Untouched keys keep defaults.
        assert_eq!(cfg.rate_limit_per_minute, 60);
        assert_eq!(cfg.host, "0.0.0.0");
    }

    #[test]
    fn invalid_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(Config::from_file(file.path()).is_err());
    }
}
