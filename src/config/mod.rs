//! Configuration for Talos.
//!
//! A single immutable `Config` loaded once at startup (spec.md §9 Design
//! Notes) — no hot-reload, no global singleton. Loading and validation
//! are kept as separate steps, the way the teacher's config module
//! separates `Config::from_file` from `validation`.

pub mod validation;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    /// Issuer / audience base URL, no trailing slash (spec.md §6).
    pub base_url: String,

    #[serde(default)]
    pub jwt: JwtSettings,

    #[serde(default = "default_auth_code_ttl_minutes")]
    pub auth_code_ttl_minutes: i64,
    #[serde(default = "default_refresh_token_ttl_days")]
    pub refresh_token_ttl_days: i64,
    #[serde(default = "default_pending_auth_ttl_minutes")]
    pub pending_auth_ttl_minutes: i64,

    /// Exact, case-insensitive host allowlist for `me`. Empty = allow any
    /// (spec.md §6).
    #[serde(default)]
    pub allowed_profile_hosts: Vec<String>,

    /// Required for `/token/introspect` to ever return `active:true`;
    /// missing means every introspection request is 401 (spec.md §4.9.10).
    pub introspection_secret: Option<String>,

    #[serde(default)]
    pub providers: HashMap<String, ProviderCredentials>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtSettings {
    pub secret_key: String,
    #[serde(default = "default_access_token_ttl_minutes")]
    pub access_token_ttl_minutes: i64,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self { secret_key: String::new(), access_token_ttl_minutes: default_access_token_ttl_minutes() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: default_log_format() }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_access_token_ttl_minutes() -> i64 {
    15
}
fn default_auth_code_ttl_minutes() -> i64 {
    10
}
fn default_refresh_token_ttl_days() -> i64 {
    30
}
fn default_pending_auth_ttl_minutes() -> i64 {
    30
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| Error::Config(format!("failed to read config file: {e}")))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("yaml");

        let config: Config = match extension {
            "yaml" | "yml" => {
                serde_yaml::from_str(&content).map_err(|e| Error::Config(format!("failed to parse YAML: {e}")))?
            }
            "toml" => toml::from_str(&content).map_err(|e| Error::Config(format!("failed to parse TOML: {e}")))?,
            other => return Err(Error::Config(format!("unsupported config format: {other}"))),
        };

        validation::validate(&config)?;
        Ok(config)
    }

    /// Search standard locations, falling back to none found.
    pub fn discover_path() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from("talos.yaml"), PathBuf::from("talos.toml")];
        if let Some(home) = dirs::home_dir() {
            search_paths.push(home.join(".talos/config.yaml"));
        }
        search_paths.push(PathBuf::from("/etc/talos/config.yaml"));
        search_paths.into_iter().find(|p| p.exists())
    }

    pub fn issuer(&self) -> String {
        self.base_url.trim_end_matches('/').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(ext: &str, content: &str) -> tempfile::TempPath {
        let mut file = tempfile::Builder::new().suffix(&format!(".{ext}")).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.into_temp_path()
    }

    #[test]
    fn round_trips_yaml() {
        let path = write_temp(
            "yaml",
            r#"
baseUrl: https://auth.example.com
jwt:
  secretKey: a-secret-that-is-at-least-32-bytes-long
introspectionSecret: bearer-secret
"#,
        );
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.issuer(), "https://auth.example.com");
        assert_eq!(config.port, 8080);
        assert_eq!(config.jwt.access_token_ttl_minutes, 15);
    }

    #[test]
    fn round_trips_toml() {
        let path = write_temp(
            "toml",
            r#"
baseUrl = "https://auth.example.com"
introspectionSecret = "bearer-secret"

[jwt]
secretKey = "a-secret-that-is-at-least-32-bytes-long"
"#,
        );
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.base_url, "https://auth.example.com");
    }

    #[test]
    fn rejects_unknown_extension() {
        let path = write_temp("conf", "baseUrl: https://auth.example.com");
        assert!(Config::from_file(&path).is_err());
    }
}
