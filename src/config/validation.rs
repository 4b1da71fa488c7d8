//! Startup configuration validation (spec.md §6).

use super::Config;
use crate::error::{Error, Result};
use url::Url;

pub fn validate(config: &Config) -> Result<()> {
    if config.port == 0 {
        return Err(Error::Config("port must be non-zero".to_string()));
    }

    let base_url = Url::parse(&config.base_url)
        .map_err(|e| Error::Config(format!("baseUrl is not a valid URL: {e}")))?;
    if !matches!(base_url.scheme(), "http" | "https") {
        return Err(Error::Config("baseUrl must be http or https".to_string()));
    }

    if config.jwt.secret_key.len() < 32 {
        return Err(Error::Config("jwt.secretKey must be at least 32 bytes".to_string()));
    }

    if config.jwt.access_token_ttl_minutes <= 0 {
        return Err(Error::Config("jwt.accessTokenTtlMinutes must be positive".to_string()));
    }
    if config.auth_code_ttl_minutes <= 0 {
        return Err(Error::Config("authCodeTtlMinutes must be positive".to_string()));
    }
    if config.refresh_token_ttl_days <= 0 {
        return Err(Error::Config("refreshTokenTtlDays must be positive".to_string()));
    }
    if config.pending_auth_ttl_minutes <= 0 {
        return Err(Error::Config("pendingAuthTtlMinutes must be positive".to_string()));
    }

    if config.introspection_secret.is_none() {
        tracing::warn!("no introspectionSecret configured; /token/introspect will reject all requests");
    }

    if config.providers.is_empty() {
        tracing::warn!("no identity providers configured; authentication will always fail discovery");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtSettings;
    use std::collections::HashMap;

    fn valid_config() -> Config {
        Config {
            host: "0.0.0.0".to_string(),
            port: 8080,
            base_url: "https://auth.example.com".to_string(),
            jwt: JwtSettings { secret_key: "a".repeat(32), access_token_ttl_minutes: 15 },
            auth_code_ttl_minutes: 10,
            refresh_token_ttl_days: 30,
            pending_auth_ttl_minutes: 30,
            allowed_profile_hosts: vec![],
            introspection_secret: Some("secret".to_string()),
            providers: HashMap::new(),
            logging: crate::config::LoggingConfig::default(),
        }
    }

    #[test]
    fn accepts_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn rejects_short_secret() {
        let mut config = valid_config();
        config.jwt.secret_key = "too-short".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_non_http_base_url() {
        let mut config = valid_config();
        config.base_url = "ftp://auth.example.com".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_zero_port() {
        let mut config = valid_config();
        config.port = 0;
        assert!(validate(&config).is_err());
    }
}
